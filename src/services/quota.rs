//! Per-user allowance: metered tokens or an active subscription.
//!
//! A user is Subscribed while `subscription_expiry >= today` and Metered
//! otherwise. Nothing flips the state back when a plan lapses; every call
//! re-reads the expiry against the current date.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::{expiry_after_months, Plan, QuotaStatus, User},
    repositories::user::{ConsumeOutcome, UserRepository},
};

/// Outcome of `check_allowance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowance {
    Allowed,
    /// Metered with no tokens left.
    NoTokensLeft,
}

/// A unit taken by `consume`, to be released if the exchange fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub user_id: Uuid,
    /// `None` when the user is subscribed (unbounded).
    pub remaining: Option<i32>,
}

/// The current UTC date.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn allowance_of(user: &User, today: NaiveDate) -> Allowance {
    if user.is_subscribed(today) || user.token_count > 0 {
        Allowance::Allowed
    } else {
        Allowance::NoTokensLeft
    }
}

/// Whether the user may send a message right now.
///
/// Read-only; takes no unit. The relay does not call this: `consume`
/// performs the same check atomically in its conditional update.
pub async fn check_allowance(
    users: &dyn UserRepository,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<Allowance> {
    let user = users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(allowance_of(&user, today))
}

/// Takes one unit of allowance in a single atomic step.
///
/// Subscribed users are not decremented. A metered user at zero gets
/// `QuotaExceeded` and nothing changes.
pub async fn consume(
    users: &dyn UserRepository,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<Reservation> {
    match users.consume_token(user_id, today).await? {
        ConsumeOutcome::Metered { remaining } => {
            tracing::debug!("🎟️ Token consumed for {} ({} left)", user_id, remaining);
            Ok(Reservation {
                user_id,
                remaining: Some(remaining),
            })
        }
        ConsumeOutcome::Subscribed => Ok(Reservation {
            user_id,
            remaining: None,
        }),
        ConsumeOutcome::Exhausted => Err(AppError::QuotaExceeded),
    }
}

/// Gives back a metered unit after a failed exchange.
pub async fn release(users: &dyn UserRepository, reservation: Reservation) -> Result<()> {
    if reservation.remaining.is_some() {
        users.refund_token(reservation.user_id).await?;
        tracing::debug!("↩️ Token released for {}", reservation.user_id);
    }
    Ok(())
}

/// Activates `plan` until `today + 30 * months` days.
pub async fn grant(
    users: &dyn UserRepository,
    user_id: Uuid,
    plan: Plan,
    months: u32,
    today: NaiveDate,
) -> Result<User> {
    let expiry = expiry_after_months(today, months);
    let user = users.grant_subscription(user_id, plan, expiry).await?;
    tracing::info!("✅ Subscription '{}' granted to {} until {}", plan.label(), user_id, expiry);
    Ok(user)
}

/// Plan, expiry and remaining allowance as seen on `today`.
pub fn status_of(user: &User, today: NaiveDate) -> QuotaStatus {
    let subscribed = user.is_subscribed(today);
    QuotaStatus {
        plan: user.subscription_plan.map(Plan::label),
        subscription_expiry: user.subscription_expiry,
        subscribed,
        tokens_remaining: if subscribed { None } else { Some(user.token_count.max(0)) },
    }
}
