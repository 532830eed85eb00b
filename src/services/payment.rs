use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        payment::{CreatedPayment, PaymentIntent, PendingPayment},
        user::{Plan, User},
    },
    services::quota,
    state::AppState,
};

/// How long an unapproved payment stays redeemable, in seconds.
const PENDING_PAYMENT_TTL_SECS: u64 = 86400;

/// Processor state of a successfully executed payment.
const APPROVED: &str = "approved";

/// Resolves the plan code and checks the optional `months` against it.
pub fn parse_plan(code: &str, months: Option<u32>) -> Result<Plan> {
    let plan = Plan::from_code(code).ok_or_else(|| {
        AppError::Validation("Invalid plan, choose 1, 6, or 12 months".to_string())
    })?;

    if let Some(months) = months {
        if months != plan.months() {
            return Err(AppError::Validation(format!(
                "months ({}) does not match the selected plan ({})",
                months,
                plan.months()
            )));
        }
    }

    Ok(plan)
}

/// Creates a payment for `plan` and remembers who it is for.
///
/// Nothing is granted here; the subscription starts only once the payment
/// is executed in `finalize`.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user_id` - The paying user.
/// * `plan` - The plan being bought.
///
/// # Returns
///
/// A `Result` containing the processor's `CreatedPayment`.
pub async fn initiate(state: &AppState, user_id: Uuid, plan: Plan) -> Result<CreatedPayment> {
    let months = plan.months();
    let total = state.config.subscription_price_per_month * months;
    let base = &state.config.public_base_url;

    let intent = PaymentIntent {
        total: format!("{}.00", total),
        description: format!("Subscription for {} months", months),
        return_url: format!("{}/api/payment/success", base),
        cancel_url: format!("{}/api/payment/cancel", base),
    };

    let created = state.payments.create(&intent).await?;

    let pending = PendingPayment {
        user_id,
        plan,
        created_at: Utc::now(),
    };
    state
        .sessions
        .put_pending_payment(&created.id, &pending, PENDING_PAYMENT_TTL_SECS)
        .await?;

    tracing::info!(
        "💳 Payment {} created for {} ({}, {} USD)",
        created.id,
        user_id,
        plan.label(),
        total
    );
    Ok(created)
}

/// Executes an approved payment and grants the subscription.
///
/// A payment the processor already reports as `approved` is not executed
/// again, so a finalize that failed after execution can be retried.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payment_id` - The processor's payment id.
/// * `payer_id` - The payer id the processor sent back.
///
/// # Returns
///
/// A `Result` containing the updated `User`.
pub async fn finalize(state: &AppState, payment_id: &str, payer_id: &str) -> Result<User> {
    if payment_id.trim().is_empty() || payer_id.trim().is_empty() {
        return Err(AppError::Validation(
            "paymentId and PayerID are required".to_string(),
        ));
    }

    let pending = state
        .sessions
        .get_pending_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Unknown or expired payment".to_string()))?;

    let found = state
        .payments
        .find(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    // Still pending but already approved: an earlier finalize executed it
    // and then failed to grant.
    if found.state == APPROVED {
        tracing::info!("💳 Payment {} already executed, resuming grant", payment_id);
    } else {
        let executed = state.payments.execute(payment_id, payer_id).await?;
        if executed.state != APPROVED {
            tracing::warn!("❌ Payment {} executed with state '{}'", payment_id, executed.state);
            return Err(AppError::Payment("Payment execution failed".to_string()));
        }
    }

    let user = quota::grant(
        state.users.as_ref(),
        pending.user_id,
        pending.plan,
        pending.plan.months(),
        quota::today(),
    )
    .await?;

    state.sessions.delete_pending_payment(payment_id).await?;

    tracing::info!("✅ Payment {} executed for {}", payment_id, pending.user_id);
    Ok(user)
}

/// Acknowledges a cancelled payment; nothing changes.
pub fn cancel() -> &'static str {
    tracing::info!("💳 Payment cancelled by payer");
    "Payment cancelled"
}
