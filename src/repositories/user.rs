use async_trait::async_trait;
use chrono::NaiveDate;
use deadpool_postgres::Pool;
use tokio_postgres::{error::SqlState, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::{Plan, User},
};

/// Result of an atomic check-and-decrement on a user's allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// One metered token was taken; `remaining` is the new count.
    Metered { remaining: i32 },
    /// Active subscription, nothing was decremented.
    Subscribed,
    /// Metered and already at zero; nothing changed.
    Exhausted,
}

/// Persistence for users and their allowance.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a user; `DuplicateEmail` if the email is taken.
    async fn create_user(&self, email: &str, password_hash: &str, token_count: i32) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Takes one token unless the user is subscribed on `today`.
    /// `NotFound` if the user does not exist.
    ///
    /// Must be a single atomic conditional update: the count never drops
    /// below zero, whatever the concurrency.
    async fn consume_token(&self, user_id: Uuid, today: NaiveDate) -> Result<ConsumeOutcome>;

    /// Gives back a token taken by `consume_token`.
    async fn refund_token(&self, user_id: Uuid) -> Result<()>;

    async fn grant_subscription(&self, user_id: Uuid, plan: Plan, expiry: NaiveDate) -> Result<User>;
}

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    let plan: Option<String> = row
        .try_get("subscription_plan")
        .map_err(|_| AppError::MissingData("subscription_plan".to_string()))?;

    Ok(User {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        email: row.try_get("email").map_err(|_| AppError::MissingData("email".to_string()))?,
        password_hash: row.try_get("password_hash").map_err(|_| AppError::MissingData("password_hash".to_string()))?,
        subscription_plan: plan.as_deref().and_then(Plan::from_label),
        subscription_expiry: row.try_get("subscription_expiry").map_err(|_| AppError::MissingData("subscription_expiry".to_string()))?,
        token_count: row.try_get("token_count").map_err(|_| AppError::MissingData("token_count".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
    })
}

/// `UserRepository` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, email: &str, password_hash: &str, token_count: i32) -> Result<User> {
        let client = self.pool.get().await?;
        let id = Uuid::new_v4();
        let row = client
            .query_one(
                r#"
                INSERT INTO users (id, email, password_hash, token_count)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
                &[&id, &email, &password_hash, &token_count],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::DuplicateEmail
                } else {
                    AppError::Database(e)
                }
            })?;
        row_to_user(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT *
                FROM users
                WHERE email = $1
                "#,
                &[&email],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT *
                FROM users
                WHERE id = $1
                "#,
                &[&user_id],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn consume_token(&self, user_id: Uuid, today: NaiveDate) -> Result<ConsumeOutcome> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                UPDATE users
                SET token_count = CASE
                    WHEN subscription_expiry >= $2 THEN token_count
                    ELSE token_count - 1
                END
                WHERE id = $1
                  AND (subscription_expiry >= $2 OR token_count > 0)
                RETURNING
                    token_count,
                    COALESCE(subscription_expiry >= $2, false) AS subscribed
                "#,
                &[&user_id, &today],
            )
            .await?;

        let Some(row) = row else {
            let exists = client
                .query_opt("SELECT 1 FROM users WHERE id = $1", &[&user_id])
                .await?
                .is_some();
            if !exists {
                return Err(AppError::NotFound("User not found".to_string()));
            }
            return Ok(ConsumeOutcome::Exhausted);
        };

        let subscribed: bool = row
            .try_get("subscribed")
            .map_err(|_| AppError::MissingData("subscribed".to_string()))?;
        if subscribed {
            return Ok(ConsumeOutcome::Subscribed);
        }

        let remaining: i32 = row
            .try_get("token_count")
            .map_err(|_| AppError::MissingData("token_count".to_string()))?;
        Ok(ConsumeOutcome::Metered { remaining })
    }

    async fn refund_token(&self, user_id: Uuid) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE users
                SET token_count = token_count + 1
                WHERE id = $1
                "#,
                &[&user_id],
            )
            .await?;
        Ok(())
    }

    async fn grant_subscription(&self, user_id: Uuid, plan: Plan, expiry: NaiveDate) -> Result<User> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                UPDATE users
                SET subscription_plan = $2,
                    subscription_expiry = $3
                WHERE id = $1
                RETURNING *
                "#,
                &[&user_id, &plan.label(), &expiry],
            )
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        row_to_user(&row)
    }
}
