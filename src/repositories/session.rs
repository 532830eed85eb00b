use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{payment::PendingPayment, session::Session},
};

/// Short-lived server-side state: sessions, pending payments and
/// rate-limit counters.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put_session(&self, session_id: Uuid, session: &Session, ttl_secs: u64) -> Result<()>;

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    async fn delete_session(&self, session_id: Uuid) -> Result<()>;

    async fn put_pending_payment(&self, payment_id: &str, pending: &PendingPayment, ttl_secs: u64) -> Result<()>;

    async fn get_pending_payment(&self, payment_id: &str) -> Result<Option<PendingPayment>>;

    async fn delete_pending_payment(&self, payment_id: &str) -> Result<()>;

    /// Current value of a rate-limit counter (0 when absent or expired).
    async fn attempts(&self, key: &str) -> Result<i64>;

    /// Increments a counter and (re)arms its window; returns the new value.
    async fn record_attempt(&self, key: &str, window_secs: u64) -> Result<i64>;

    async fn clear_attempts(&self, key: &str) -> Result<()>;
}

fn session_key(session_id: Uuid) -> String {
    format!("session:{}", session_id)
}

fn payment_key(payment_id: &str) -> String {
    format!("payment:{}", payment_id)
}

/// `SessionStore` backed by Redis.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put_session(&self, session_id: Uuid, session: &Session, ttl_secs: u64) -> Result<()> {
        let session_json = sonic_rs::to_string(session)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

        let _: () = self
            .redis
            .clone()
            .set_ex(session_key(session_id), &session_json, ttl_secs)
            .await
            .map_err(|e| {
                tracing::error!("❌ Redis set_ex failed: {}", e);
                AppError::Redis(e)
            })?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let session_json: Option<String> = self.redis.clone().get(session_key(session_id)).await?;

        match session_json {
            Some(json) => {
                let session = sonic_rs::from_str(&json).map_err(|e| {
                    tracing::warn!("❌ Invalid session JSON: {}", e);
                    AppError::Unauthorized
                })?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let _: () = self.redis.clone().del(session_key(session_id)).await?;
        Ok(())
    }

    async fn put_pending_payment(&self, payment_id: &str, pending: &PendingPayment, ttl_secs: u64) -> Result<()> {
        let pending_json = sonic_rs::to_string(pending)
            .map_err(|e| AppError::Internal(format!("Payment serialization failed: {}", e)))?;

        let _: () = self
            .redis
            .clone()
            .set_ex(payment_key(payment_id), &pending_json, ttl_secs)
            .await?;
        Ok(())
    }

    async fn get_pending_payment(&self, payment_id: &str) -> Result<Option<PendingPayment>> {
        let pending_json: Option<String> = self.redis.clone().get(payment_key(payment_id)).await?;

        pending_json
            .map(|json| {
                sonic_rs::from_str(&json)
                    .map_err(|e| AppError::Internal(format!("Invalid pending payment JSON: {}", e)))
            })
            .transpose()
    }

    async fn delete_pending_payment(&self, payment_id: &str) -> Result<()> {
        let _: () = self.redis.clone().del(payment_key(payment_id)).await?;
        Ok(())
    }

    async fn attempts(&self, key: &str) -> Result<i64> {
        let count: Option<i64> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.redis.clone())
            .await?;
        Ok(count.unwrap_or(0))
    }

    async fn record_attempt(&self, key: &str, window_secs: u64) -> Result<i64> {
        let count: i64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut self.redis.clone())
            .await?;

        let _: () = redis::cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .query_async(&mut self.redis.clone())
            .await?;

        Ok(count)
    }

    async fn clear_attempts(&self, key: &str) -> Result<()> {
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut self.redis.clone())
            .await?;
        Ok(())
    }
}
