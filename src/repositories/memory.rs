//! In-process implementations of the repository traits.
//!
//! Everything lives behind one `tokio::sync::Mutex`, so each trait method is
//! a single critical section. Used by the test suites and for running the
//! service without Postgres/Redis.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        chat::{ChatExchange, ConversationSummary, NewExchange},
        payment::PendingPayment,
        session::Session,
        user::{Plan, User},
    },
    repositories::{
        chat::ChatRepository,
        session::SessionStore,
        user::{ConsumeOutcome, UserRepository},
    },
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    exchanges: Vec<ChatExchange>,
    sessions: HashMap<Uuid, (Session, DateTime<Utc>)>,
    payments: HashMap<String, (PendingPayment, DateTime<Utc>)>,
    counters: HashMap<String, (i64, DateTime<Utc>)>,
}

/// Shared in-memory store; clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a user's stored token count.
    pub async fn set_token_count(&self, user_id: Uuid, token_count: i32) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.token_count = token_count;
        Ok(())
    }

    /// Overwrites a user's subscription fields.
    pub async fn set_subscription(
        &self,
        user_id: Uuid,
        plan: Option<Plan>,
        expiry: Option<NaiveDate>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.subscription_plan = plan;
        user.subscription_expiry = expiry;
        Ok(())
    }

    /// Number of stored exchanges across all users.
    pub async fn exchange_count(&self) -> usize {
        self.inner.lock().await.exchanges.len()
    }
}

fn expiry_in(ttl_secs: u64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000))
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, email: &str, password_hash: &str, token_count: i32) -> Result<User> {
        let mut inner = self.inner.lock().await;
        if inner.users.values().any(|u| u.email == email) {
            return Err(AppError::DuplicateEmail);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            subscription_plan: None,
            subscription_expiry: None,
            token_count,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.inner.lock().await.users.get(&user_id).cloned())
    }

    async fn consume_token(&self, user_id: Uuid, today: NaiveDate) -> Result<ConsumeOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Err(AppError::NotFound("User not found".to_string()));
        };

        if user.is_subscribed(today) {
            return Ok(ConsumeOutcome::Subscribed);
        }
        if user.token_count <= 0 {
            return Ok(ConsumeOutcome::Exhausted);
        }

        user.token_count -= 1;
        Ok(ConsumeOutcome::Metered {
            remaining: user.token_count,
        })
    }

    async fn refund_token(&self, user_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.token_count += 1;
        }
        Ok(())
    }

    async fn grant_subscription(&self, user_id: Uuid, plan: Plan, expiry: NaiveDate) -> Result<User> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.subscription_plan = Some(plan);
        user.subscription_expiry = Some(expiry);
        Ok(user.clone())
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn append(&self, exchange: NewExchange) -> Result<ChatExchange> {
        let record = ChatExchange {
            id: Uuid::new_v4(),
            user_id: exchange.user_id,
            conversation_id: exchange.conversation_id,
            title: exchange.title,
            message: exchange.message,
            response: exchange.response,
            created_at: Utc::now(),
        };
        self.inner.lock().await.exchanges.push(record.clone());
        Ok(record)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<ChatExchange>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .exchanges
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_by_conversation(&self, user_id: Uuid, conversation_id: &str) -> Result<Vec<ChatExchange>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .exchanges
            .iter()
            .filter(|e| e.user_id == user_id && e.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn find_first(&self, user_id: Uuid, conversation_id: &str) -> Result<Option<ChatExchange>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .exchanges
            .iter()
            .find(|e| e.user_id == user_id && e.conversation_id == conversation_id)
            .cloned())
    }

    async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        let inner = self.inner.lock().await;
        let mut summaries: Vec<ConversationSummary> = Vec::new();

        for exchange in inner.exchanges.iter().filter(|e| e.user_id == user_id) {
            match summaries
                .iter_mut()
                .find(|s| s.conversation_id == exchange.conversation_id)
            {
                Some(summary) => {
                    summary.exchange_count += 1;
                    summary.last_activity = summary.last_activity.max(exchange.created_at);
                }
                None => summaries.push(ConversationSummary {
                    conversation_id: exchange.conversation_id.clone(),
                    title: exchange.title.clone(),
                    exchange_count: 1,
                    last_activity: exchange.created_at,
                }),
            }
        }

        // Stable sort keeps later-started conversations after earlier ones on ties.
        summaries.reverse();
        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(summaries)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put_session(&self, session_id: Uuid, session: &Session, ttl_secs: u64) -> Result<()> {
        self.inner
            .lock()
            .await
            .sessions
            .insert(session_id, (session.clone(), expiry_in(ttl_secs)));
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let mut inner = self.inner.lock().await;
        match inner.sessions.get(&session_id) {
            Some((_, expires)) if *expires <= Utc::now() => {
                inner.sessions.remove(&session_id);
                Ok(None)
            }
            Some((session, _)) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        self.inner.lock().await.sessions.remove(&session_id);
        Ok(())
    }

    async fn put_pending_payment(&self, payment_id: &str, pending: &PendingPayment, ttl_secs: u64) -> Result<()> {
        self.inner
            .lock()
            .await
            .payments
            .insert(payment_id.to_string(), (pending.clone(), expiry_in(ttl_secs)));
        Ok(())
    }

    async fn get_pending_payment(&self, payment_id: &str) -> Result<Option<PendingPayment>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .payments
            .get(payment_id)
            .filter(|(_, expires)| *expires > Utc::now())
            .map(|(pending, _)| pending.clone()))
    }

    async fn delete_pending_payment(&self, payment_id: &str) -> Result<()> {
        self.inner.lock().await.payments.remove(payment_id);
        Ok(())
    }

    async fn attempts(&self, key: &str) -> Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .counters
            .get(key)
            .filter(|(_, expires)| *expires > Utc::now())
            .map(|(count, _)| *count)
            .unwrap_or(0))
    }

    async fn record_attempt(&self, key: &str, window_secs: u64) -> Result<i64> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let entry = inner.counters.entry(key.to_string()).or_insert((0, now));
        if entry.1 <= now {
            entry.0 = 0;
        }
        entry.0 += 1;
        entry.1 = expiry_in(window_secs);
        Ok(entry.0)
    }

    async fn clear_attempts(&self, key: &str) -> Result<()> {
        self.inner.lock().await.counters.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[tokio::test]
    async fn consume_never_goes_below_zero() {
        let store = MemoryStore::new();
        let user = store.create_user("a@x.com", "hash", 1).await.unwrap();

        assert_eq!(
            store.consume_token(user.id, today()).await.unwrap(),
            ConsumeOutcome::Metered { remaining: 0 }
        );
        assert_eq!(
            store.consume_token(user.id, today()).await.unwrap(),
            ConsumeOutcome::Exhausted
        );
        assert_eq!(store.find_by_id(user.id).await.unwrap().unwrap().token_count, 0);
    }

    #[tokio::test]
    async fn subscribed_consume_leaves_count_untouched() {
        let store = MemoryStore::new();
        let user = store.create_user("a@x.com", "hash", 0).await.unwrap();
        store
            .grant_subscription(user.id, Plan::OneMonth, Plan::OneMonth.expiry_from(today()))
            .await
            .unwrap();

        assert_eq!(
            store.consume_token(user.id, today()).await.unwrap(),
            ConsumeOutcome::Subscribed
        );
        assert_eq!(store.find_by_id(user.id).await.unwrap().unwrap().token_count, 0);
    }

    #[tokio::test]
    async fn conversations_are_grouped_per_user() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        for (user_id, conversation_id, title) in [
            (alice, "c1", "first"),
            (alice, "c1", "ignored"),
            (alice, "c2", "second"),
            (bob, "c1", "bob's"),
        ] {
            store
                .append(NewExchange {
                    user_id,
                    conversation_id: conversation_id.into(),
                    title: title.into(),
                    message: "m".into(),
                    response: "r".into(),
                })
                .await
                .unwrap();
        }

        let summaries = store.list_conversations(alice).await.unwrap();
        assert_eq!(summaries.len(), 2);
        let c1 = summaries.iter().find(|s| s.conversation_id == "c1").unwrap();
        assert_eq!(c1.title, "first");
        assert_eq!(c1.exchange_count, 2);
    }

    #[tokio::test]
    async fn counters_reset_after_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.record_attempt("k", 60).await.unwrap(), 1);
        assert_eq!(store.record_attempt("k", 60).await.unwrap(), 2);
        assert_eq!(store.attempts("k").await.unwrap(), 2);
        store.clear_attempts("k").await.unwrap();
        assert_eq!(store.attempts("k").await.unwrap(), 0);
    }
}
