use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::chat::{ChatExchange, ConversationSummary, NewExchange},
};

/// Append-only persistence for chat exchanges.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Stores an exchange, stamping it with the current time.
    async fn append(&self, exchange: NewExchange) -> Result<ChatExchange>;

    /// All of a user's exchanges, oldest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<ChatExchange>>;

    /// A user's exchanges in one conversation, oldest first.
    async fn list_by_conversation(&self, user_id: Uuid, conversation_id: &str) -> Result<Vec<ChatExchange>>;

    /// The oldest exchange of a conversation.
    async fn find_first(&self, user_id: Uuid, conversation_id: &str) -> Result<Option<ChatExchange>>;

    /// One summary per conversation, most recently active first.
    async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>>;
}

/// `ChatRepository` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgChatRepository {
    pool: Pool,
}

impl PgChatRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn append(&self, exchange: NewExchange) -> Result<ChatExchange> {
        let client = self.pool.get().await?;
        let id = Uuid::new_v4();
        let row = client
            .query_one(
                r#"
                INSERT INTO chat_exchanges (id, user_id, conversation_id, title, message, response)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
                &[
                    &id,
                    &exchange.user_id,
                    &exchange.conversation_id,
                    &exchange.title,
                    &exchange.message,
                    &exchange.response,
                ],
            )
            .await?;
        Ok(ChatExchange::from(&row))
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<ChatExchange>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT *
                FROM chat_exchanges
                WHERE user_id = $1
                ORDER BY created_at ASC, id ASC
                "#,
                &[&user_id],
            )
            .await?;
        Ok(rows.iter().map(ChatExchange::from).collect())
    }

    async fn list_by_conversation(&self, user_id: Uuid, conversation_id: &str) -> Result<Vec<ChatExchange>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT *
                FROM chat_exchanges
                WHERE user_id = $1 AND conversation_id = $2
                ORDER BY created_at ASC, id ASC
                "#,
                &[&user_id, &conversation_id],
            )
            .await?;
        Ok(rows.iter().map(ChatExchange::from).collect())
    }

    async fn find_first(&self, user_id: Uuid, conversation_id: &str) -> Result<Option<ChatExchange>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT *
                FROM chat_exchanges
                WHERE user_id = $1 AND conversation_id = $2
                ORDER BY created_at ASC, id ASC
                LIMIT 1
                "#,
                &[&user_id, &conversation_id],
            )
            .await?;
        Ok(row.as_ref().map(ChatExchange::from))
    }

    async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT
                    conversation_id,
                    (ARRAY_AGG(title ORDER BY created_at ASC))[1] AS title,
                    COUNT(*) AS exchange_count,
                    MAX(created_at) AS last_activity
                FROM chat_exchanges
                WHERE user_id = $1
                GROUP BY conversation_id
                ORDER BY last_activity DESC
                "#,
                &[&user_id],
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ConversationSummary {
                    conversation_id: row.try_get("conversation_id").map_err(|_| AppError::MissingData("conversation_id".to_string()))?,
                    title: row.try_get("title").map_err(|_| AppError::MissingData("title".to_string()))?,
                    exchange_count: row.try_get("exchange_count").map_err(|_| AppError::MissingData("exchange_count".to_string()))?,
                    last_activity: row.try_get("last_activity").map_err(|_| AppError::MissingData("last_activity".to_string()))?,
                })
            })
            .collect()
    }
}
