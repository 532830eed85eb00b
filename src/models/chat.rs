use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_postgres::Row;
use uuid::Uuid;

/// Timestamp layout used in chat JSON.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Represents one message/response pair.
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Groups related exchanges; scoped to the user.
    pub conversation_id: String,
    pub title: String,
    pub message: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Row> for ChatExchange {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            user_id: row.get("user_id"),
            conversation_id: row.get("conversation_id"),
            title: row.get("title"),
            message: row.get("message"),
            response: row.get("response"),
            created_at: row.get("created_at"),
        }
    }
}

/// An exchange about to be appended.
#[derive(Debug, Clone)]
pub struct NewExchange {
    pub user_id: Uuid,
    pub conversation_id: String,
    pub title: String,
    pub message: String,
    pub response: String,
}

/// Represents a conversation with its statistics.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation_id: String,
    /// Title of the first exchange.
    pub title: String,
    pub exchange_count: i64,
    pub last_activity: DateTime<Utc>,
}

/// Wire shape of an exchange.
#[derive(Debug, Serialize)]
pub struct ExchangeView {
    pub conversation_id: String,
    pub title: String,
    pub message: String,
    pub response: String,
    pub timestamp: String,
}

impl From<ChatExchange> for ExchangeView {
    fn from(exchange: ChatExchange) -> Self {
        Self {
            timestamp: exchange.created_at.format(TIMESTAMP_FORMAT).to_string(),
            conversation_id: exchange.conversation_id,
            title: exchange.title,
            message: exchange.message,
            response: exchange.response,
        }
    }
}
