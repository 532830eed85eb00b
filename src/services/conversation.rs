use uuid::Uuid;
use crate::{
    error::{AppError, Result},
    models::chat::{ChatExchange, ConversationSummary, NewExchange},
    repositories::chat::ChatRepository,
};

/// Maximum stored title length, in characters.
pub const TITLE_MAX_CHARS: usize = 50;
/// Maximum conversation identifier length, in characters.
pub const CONVERSATION_ID_MAX_CHARS: usize = 100;

/// First `TITLE_MAX_CHARS` characters of `text`, trimmed.
pub fn title_from(text: &str) -> String {
    text.trim().chars().take(TITLE_MAX_CHARS).collect()
}

/// Appends an exchange to a user's conversation.
///
/// # Arguments
///
/// * `chats` - The chat repository.
/// * `user_id` - The owner of the exchange.
/// * `conversation_id` - The conversation it belongs to.
/// * `title` - The conversation title.
/// * `message` - The user's message.
/// * `response` - The model's full response.
///
/// # Returns
///
/// A `Result` containing the stored `ChatExchange`.
pub async fn append(
    chats: &dyn ChatRepository,
    user_id: Uuid,
    conversation_id: &str,
    title: &str,
    message: &str,
    response: &str,
) -> Result<ChatExchange> {
    let exchange = chats
        .append(NewExchange {
            user_id,
            conversation_id: conversation_id.to_string(),
            title: title_from(title),
            message: message.to_string(),
            response: response.to_string(),
        })
        .await?;

    tracing::debug!("💬 Exchange {} stored in conversation {}", exchange.id, conversation_id);
    Ok(exchange)
}

/// Lists all of a user's exchanges, oldest first.
pub async fn list_by_user(chats: &dyn ChatRepository, user_id: Uuid) -> Result<Vec<ChatExchange>> {
    chats.list_by_user(user_id).await
}

/// Lists a conversation's exchanges; `NotFound` when there are none.
pub async fn list_by_conversation(
    chats: &dyn ChatRepository,
    user_id: Uuid,
    conversation_id: &str,
) -> Result<Vec<ChatExchange>> {
    let exchanges = chats.list_by_conversation(user_id, conversation_id).await?;
    if exchanges.is_empty() {
        return Err(AppError::NotFound(
            "No chat history found for this conversation ID".to_string(),
        ));
    }
    Ok(exchanges)
}

/// The first exchange of a conversation.
pub async fn find_one(
    chats: &dyn ChatRepository,
    user_id: Uuid,
    conversation_id: &str,
) -> Result<ChatExchange> {
    chats
        .find_first(user_id, conversation_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))
}

/// Title of an existing conversation, if the user has one with this id.
pub async fn title_of(
    chats: &dyn ChatRepository,
    user_id: Uuid,
    conversation_id: &str,
) -> Result<Option<String>> {
    Ok(chats
        .find_first(user_id, conversation_id)
        .await?
        .map(|exchange| exchange.title))
}

/// One summary per conversation, most recently active first.
pub async fn list_conversations(
    chats: &dyn ChatRepository,
    user_id: Uuid,
) -> Result<Vec<ConversationSummary>> {
    chats.list_conversations(user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::MemoryStore;
    use chrono::Utc;

    #[test]
    fn titles_are_cut_at_fifty_characters() {
        let long = "é".repeat(80);
        assert_eq!(title_from(&long).chars().count(), TITLE_MAX_CHARS);
        assert_eq!(title_from("  short  "), "short");
    }

    #[tokio::test]
    async fn append_then_fetch_round_trips() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let before = Utc::now();

        append(&store, user_id, "conv-1", "Greeting", "hello", "hi there")
            .await
            .unwrap();

        let fetched = find_one(&store, user_id, "conv-1").await.unwrap();
        assert_eq!(fetched.title, "Greeting");
        assert_eq!(fetched.message, "hello");
        assert_eq!(fetched.response, "hi there");
        assert!(fetched.created_at >= before);
    }

    #[tokio::test]
    async fn conversations_are_scoped_to_their_owner() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        append(&store, owner, "shared-id", "t", "m", "r").await.unwrap();

        assert!(matches!(
            list_by_conversation(&store, stranger, "shared-id").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            find_one(&store, stranger, "shared-id").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(list_by_conversation(&store, owner, "shared-id").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_one_returns_the_first_of_many() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        append(&store, user_id, "c", "t", "first", "r1").await.unwrap();
        append(&store, user_id, "c", "t", "second", "r2").await.unwrap();

        assert_eq!(find_one(&store, user_id, "c").await.unwrap().message, "first");
        assert_eq!(list_by_user(&store, user_id).await.unwrap().len(), 2);
    }
}
