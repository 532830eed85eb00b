//! The "send a message" path: quota, upstream call, log, reply.

use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    services::{
        conversation::{self, title_from, CONVERSATION_ID_MAX_CHARS},
        quota::{self, Reservation},
    },
    state::AppState,
};

/// A message to relay on behalf of an authenticated user.
#[derive(Debug, Clone, Default)]
pub struct RelayRequest {
    pub message: String,
    pub title: Option<String>,
    /// Continue this conversation instead of starting a new one.
    pub conversation_id: Option<String>,
}

/// What the caller gets back.
#[derive(Debug, Clone)]
pub struct RelayReply {
    pub conversation_id: String,
    pub title: String,
    pub message: String,
    /// Possibly word-truncated; the log keeps the full text.
    pub response: String,
    /// `None` while subscribed.
    pub tokens_remaining: Option<i32>,
}

/// Keeps the first `limit` words; `0` keeps everything.
pub fn truncate_words(text: &str, limit: usize) -> String {
    if limit == 0 {
        return text.to_string();
    }
    text.split_whitespace().take(limit).collect::<Vec<_>>().join(" ")
}

fn validate(request: &RelayRequest) -> Result<()> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }

    if let Some(conversation_id) = &request.conversation_id {
        let length = conversation_id.chars().count();
        if conversation_id.trim().is_empty() || length > CONVERSATION_ID_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "conversation_id must be between 1 and {} characters",
                CONVERSATION_ID_MAX_CHARS
            )));
        }
    }

    Ok(())
}

/// Title for the exchange: caller's, else the conversation's, else derived
/// from the message.
async fn resolve_title(state: &AppState, user_id: Uuid, request: &RelayRequest) -> Result<String> {
    if let Some(title) = request.title.as_deref().map(title_from).filter(|t| !t.is_empty()) {
        return Ok(title);
    }

    if let Some(conversation_id) = &request.conversation_id {
        if let Some(title) =
            conversation::title_of(state.chats.as_ref(), user_id, conversation_id).await?
        {
            return Ok(title);
        }
    }

    Ok(title_from(&request.message))
}

/// Relays one message to the text-generation endpoint.
///
/// The quota unit is taken atomically before the upstream call and given
/// back if the call or the append fails, so a failed exchange leaves no
/// record and costs nothing.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user_id` - The authenticated user.
/// * `request` - The message and optional title/conversation.
///
/// # Returns
///
/// A `Result` containing the `RelayReply`.
pub async fn send(state: &AppState, user_id: Uuid, request: RelayRequest) -> Result<RelayReply> {
    validate(&request)?;

    let reservation = quota::consume(state.users.as_ref(), user_id, quota::today()).await?;

    match exchange(state, user_id, &request).await {
        Ok((conversation_id, title, response)) => {
            tracing::info!(
                "✅ Relayed message for {} in conversation {}",
                user_id,
                conversation_id
            );
            Ok(RelayReply {
                conversation_id,
                title,
                message: request.message,
                response: truncate_words(&response, state.config.response_word_limit),
                tokens_remaining: reservation.remaining,
            })
        }
        Err(e) => {
            give_back(state, reservation).await;
            Err(e)
        }
    }
}

async fn exchange(
    state: &AppState,
    user_id: Uuid,
    request: &RelayRequest,
) -> Result<(String, String, String)> {
    let response = state.generator.generate(&request.message).await?;

    let conversation_id = request
        .conversation_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let title = resolve_title(state, user_id, request).await?;

    conversation::append(
        state.chats.as_ref(),
        user_id,
        &conversation_id,
        &title,
        &request.message,
        &response,
    )
    .await?;

    Ok((conversation_id, title, response))
}

async fn give_back(state: &AppState, reservation: Reservation) {
    if let Err(e) = quota::release(state.users.as_ref(), reservation).await {
        tracing::error!("❌ Failed to release token for {}: {}", reservation.user_id, e);
    }
}
