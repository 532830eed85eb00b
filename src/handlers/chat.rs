use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::{
        chat::{ConversationSummary, ExchangeView, TIMESTAMP_FORMAT},
        session::Session,
    },
    services::{
        conversation,
        relay::{self, RelayRequest},
    },
    state::AppState,
};

/// The request payload for sending a message.
#[derive(Deserialize, Debug)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub title: Option<String>,
    pub conversation_id: Option<String>,
}

/// The response payload for a relayed message.
#[derive(Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub title: String,
    pub message: String,
    pub response: String,
    /// `null` while the user is subscribed.
    pub tokens_remaining: Option<i32>,
}

#[derive(Serialize)]
pub struct ChatHistoryResponse {
    pub chat_history: Vec<ExchangeView>,
}

#[derive(Serialize)]
pub struct ConversationHistoryResponse {
    pub conversation_id: String,
    pub chat_history: Vec<ExchangeView>,
}

#[derive(Serialize)]
pub struct ConversationView {
    pub conversation_id: String,
    pub title: String,
    pub exchange_count: i64,
    pub last_activity: String,
}

impl From<ConversationSummary> for ConversationView {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            last_activity: summary.last_activity.format(TIMESTAMP_FORMAT).to_string(),
            conversation_id: summary.conversation_id,
            title: summary.title,
            exchange_count: summary.exchange_count,
        }
    }
}

#[derive(Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationView>,
}

/// Relays a message to the text-generation endpoint.
#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response> {
    tracing::info!("💬 Chat request from user: {}", session.user_id);

    let request = RelayRequest {
        message: payload.message,
        title: payload.title,
        conversation_id: payload.conversation_id,
    };
    let reply = relay::send(&state, session.user_id, request).await?;

    let response = ChatResponse {
        conversation_id: reply.conversation_id,
        title: reply.title,
        message: reply.message,
        response: reply.response,
        tokens_remaining: reply.tokens_remaining,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Returns the first exchange of a conversation.
#[axum::debug_handler]
pub async fn get_chat(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(conversation_id): Path<String>,
) -> Result<Response> {
    tracing::debug!("📄 Get chat {} for user: {}", conversation_id, session.user_id);

    let exchange =
        conversation::find_one(state.chats.as_ref(), session.user_id, &conversation_id).await?;

    Ok((StatusCode::OK, Json(ExchangeView::from(exchange))).into_response())
}

/// Returns every exchange of the user, oldest first.
#[axum::debug_handler]
pub async fn chat_history(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Response> {
    tracing::debug!("📚 Chat history for user: {}", session.user_id);

    let exchanges = conversation::list_by_user(state.chats.as_ref(), session.user_id).await?;

    let response = ChatHistoryResponse {
        chat_history: exchanges.into_iter().map(ExchangeView::from).collect(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Returns every exchange of one conversation, oldest first.
#[axum::debug_handler]
pub async fn conversation_history(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(conversation_id): Path<String>,
) -> Result<Response> {
    tracing::debug!(
        "📚 Conversation {} history for user: {}",
        conversation_id,
        session.user_id
    );

    let exchanges =
        conversation::list_by_conversation(state.chats.as_ref(), session.user_id, &conversation_id)
            .await?;

    let response = ConversationHistoryResponse {
        conversation_id,
        chat_history: exchanges.into_iter().map(ExchangeView::from).collect(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Lists the user's conversations, most recently active first.
#[axum::debug_handler]
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Response> {
    let summaries =
        conversation::list_conversations(state.chats.as_ref(), session.user_id).await?;

    let response = ConversationsResponse {
        conversations: summaries.into_iter().map(ConversationView::from).collect(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
