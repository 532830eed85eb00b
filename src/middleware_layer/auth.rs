use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    state::AppState,
};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Extracts the session token from the request cookies.
///
/// # Arguments
///
/// * `cookies` - The request cookies.
///
/// # Returns
///
/// An `Option` containing the session ID if found.
pub fn extract_session_token(cookies: &Cookies) -> Option<Uuid> {
    cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// A middleware that requires a valid session to be present.
///
/// On success the `Session` is inserted into the request extensions.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`, or `AppError::Unauthorized`.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let session_id = extract_session_token(&cookies).ok_or_else(|| {
        tracing::debug!("❌ No session_id cookie found");
        AppError::Unauthorized
    })?;

    let session = state
        .sessions
        .get_session(session_id)
        .await?
        .ok_or_else(|| {
            tracing::debug!("❌ Session not found: {}", session_id);
            AppError::Unauthorized
        })?;

    if chrono::Utc::now() > session.expires_at {
        tracing::warn!("❌ Session expired for user: {}", session.user_id);
        if let Err(e) = state.sessions.delete_session(session_id).await {
            tracing::error!("❌ Failed to delete expired session: {}", e);
        }
        return Err(AppError::Unauthorized);
    }

    tracing::debug!("✅ User authenticated: {}", session.user_id);

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
