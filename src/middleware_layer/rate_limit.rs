use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sonic_rs::JsonValueTrait;

use crate::{
    error::AppError,
    services::auth::normalize_email,
    state::AppState,
};

/// Login bodies are tiny; anything larger is not a login.
const LOGIN_BODY_LIMIT: usize = 16 * 1024;

fn extract_email_from_body(body_bytes: &[u8]) -> Option<String> {
    let json = sonic_rs::from_slice::<sonic_rs::Value>(body_bytes).ok()?;
    json.get("email")
        .and_then(|v| v.as_str())
        .map(normalize_email)
}

fn window_minutes(state: &AppState) -> u64 {
    state.config.rate_limit_window_secs / 60
}

/// A middleware that rate limits failed login attempts per email.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an error `AppError`.
pub async fn rate_limit_login(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let body_bytes = match axum::body::to_bytes(body, LOGIN_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::Validation("Request body too large".to_string()).into_response();
        }
    };

    let email = extract_email_from_body(&body_bytes).unwrap_or_else(|| "unknown".to_string());
    let key = format!("rate_limit:login:{}", email);

    match state.sessions.attempts(&key).await {
        Ok(attempts) if attempts >= state.config.login_failures_per_window => {
            tracing::warn!("🚫 Login limit reached for {}", email);
            return AppError::RateLimitExceeded(format!(
                "Too many failed login attempts. Try again within {} minutes",
                window_minutes(&state)
            ))
            .into_response();
        }
        Ok(_) => {}
        Err(e) => tracing::error!("❌ Rate limit lookup failed: {}", e),
    }

    let new_req = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(new_req).await;

    let outcome = if response.status().is_client_error() {
        state
            .sessions
            .record_attempt(&key, state.config.rate_limit_window_secs)
            .await
            .map(|_| ())
    } else if response.status().is_success() {
        state.sessions.clear_attempts(&key).await
    } else {
        Ok(())
    };

    if let Err(e) = outcome {
        tracing::error!("❌ Rate limit update failed: {}", e);
    }

    response
}
