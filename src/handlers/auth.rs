use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::{extract_session_token, SESSION_COOKIE},
    models::session::Session,
    services::{auth as auth_service, quota},
    state::AppState,
    validation::auth::{validate_payload, LoginRequest, RegisterRequest},
};

/// The response payload for registration and logout.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// The response payload for a successful login.
#[derive(Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub subscription_status: String,
}

/// Creates a cookie with the given name, value, and max age.
fn create_secure_cookie(
    name: &'static str,
    value: String,
    max_age_days: i64,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);

    cookie.set_http_only(true);
    if secure {
        cookie.set_secure(true);
    }

    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_days * 86400));
    cookie.set_path("/");

    cookie
}

/// Handles user registration.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response> {
    tracing::info!("📝 Register attempt for: {}", payload.email);
    validate_payload(&payload)?;

    let user = auth_service::register_user(
        state.users.as_ref(),
        &payload.email,
        &payload.password,
        state.config.default_token_allowance,
    )
    .await?;

    tracing::info!("✅ User registered: {}", user.id);

    let response = MessageResponse {
        message: "User registered successfully".to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for: {}", payload.email);
    validate_payload(&payload)?;

    let user = auth_service::authenticate_user(
        state.users.as_ref(),
        &payload.email,
        &payload.password,
    )
    .await?;

    let session_id = Uuid::new_v4();
    let now = Utc::now();
    let session = Session {
        user_id: user.id,
        created_at: now,
        expires_at: now + chrono::Duration::days(state.config.session_duration_days),
    };

    let expiration_seconds = u64::try_from(state.config.session_duration_days * 86400)
        .map_err(|_| AppError::Internal("Invalid session duration".to_string()))?;
    state
        .sessions
        .put_session(session_id, &session, expiration_seconds)
        .await?;
    tracing::info!("✅ Session saved: session:{}", session_id);

    cookies.add(create_secure_cookie(
        SESSION_COOKIE,
        session_id.to_string(),
        state.config.session_duration_days,
        state.config.secure_cookies,
    ));

    let status = quota::status_of(&user, quota::today());
    tracing::info!("✅ User logged in: {} (subscribed: {})", user.id, status.subscribed);

    let response = LoginResponse {
        message: "Login successful".to_string(),
        subscription_status: if status.subscribed {
            "Subscribed".to_string()
        } else {
            "Not Subscribed".to_string()
        },
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user logout.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    cookies: Cookies,
) -> Result<Response> {
    tracing::info!("👋 Logout for user: {}", session.user_id);

    let session_id = extract_session_token(&cookies).ok_or(AppError::Unauthorized)?;
    state.sessions.delete_session(session_id).await?;
    tracing::info!("✅ Session deleted: session:{}", session_id);

    let mut session_cookie = Cookie::new(SESSION_COOKIE, "");
    session_cookie.set_max_age(Duration::seconds(0));
    session_cookie.set_path("/");
    cookies.remove(session_cookie);

    let response = MessageResponse {
        message: "Logged out successfully".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
