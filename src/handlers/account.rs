use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::{
    error::{AppError, Result},
    models::session::Session,
    services::quota,
    state::AppState,
};

/// Returns the caller's plan, expiry and remaining allowance.
#[axum::debug_handler]
pub async fn quota_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Response> {
    let user = state
        .users
        .find_by_id(session.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let status = quota::status_of(&user, quota::today());

    Ok((StatusCode::OK, Json(status)).into_response())
}
