use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::session::Session,
    services::payment as payment_service,
    state::AppState,
};

/// The request payload for starting a subscription purchase.
#[derive(Deserialize, Debug)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub plan: String,
    pub months: Option<u32>,
}

#[derive(Serialize)]
pub struct SubscribeResponse {
    pub approval_url: String,
    pub payment_id: String,
}

/// Query parameters the processor appends to the return URL.
#[derive(Deserialize, Debug)]
pub struct PaymentReturn {
    #[serde(rename = "paymentId", default)]
    pub payment_id: String,
    #[serde(rename = "PayerID", default)]
    pub payer_id: String,
}

#[derive(Serialize)]
pub struct PaymentSuccessResponse {
    pub message: String,
    pub plan: Option<&'static str>,
    pub subscription_expiry: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct PaymentCancelResponse {
    pub message: String,
}

/// Creates a payment and returns the processor's approval link.
#[axum::debug_handler]
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<Response> {
    tracing::info!("💳 Subscribe request from user: {}", session.user_id);

    let plan = payment_service::parse_plan(&payload.plan, payload.months)?;
    let created = payment_service::initiate(&state, session.user_id, plan).await?;

    let response = SubscribeResponse {
        approval_url: created.approval_url,
        payment_id: created.id,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Executes the approved payment and activates the subscription.
#[axum::debug_handler]
pub async fn payment_success(
    State(state): State<AppState>,
    Query(params): Query<PaymentReturn>,
) -> Result<Response> {
    let user = payment_service::finalize(&state, &params.payment_id, &params.payer_id).await?;

    let response = PaymentSuccessResponse {
        message: "Payment successful, subscription activated!".to_string(),
        plan: user.subscription_plan.map(|plan| plan.label()),
        subscription_expiry: user.subscription_expiry,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Acknowledges a payment the payer backed out of.
pub async fn payment_cancel() -> Response {
    let response = PaymentCancelResponse {
        message: payment_service::cancel().to_string(),
    };

    (StatusCode::OK, Json(response)).into_response()
}
