use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Request bodies are small JSON documents.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://[::1]:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::COOKIE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Routes that require a session, without the outer layers.
///
/// `main` wraps this in the governor layer, which needs the peer address.
pub fn protected_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/logout", post(handlers::auth::logout))
        .route("/api/chat", post(handlers::chat::send_message))
        .route("/api/chat/{conversation_id}", get(handlers::chat::get_chat))
        .route("/api/chat_history", get(handlers::chat::chat_history))
        .route(
            "/api/chat_history/{conversation_id}",
            get(handlers::chat::conversation_history),
        )
        .route("/api/conversations", get(handlers::chat::list_conversations))
        .route("/api/account/quota", get(handlers::account::quota_status))
        .route("/api/subscribe", post(handlers::payment::subscribe))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state)
}

/// Routes reachable without a session.
pub fn public_routes(state: AppState) -> Router {
    let register_routes = Router::new()
        .route("/api/register", post(handlers::auth::register))
        .with_state(state.clone());

    let login_routes = Router::new()
        .route("/api/login", post(handlers::auth::login))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_login,
        ))
        .with_state(state.clone());

    let payment_routes = Router::new()
        .route("/api/payment/success", get(handlers::payment::payment_success))
        .route("/api/payment/cancel", get(handlers::payment::payment_cancel))
        .with_state(state);

    Router::new()
        .merge(register_routes)
        .merge(login_routes)
        .merge(payment_routes)
}

/// Applies the layers shared by every route.
pub fn with_common_layers(router: Router) -> Router {
    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer())
}

/// The full application router.
///
/// # Arguments
///
/// * `state` - The application state.
///
/// # Returns
///
/// A `Router` serving every endpoint.
pub fn router(state: AppState) -> Router {
    with_common_layers(
        Router::new()
            .merge(public_routes(state.clone()))
            .merge(protected_routes(state)),
    )
}
