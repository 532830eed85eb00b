use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A column could not be read from a row.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No valid session accompanied the request.
    #[error("Unauthorized")]
    Unauthorized,

    /// A resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The email is already registered.
    #[error("Email already registered")]
    DuplicateEmail,

    /// The user has no tokens left and no active subscription.
    #[error("Quota exceeded")]
    QuotaExceeded,

    /// The text-generation endpoint failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The payment processor failed.
    #[error("Payment error: {0}")]
    Payment(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// A rate limit exceeded error.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::DuplicateEmail => StatusCode::BAD_REQUEST,
            AppError::QuotaExceeded => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Redis(_)
            | AppError::MissingData(_)
            | AppError::Upstream(_)
            | AppError::Payment(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                "Database error".to_string()
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                "Session store error".to_string()
            }

            AppError::MissingData(ref column) => {
                tracing::error!("Missing column in row: {}", column);
                "Database error".to_string()
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                msg.clone()
            }

            AppError::Unauthorized => {
                tracing::debug!("Request without a valid session");
                "Unauthorized, please log in".to_string()
            }

            AppError::NotFound(ref msg) => {
                tracing::debug!("Not found: {}", msg);
                msg.clone()
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg.clone()
            }

            AppError::DuplicateEmail => {
                tracing::debug!("Duplicate email on registration");
                "Email already registered".to_string()
            }

            AppError::QuotaExceeded => {
                tracing::info!("Chat refused: no tokens left");
                "No tokens left, please subscribe or wait for refill".to_string()
            }

            AppError::Upstream(ref msg) => {
                tracing::error!("Upstream error: {}", msg);
                "Failed to get response from API".to_string()
            }

            AppError::Payment(ref msg) => {
                tracing::error!("Payment error: {}", msg);
                msg.clone()
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }

            AppError::RateLimitExceeded(ref msg) => {
                tracing::warn!("Rate limit exceeded: {}", msg);
                msg.clone()
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (
            status,
            [(http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::DuplicateEmail.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::QuotaExceeded.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("Chat not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Upstream("status 503".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn upstream_cause_is_not_leaked_to_the_client() {
        let response = AppError::Upstream("key=secret status 403".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"Failed to get response from API"}"#);
    }
}
