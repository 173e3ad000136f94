//! API error taxonomy mapped to HTTP status codes.
//!
//! Every failure renders as `{"error": "<message>"}`. `NotFound` is used for
//! both absent and non-owned conversations so callers cannot probe for the
//! existence of other users' data.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Conversation not found")]
    NotFound,

    #[error("This email is already in use")]
    DuplicateEmail,

    #[error("Unsupported file type '{0}'. Only PDF and DOCX are accepted")]
    UnsupportedType(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// Runs blocking rusqlite work off the async runtime, folding both the join
/// failure and the db error into `ApiError`.
pub async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
        .map_err(ApiError::from)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(err) => {
                // Log the cause, hand the caller a generic message
                error!("internal error: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
