// error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures that abort the current call. Duplicate votes and unknown option
/// codes are normal outcomes, not errors, and never appear here.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("poll not found: {0}")]
    PollNotFound(String),

    #[error("contact not found: {0}")]
    ContactNotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::PollNotFound(_) | AppError::ContactNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
