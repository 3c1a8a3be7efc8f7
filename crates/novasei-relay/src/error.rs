//! Relay error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::mailer::MailError;
use crate::storage::StorageError;

/// Relay error type.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Download link has expired")]
    LinkExpired,

    #[error("File not found")]
    FileNotFound,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Email error: {0}")]
    Mail(#[from] MailError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            RelayError::Validation(msg) => {
                tracing::debug!("Rejected request: {}", msg);
                json_error(StatusCode::BAD_REQUEST, msg.clone())
            }
            RelayError::MissingToken | RelayError::InvalidToken => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            RelayError::LinkExpired => (StatusCode::GONE, self.to_string()).into_response(),
            RelayError::FileNotFound => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            RelayError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                internal_error()
            }
            RelayError::Mail(e) => {
                tracing::error!("Email error: {}", e);
                internal_error()
            }
            RelayError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal_error()
            }
        }
    }
}

fn json_error(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}

fn internal_error() -> Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

pub type Result<T> = std::result::Result<T, RelayError>;
