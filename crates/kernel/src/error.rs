//! Application error types.
//!
//! Every failure a handler can produce is mapped to a JSON `{error}` body
//! here, and logged before the response leaves the service.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::services::identity::IdentityError;
use crate::store::StoreError;

/// Marker that precedes validation messages in store errors.
const VALIDATION_PREFIX: &str = "Validation failed:";

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid API key")]
    Unauthorized,

    #[error("Missing required parameters")]
    MissingParameters,

    #[error("user not registered")]
    UserNotRegistered,

    /// Content validation failed; holds the messages without their prefix.
    #[error("{0}")]
    Validation(String),

    /// Anything else. The raw message is surfaced to the caller.
    #[error("{0:#}")]
    Unexpected(anyhow::Error),

    #[error("not found")]
    NotFound,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MissingParameters
            | AppError::UserNotRegistered
            | AppError::Validation(_)
            | AppError::Unexpected(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(errors) => {
                AppError::Validation(strip_validation_prefix(&errors.to_string()).to_string())
            }
            StoreError::Other(e) => AppError::Unexpected(e),
            other => AppError::Unexpected(anyhow::Error::new(other)),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingSubject => AppError::UserNotRegistered,
            IdentityError::Store(e) => e.into(),
            IdentityError::Other(e) => AppError::Unexpected(e),
            other @ IdentityError::UsernamesExhausted(_) => {
                AppError::Unexpected(anyhow::Error::new(other))
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Unexpected(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Unauthorized | AppError::MissingParameters | AppError::NotFound => {
                tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
            }
            AppError::UserNotRegistered => {
                tracing::warn!(error = %self, "identity payload has no subject");
            }
            AppError::Validation(messages) => {
                tracing::error!(error = %messages, "content validation failed");
            }
            AppError::Unexpected(e) => {
                tracing::error!(error = ?e, "request failed");
            }
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Text after the last `Validation failed:` marker, trimmed. Messages
/// without the marker are returned unchanged.
pub fn strip_validation_prefix(message: &str) -> &str {
    match message.rfind(VALIDATION_PREFIX) {
        Some(idx) => message[idx + VALIDATION_PREFIX.len()..].trim(),
        None => message,
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
