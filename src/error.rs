//! Error taxonomy shared by every layer, and its mapping onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::storage::StorageError;
use crate::tokens::TokenRejection;

/// Request-terminal failure. Nothing is retried; each variant maps to one status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    DuplicateIdentity(String),

    /// Unknown identifier or wrong password.
    #[error("{0}")]
    AuthenticationFailure(&'static str),

    /// Rendered identically for every reason; the reason is only logged.
    #[error("Invalid token")]
    InvalidToken(#[from] TokenRejection),

    /// The identity resolved but lacks the right to act.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::DuplicateIdentity(_) => "DUPLICATE_IDENTITY",
            Self::AuthenticationFailure(_) => "AUTHENTICATION_FAILURE",
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DuplicateIdentity(_) | Self::AuthenticationFailure(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidToken(_) | Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::InvalidToken(reason) => {
                tracing::warn!(code = self.code(), reason = reason.reason(), "token rejected");
            }
            Self::DuplicateIdentity(identifier) => {
                tracing::info!(code = self.code(), %identifier, "registration rejected");
            }
            Self::Storage(e) => tracing::error!(code = self.code(), error = %e, "storage error"),
            Self::Internal(e) => tracing::error!(code = self.code(), error = %e, "internal error"),
            other => tracing::info!(code = other.code(), message = %other, "request rejected"),
        }
        // 5xx bodies stay generic; details only go to the log.
        let body = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, body).into_response()
    }
}

/// Result type alias for fallible store and handler operations.
pub type Result<T> = std::result::Result<T, ApiError>;
