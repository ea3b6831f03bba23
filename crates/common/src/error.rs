//! Error types for votebox.

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Which table a failed storage call was touching.
///
/// Only used to tell failures apart in logs; end users see a single
/// message per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageCategory {
    /// The `poll` table.
    Poll,
    /// The `poll_option` table.
    Options,
    /// The `vote` table.
    Votes,
    /// The `user` table.
    Users,
}

impl StorageCategory {
    /// Message shown to the end user when a call in this category fails.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Poll => "Error saving poll.",
            Self::Options => "Error saving poll options.",
            Self::Votes => "Failed to submit vote. You may have already voted.",
            Self::Users => "Error saving account.",
        }
    }
}

impl fmt::Display for StorageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Poll => "poll",
            Self::Options => "options",
            Self::Votes => "votes",
            Self::Users => "users",
        };
        f.write_str(name)
    }
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // === Server Errors ===
    #[error("Storage error ({category}): {detail}")]
    Storage {
        category: StorageCategory,
        detail: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build a storage error for the given category.
    pub fn storage(category: StorageCategory, detail: impl ToString) -> Self {
        Self::Storage {
            category,
            detail: detail.to_string(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,

            // 5xx Server Errors
            Self::Storage { .. } | Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The message that is safe to show to the end user.
    ///
    /// Storage failures collapse to their category's message; the detail
    /// only goes to the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Storage { category, .. } => category.user_message().to_string(),
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether this is a storage failure of the given category.
    #[must_use]
    pub fn is_storage(&self, category: StorageCategory) -> bool {
        matches!(self, Self::Storage { category: c, .. } if *c == category)
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        match &self {
            Self::Storage { category, detail } => {
                tracing::error!(%category, detail = %detail, code, "Storage call failed");
            }
            other if other.is_server_error() => {
                tracing::error!(error = %other, code, "Server error occurred");
            }
            other => {
                tracing::debug!(error = %other, code, "Client error occurred");
            }
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.public_message(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::storage(StorageCategory::Votes, "dup").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_error_hides_detail() {
        let err = AppError::storage(
            StorageCategory::Votes,
            "duplicate key value violates unique constraint",
        );
        assert_eq!(
            err.public_message(),
            "Failed to submit vote. You may have already voted."
        );
        assert!(err.to_string().contains("votes"));
        assert!(err.is_storage(StorageCategory::Votes));
        assert!(!err.is_storage(StorageCategory::Poll));
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn test_validation_message_is_public() {
        let err = AppError::Validation("Title is required".to_string());
        assert_eq!(err.public_message(), "Validation error: Title is required");
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_into_response_status() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
