//! API response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Standard API response wrapper: `{ "data": ... }`.
///
/// Failures are rendered by [`votebox_common::AppError`] itself as
/// `{ "error": { "code", "message" } }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    status: StatusCode,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response.
    pub const fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
        }
    }

    /// Create a response for a newly created resource.
    pub const fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Empty success response.
#[must_use]
pub fn ok() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_not_serialized() {
        let body = serde_json::to_string(&ApiResponse::created("x")).unwrap_or_default();
        assert_eq!(body, r#"{"data":"x"}"#);
    }

    #[test]
    fn test_created_status() {
        let response = ApiResponse::created(1).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
