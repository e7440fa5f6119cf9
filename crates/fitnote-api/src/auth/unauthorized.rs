//! 401 responses for protected routes reached without a principal

use crate::error::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Message when no bearer token was presented
pub const AUTHENTICATION_REQUIRED_MESSAGE: &str =
    "Full authentication is required to access this resource";

/// Message when a bearer token was presented but rejected
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";

/// Rejection produced when a route requires a principal and none is bound
///
/// Renders the uniform error body with status 401 and the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unauthorized {
    message: String,
    path: String,
}

impl Unauthorized {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn authentication_required(path: impl Into<String>) -> Self {
        Self::new(AUTHENTICATION_REQUIRED_MESSAGE, path)
    }

    pub fn invalid_token(path: impl Into<String>) -> Self {
        Self::new(INVALID_TOKEN_MESSAGE, path)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let message = if self.message.trim().is_empty() {
            AUTHENTICATION_REQUIRED_MESSAGE.to_string()
        } else {
            self.message
        };

        tracing::debug!(path = %self.path, message = %message, "Rejecting unauthenticated request");

        ErrorResponse::new(StatusCode::UNAUTHORIZED, message)
            .with_path(self.path)
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unauthorized_body_shape() {
        let response = Unauthorized::authentication_required("/api/users/me").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["status"], 401);
        assert_eq!(json["error"], "Unauthorized");
        assert_eq!(json["message"], AUTHENTICATION_REQUIRED_MESSAGE);
        assert_eq!(json["path"], "/api/users/me");
        assert!(json.get("validationErrors").is_none());
    }

    #[tokio::test]
    async fn test_blank_message_falls_back() {
        let response = Unauthorized::new("", "/x").into_response();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["message"], AUTHENTICATION_REQUIRED_MESSAGE);
    }
}
