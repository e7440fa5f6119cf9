//! API error handling
//!
//! Every error response, from any endpoint, uses the same JSON shape:
//! `{status, error, message, path}` plus `validationErrors` for invalid input.
//! Handlers return [`AppError`]; [`error_path_middleware`] fills in the
//! request path once the response comes back out of the router.
//!
//! Author: sd207@naver.com

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use utoipa::ToSchema;
use validator::ValidationErrors;

/// Message returned for any unexpected failure
pub const INTERNAL_ERROR_MESSAGE: &str =
    "An internal server error occurred. Please try again later.";

/// Uniform API error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Numeric HTTP status
    pub status: u16,
    /// HTTP reason phrase
    pub error: String,
    /// Human-readable message
    pub message: String,
    /// Request path that produced the error
    pub path: String,
    /// Field-level detail for validation failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<FieldError>,
}

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
            path: String::new(),
            validation_errors: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_validation_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.validation_errors = errors;
        self
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorResponse {
    /// Renders the body and keeps a copy in the response extensions so the
    /// path can be attached on the way out.
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.clone())).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Input failed field validation
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Request body could not be parsed
    #[error("{0}")]
    BadRequest(String),

    /// Email is already registered
    #[error("Email is already in use")]
    EmailConflict,

    /// Bad login, invalid or expired refresh token, or unknown token subject
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Unanticipated failure; the detail is logged, never returned
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::EmailConflict => StatusCode::CONFLICT,
            AppError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to the uniform response body (without path)
    pub fn to_error_response(&self) -> ErrorResponse {
        let status = self.status();
        match self {
            AppError::Validation(fields) => ErrorResponse::new(status, "Validation failed")
                .with_validation_errors(fields.clone()),
            AppError::Unexpected(_) => ErrorResponse::new(status, INTERNAL_ERROR_MESSAGE),
            other => ErrorResponse::new(status, other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Unexpected(detail) => {
                tracing::error!(error = %detail, "Unexpected error");
            }
            AppError::Validation(fields) => {
                tracing::warn!(
                    fields = %fields
                        .iter()
                        .map(|f| format!("{}={}", f.field, f.message))
                        .collect::<Vec<_>>()
                        .join(", "),
                    "Validation failed"
                );
            }
            other => {
                tracing::warn!(status = %other.status(), error = %other, "Request failed");
            }
        }

        self.to_error_response().into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = to_camel_case(&field);
                errs.iter().map(move |e| FieldError {
                    field: field.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();

        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation(fields)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Unexpected(err.to_string())
    }
}

impl From<fitnote_core::FitnoteError> for AppError {
    fn from(err: fitnote_core::FitnoteError) -> Self {
        use fitnote_core::FitnoteError;

        match err {
            FitnoteError::NotFound(msg) => AppError::NotFound(msg),
            FitnoteError::EmailConflict(_) => AppError::EmailConflict,
            FitnoteError::ValidationError(msg) => AppError::BadRequest(msg),
            FitnoteError::DatabaseError(msg) => {
                AppError::Unexpected(format!("Database error: {msg}"))
            }
            FitnoteError::ConfigError(msg) => {
                AppError::Unexpected(format!("Configuration error: {msg}"))
            }
            FitnoteError::Other(err) => AppError::Unexpected(err.to_string()),
        }
    }
}

/// Serde field names are camelCase; validator reports the Rust names
fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Attach the request path to any error body produced further in
pub async fn error_path_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let body = match response.extensions_mut().remove::<ErrorResponse>() {
        Some(body) => body,
        // The router answers a wrong method itself with an empty body
        None if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
            ErrorResponse::new(StatusCode::METHOD_NOT_ALLOWED, "Request method not supported")
        }
        None => return response,
    };

    let mut rendered = body.with_path(path).into_response();
    for (name, value) in response.headers() {
        if name != header::CONTENT_LENGTH && name != header::CONTENT_TYPE {
            rendered.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rendered
}

/// Turn a handler panic into the uniform 500 body
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "Handler panicked");
    ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).into_response()
}
