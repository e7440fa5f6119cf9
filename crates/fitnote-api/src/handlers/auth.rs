//! Authentication API handlers
//!
//! Public endpoints for registration, login and token refresh. The gate
//! never inspects these paths.
//!
//! Author: sd207@naver.com

use crate::audit::AuditContext;
use crate::auth::{LoginRequest, RefreshRequest, RegisterRequest, TokenPairResponse};
use crate::error::{AppError, ErrorResponse};
use crate::extract::ValidatedJson;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// Register a new user account
///
/// # Request Body
///
/// * `email` - Valid email address (unique, case-sensitive)
/// * `password` - At least 8 characters
/// * `displayName` - Non-blank display name
/// * `unitSystem` - Optional `KG` or `LB` (default `KG`)
/// * `timezone` - Optional IANA zone (default `Asia/Seoul`)
///
/// # Responses
///
/// * `201 Created` - Empty body
/// * `400 Bad Request` - Validation failure
/// * `409 Conflict` - Email already registered
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully"),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);
    state.auth.register(request, &context).await?;

    Ok(StatusCode::CREATED)
}

/// Login with email and password
///
/// Returns an access token and a refresh token with their lifetimes in
/// seconds. A wrong password and an unknown email produce the same 401.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenPairResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);
    let response = state.auth.login(request, &context).await?;

    Ok(Json(response))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair issued", body = TokenPairResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);
    let response = state.auth.refresh(request, &context).await?;

    Ok(Json(response))
}
