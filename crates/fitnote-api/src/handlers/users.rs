//! User profile handlers
//!
//! Author: sd207@naver.com

use crate::auth::{CurrentPrincipal, ProfileResponse};
use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

/// Get the authenticated user's profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user profile", body = ProfileResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth.profile(&principal).await?;
    Ok(Json(profile))
}
