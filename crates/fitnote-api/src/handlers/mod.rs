//! API handlers
//!
//! Author: sd207@naver.com

pub mod auth;
pub mod health;
pub mod users;

use crate::auth::middleware::unauthorized_for;
use crate::auth::Principal;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Fallback for unmatched routes
///
/// Every non-public path is protected, so an anonymous caller gets 401
/// before learning whether the route exists.
pub async fn fallback_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, _) = request.into_parts();

    if !state.gate.is_public(parts.uri.path()) && parts.extensions.get::<Principal>().is_none() {
        return unauthorized_for(&parts).into_response();
    }

    AppError::NotFound("Resource".to_string()).into_response()
}
