//! API route definitions
//!
//! Author: sd207@naver.com

use crate::handlers::{auth, health, users};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API routes
///
/// The authentication gate is applied once around the whole router, so the
/// split below only documents which routes the public allow-list covers.
pub fn api_routes() -> Router<Arc<AppState>> {
    // Public routes (on the allow-list)
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/refresh", post(auth::refresh_handler))
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Protected routes (handlers require a principal)
    let protected_routes = Router::new().route("/api/users/me", get(users::me_handler));

    Router::new().merge(public_routes).merge(protected_routes)
}
