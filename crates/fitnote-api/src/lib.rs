//! FitNote API - REST server with stateless bearer-token authentication
//!
//! Provides registration, login and token refresh endpoints, an
//! authentication gate for every other route, and a uniform JSON error body.
//!
//! Author: sd207@naver.com

pub mod audit;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use crate::auth::auth_gate_middleware;
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "FitNote API",
        description = "Workout tracking API with stateless JWT authentication",
        contact(name = "FitNote", email = "sd207@naver.com")
    ),
    paths(
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::refresh_handler,
        handlers::users::me_handler,
        handlers::health::health_check,
        handlers::health::readiness_check,
    ),
    components(schemas(
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::RefreshRequest,
        auth::TokenPairResponse,
        auth::ProfileResponse,
        error::ErrorResponse,
        error::FieldError,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "users", description = "Authenticated user profile"),
        (name = "health", description = "Liveness and readiness probes"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the application router
///
/// Layers, outermost first: security headers, error path, CORS, panic
/// catcher, request tracing, authentication gate.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/v3/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(routes::api_routes())
        .fallback(handlers::fallback_handler)
        .layer(axum_middleware::from_fn_with_state(
            state.gate.clone(),
            auth_gate_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::error_path_middleware))
        .layer(axum_middleware::from_fn(
            middleware::security_headers_middleware,
        ))
}

/// CORS for the configured origins only; no origins means no CORS headers
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Router over an in-memory store with fast password hashing
#[cfg(feature = "test-utils")]
pub async fn create_router_for_testing() -> Router {
    testing::test_app().await.router
}
