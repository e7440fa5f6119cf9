//! Security headers middleware
//!
//! Adds security headers to every HTTP response:
//! - X-Content-Type-Options: nosniff
//! - X-Frame-Options: DENY
//! - Strict-Transport-Security
//! - Content-Security-Policy (relaxed for the Swagger UI pages)
//! - Referrer-Policy
//! - Cache-Control: no-store on `/api/` responses, which carry tokens and profiles
//!
//! Author: sd207@naver.com

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

const API_CSP: &str = "default-src 'none'; frame-ancestors 'none'";
const DOCS_CSP: &str = concat!(
    "default-src 'self'; ",
    "script-src 'self' 'unsafe-inline'; ",
    "style-src 'self' 'unsafe-inline'; ",
    "img-src 'self' data:"
);

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );

    let csp = if path.starts_with("/swagger-ui") {
        DOCS_CSP
    } else {
        API_CSP
    };
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(csp),
    );

    if path.starts_with("/api/") {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{Request, StatusCode},
        middleware,
        response::IntoResponse,
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    async fn ok_handler() -> impl IntoResponse {
        (StatusCode::OK, "test response")
    }

    fn app() -> Router {
        Router::new()
            .route("/api/auth/login", post(ok_handler))
            .route("/swagger-ui/index.html", get(ok_handler))
            .route("/health", get(ok_handler))
            .route(
                "/api/error",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "error") }),
            )
            .layer(middleware::from_fn(security_headers_middleware))
    }

    #[tokio::test]
    async fn test_token_responses_not_cached() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        let headers = response.headers();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(headers.get(header::CONTENT_SECURITY_POLICY).unwrap(), API_CSP);
        assert_eq!(headers.get(header::REFERRER_POLICY).unwrap(), "no-referrer");
    }

    #[tokio::test]
    async fn test_docs_get_relaxed_policy() {
        let request = Request::builder()
            .uri("/swagger-ui/index.html")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(
            response.headers().get(header::CONTENT_SECURITY_POLICY).unwrap(),
            DOCS_CSP
        );
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }

    #[tokio::test]
    async fn test_security_headers_on_error_response() {
        let request = Request::builder()
            .uri("/api/error")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response
            .headers()
            .get(header::STRICT_TRANSPORT_SECURITY)
            .is_some());
        assert!(response.headers().get(header::CACHE_CONTROL).is_some());
    }
}
