//! Authentication gate and principal extractors
//!
//! The gate runs once per request. It never rejects a request itself: a
//! missing, malformed or stale bearer token simply leaves the request
//! unauthenticated. Protected handlers take [`CurrentPrincipal`], which turns
//! an absent principal into the uniform 401 body.
//!
//! # Usage
//!
//! ```ignore
//! use axum::{middleware, routing::get, Router};
//! use fitnote_api::auth::middleware::{auth_gate_middleware, AuthGate, CurrentPrincipal};
//!
//! async fn protected(CurrentPrincipal(principal): CurrentPrincipal) -> String {
//!     format!("Hello, {}!", principal.email)
//! }
//!
//! let app = Router::new()
//!     .route("/protected", get(protected))
//!     .layer(middleware::from_fn_with_state(gate, auth_gate_middleware));
//! ```

use super::jwt::TokenCodec;
use super::principal::Principal;
use super::unauthorized::Unauthorized;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use fitnote_core::CredentialStore;
use std::ops::Deref;
use std::sync::Arc;

/// Extension marker left by the gate when a presented token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRejected;

/// Result of inspecting a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Path is on the public allow-list; no inspection done
    Public,
    /// No bearer token was presented
    Anonymous,
    /// A token was presented but did not resolve to a principal
    Rejected(String),
    Authenticated(Principal),
}

/// Shared gate state
#[derive(Clone)]
pub struct AuthGate {
    codec: Arc<TokenCodec>,
    store: Arc<dyn CredentialStore>,
    public_paths: Arc<[String]>,
}

impl AuthGate {
    pub fn new(
        codec: Arc<TokenCodec>,
        store: Arc<dyn CredentialStore>,
        public_paths: Vec<String>,
    ) -> Self {
        Self {
            codec,
            store,
            public_paths: public_paths.into(),
        }
    }

    /// Whether a path bypasses the gate (prefix match)
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Resolve the principal for a request, if any
    pub async fn inspect(&self, path: &str, headers: &HeaderMap) -> GateOutcome {
        if self.is_public(path) {
            return GateOutcome::Public;
        }

        let token = match extract_bearer_token(headers) {
            Some(token) => token,
            None => return GateOutcome::Anonymous,
        };

        if !self.codec.validate(token) {
            return GateOutcome::Rejected("Invalid token".to_string());
        }

        let subject = match self.codec.subject(token) {
            Ok(subject) => subject,
            Err(e) => return GateOutcome::Rejected(e.to_string()),
        };

        match self.store.find_by_email(&subject).await {
            Ok(Some(record)) => GateOutcome::Authenticated(Principal::from(record)),
            Ok(None) => GateOutcome::Rejected("Token subject no longer exists".to_string()),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    store = self.store.name(),
                    "Credential lookup failed while authenticating request"
                );
                GateOutcome::Rejected("Credential lookup failed".to_string())
            }
        }
    }
}

/// Read the token from an `Authorization: Bearer <token>` header
///
/// A missing header, another scheme or an empty token all count as no token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Gate middleware
///
/// Binds a [`Principal`] into the request extensions when the bearer token
/// verifies and its subject still exists. Otherwise the request continues
/// unauthenticated. An anonymous wrong-method request on a protected path
/// gets 401, not 405.
pub async fn auth_gate_middleware(
    State(gate): State<AuthGate>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let mut anonymous = true;
    let mut rejected = false;

    match gate.inspect(&path, request.headers()).await {
        GateOutcome::Public => anonymous = false,
        GateOutcome::Anonymous => {}
        GateOutcome::Authenticated(principal) => {
            tracing::debug!(user_id = %principal.id, path = %path, "Request authenticated");
            request.extensions_mut().insert(principal);
            anonymous = false;
        }
        GateOutcome::Rejected(reason) => {
            audit_log(&AuditEvent::InvalidToken {
                path: path.clone(),
                reason,
                ip_address: extract_ip_address(request.headers()),
                user_agent: extract_user_agent(request.headers()),
            });
            request.extensions_mut().insert(TokenRejected);
            rejected = true;
        }
    }

    let response = next.run(request).await;
    if anonymous && response.status() == StatusCode::METHOD_NOT_ALLOWED {
        let unauthorized = if rejected {
            Unauthorized::invalid_token(path)
        } else {
            Unauthorized::authentication_required(path)
        };
        return unauthorized.into_response();
    }

    response
}

/// Extractor that requires an authenticated principal
///
/// Rejects with 401 when the gate bound none.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl Deref for CurrentPrincipal {
    type Target = Principal;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = Unauthorized;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(principal) => Ok(Self(principal.clone())),
            None => Err(unauthorized_for(parts)),
        }
    }
}

/// Extractor for optional authentication
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

impl Deref for MaybePrincipal {
    type Target = Option<Principal>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybePrincipal
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned()))
    }
}

/// Responder output for a request that reached a protected route anonymously
pub fn unauthorized_for(parts: &Parts) -> Unauthorized {
    let path = parts.uri.path();
    if parts.extensions.get::<TokenRejected>().is_some() {
        Unauthorized::invalid_token(path)
    } else {
        Unauthorized::authentication_required(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenKind;
    use crate::auth::repository::InMemoryCredentialStore;
    use crate::auth::unauthorized::{AUTHENTICATION_REQUIRED_MESSAGE, INVALID_TOKEN_MESSAGE};
    use axum::{middleware, routing::get, Router};
    use fitnote_core::{AuthConfig, NewCredential, UnitSystem, DEFAULT_TIMEZONE};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn protected(CurrentPrincipal(principal): CurrentPrincipal) -> String {
        principal.email
    }

    async fn optional(MaybePrincipal(principal): MaybePrincipal) -> String {
        principal.map(|p| p.email).unwrap_or_else(|| "guest".to_string())
    }

    async fn setup() -> (Router, Arc<TokenCodec>) {
        let config = AuthConfig::default();
        let codec = Arc::new(TokenCodec::new(&config).unwrap());
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .save(NewCredential {
                email: "a@x.com".to_string(),
                password_hash: "unused".to_string(),
                display_name: "A".to_string(),
                unit_system: UnitSystem::Kg,
                timezone: DEFAULT_TIMEZONE.to_string(),
            })
            .await
            .unwrap();

        let gate = AuthGate::new(codec.clone(), store, config.public_paths);
        let app = Router::new()
            .route("/protected", get(protected))
            .route("/optional", get(optional))
            .route("/api/auth/ping", get(optional))
            .layer(middleware::from_fn_with_state(gate, auth_gate_middleware));

        (app, codec)
    }

    fn request(uri: &str, authorization: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[tokio::test]
    async fn test_valid_token_binds_principal() {
        let (app, codec) = setup().await;
        let token = codec.issue_for("a@x.com", TokenKind::Access).unwrap();

        let response = app
            .oneshot(request("/protected", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "a@x.com");
    }

    #[tokio::test]
    async fn test_missing_token_rejected_by_extractor() {
        let (app, _) = setup().await;

        let response = app.oneshot(request("/protected", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["message"], AUTHENTICATION_REQUIRED_MESSAGE);
        assert_eq!(json["path"], "/protected");
    }

    #[tokio::test]
    async fn test_invalid_token_is_ignored_then_rejected() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(request("/protected", Some("Bearer not-a-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["message"], INVALID_TOKEN_MESSAGE);
    }

    #[tokio::test]
    async fn test_invalid_token_on_optional_route_is_anonymous() {
        let (app, _) = setup().await;

        let response = app
            .oneshot(request("/optional", Some("Bearer not-a-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "guest");
    }

    #[tokio::test]
    async fn test_unknown_subject_not_authenticated() {
        let (app, codec) = setup().await;
        let token = codec.issue_for("ghost@x.com", TokenKind::Access).unwrap();

        let response = app
            .oneshot(request("/protected", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_path_skips_gate() {
        let (app, codec) = setup().await;
        let token = codec.issue_for("a@x.com", TokenKind::Access).unwrap();

        // Even a valid token is not inspected on a public path
        let response = app
            .oneshot(request("/api/auth/ping", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "guest");
    }

    #[tokio::test]
    async fn test_wrong_method_on_protected_route_hides_route() {
        let (app, codec) = setup().await;

        let anonymous = axum::http::Request::builder()
            .method("POST")
            .uri("/protected")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(anonymous).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["message"], AUTHENTICATION_REQUIRED_MESSAGE);
        assert_eq!(json["path"], "/protected");

        let token = codec.issue_for("a@x.com", TokenKind::Access).unwrap();
        let authenticated = axum::http::Request::builder()
            .method("POST")
            .uri("/protected")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(authenticated).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_inspect_outcomes() {
        let config = AuthConfig::default();
        let codec = Arc::new(TokenCodec::new(&config).unwrap());
        let gate = AuthGate::new(
            codec,
            Arc::new(InMemoryCredentialStore::new()),
            config.public_paths,
        );

        assert_eq!(
            gate.inspect("/swagger-ui/index.html", &HeaderMap::new()).await,
            GateOutcome::Public
        );
        assert_eq!(
            gate.inspect("/api/users/me", &HeaderMap::new()).await,
            GateOutcome::Anonymous
        );

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer x.y.z".parse().unwrap());
        assert!(matches!(
            gate.inspect("/api/users/me", &headers).await,
            GateOutcome::Rejected(_)
        ));
    }
}
