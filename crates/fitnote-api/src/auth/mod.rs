//! Authentication module
//!
//! Stateless bearer-token authentication:
//! - Token issuance and verification (`jwt`)
//! - Credential record to principal conversion (`principal`)
//! - Per-request authentication gate and extractors (`middleware`)
//! - 401 responses for anonymous access to protected routes (`unauthorized`)
//! - Registration, login and refresh (`service`)
//! - Argon2id password hashing and credential checks

pub mod credentials;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod principal;
pub mod repository;
pub mod service;
pub mod unauthorized;

pub use credentials::{CredentialVerifier, StoreCredentialVerifier, BAD_CREDENTIALS_MESSAGE};
pub use jwt::{Claims, Clock, SystemClock, TokenCodec, TokenError, TokenKind};
pub use middleware::{
    auth_gate_middleware, extract_bearer_token, AuthGate, CurrentPrincipal, GateOutcome,
    MaybePrincipal,
};
pub use password::{hash_password, verify_password, PasswordConfig, PasswordError};
pub use principal::{Principal, DEFAULT_AUTHORITY};
pub use repository::InMemoryCredentialStore;
pub use service::{
    AuthService, LoginRequest, ProfileResponse, RefreshRequest, RegisterRequest,
    TokenPairResponse,
};
pub use unauthorized::Unauthorized;
