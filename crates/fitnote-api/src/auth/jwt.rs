//! JWT token generation and validation
//!
//! Implements bearer tokens signed with HMAC-SHA256. Every token carries the
//! subject (email), issue and expiry timestamps, a unique id and a kind
//! discriminator separating access tokens from refresh tokens.
//!
//! The signing key is derived once when the [`TokenCodec`] is built and is
//! shared read-only by every operation, so a single codec can be used from
//! any number of concurrent requests without locking.

use chrono::{DateTime, Utc};
use fitnote_core::config::{AuthConfig, MIN_SECRET_BYTES};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Discriminates short-lived access tokens from longer-lived refresh tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "ACCESS",
            TokenKind::Refresh => "REFRESH",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT Claims structure
///
/// These claims are embedded in every token and returned after the
/// signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user's email address
    pub sub: String,
    /// JWT ID - unique token identifier
    pub jti: String,
    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: u64,
    /// Access or refresh
    pub token_type: TokenKind,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode JWT: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    Malformed,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Unsupported token algorithm")]
    UnsupportedAlgorithm,

    #[error("JWT secret must be at least {min} bytes, got {actual}")]
    WeakSecret { min: usize, actual: usize },
}

/// Source of the current time for issuing and expiring tokens
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Issues, verifies and parses signed tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Derive the signing key and token lifetimes from configuration
    ///
    /// Fails when the secret is shorter than 256 bits.
    pub fn new(config: &AuthConfig) -> Result<Self, TokenError> {
        let secret = config.jwt_secret.as_bytes();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(TokenError::WeakSecret {
                min: MIN_SECRET_BYTES,
                actual: secret.len(),
            });
        }

        // Expiry is checked against the injected clock in `claims`
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl: Duration::from_millis(config.access_token_validity_ms),
            refresh_ttl: Duration::from_millis(config.refresh_token_validity_ms),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configured access token lifetime
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Configured refresh token lifetime
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Lifetime configured for a token kind
    pub fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Build and sign a token for `subject`
    ///
    /// `iat` is the current time truncated to whole seconds. `exp` is
    /// `now + ttl` rounded up, so a token never expires before its full
    /// lifetime has elapsed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use fitnote_api::auth::jwt::{TokenCodec, TokenKind};
    /// use fitnote_core::AuthConfig;
    ///
    /// let codec = TokenCodec::new(&AuthConfig::default()).unwrap();
    /// let token = codec
    ///     .issue("a@x.com", TokenKind::Access, codec.access_ttl())
    ///     .expect("Failed to issue token");
    /// assert!(codec.validate(&token));
    /// ```
    pub fn issue(
        &self,
        subject: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = self.clock.now();
        let issued_ms = now.timestamp_millis().max(0) as u64;
        let expiry_ms = issued_ms.saturating_add(ttl.as_millis() as u64);

        let claims = Claims {
            sub: subject.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_ms / 1000,
            exp: expiry_ms.div_ceil(1000),
            token_type: kind,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// Issue a token with the lifetime configured for `kind`
    pub fn issue_for(&self, subject: &str, kind: TokenKind) -> Result<String, TokenError> {
        self.issue(subject, kind, self.ttl_for(kind))
    }

    /// Check that a token is well-formed, correctly signed and not expired
    ///
    /// Every failure cause collapses into `false`. Callers that need the
    /// reason use [`TokenCodec::claims`].
    pub fn validate(&self, token: &str) -> bool {
        self.claims(token).is_ok()
    }

    /// Verify the signature and expiry, then return the claim set
    pub fn claims(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => {
                    TokenError::UnsupportedAlgorithm
                }
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            },
        )?;

        let claims = token_data.claims;
        let now_ms = self.clock.now().timestamp_millis();
        if now_ms > (claims.exp as i64).saturating_mul(1000) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Extract the subject (email) from a verified token
    pub fn subject(&self, token: &str) -> Result<String, TokenError> {
        self.claims(token).map(|claims| claims.sub)
    }
}
