//! Authentication service layer
//!
//! Registration, login and token refresh. The service coordinates password
//! hashing, the credential store and the token codec; it is only reached
//! from the public `/api/auth/*` endpoints.

use super::credentials::CredentialVerifier;
use super::jwt::{TokenCodec, TokenKind};
use super::password::{hash_password_async, PasswordConfig};
use super::principal::Principal;
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::AppError;
use fitnote_core::{
    CredentialRecord, CredentialStore, FitnoteError, NewCredential, UnitSystem, DEFAULT_TIMEZONE,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::{Validate, ValidateEmail, ValidationError};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Message for a rejected refresh token or an unknown token subject
pub const INVALID_REFRESH_MESSAGE: &str = "Invalid or expired refresh token";

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(custom(function = "validate_email_address"))]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = "validate_password_length"))]
    pub password: String,

    #[serde(default)]
    #[validate(custom(function = "validate_display_name"))]
    pub display_name: String,

    /// Defaults to KG
    #[schema(value_type = Option<String>, example = "KG")]
    pub unit_system: Option<UnitSystem>,

    /// Defaults to Asia/Seoul
    pub timezone: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(custom(function = "validate_email_address"))]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = "validate_password_present"))]
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    #[validate(custom(function = "validate_refresh_token"))]
    pub refresh_token: String,
}

/// Access and refresh token pair
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub access_token_expires_in_seconds: u64,
    pub refresh_token: String,
    pub refresh_token_expires_in_seconds: u64,
    /// Always "Bearer"
    pub token_type: String,
}

/// Profile of the authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    #[schema(value_type = String, example = "KG")]
    pub unit_system: UnitSystem,
    pub timezone: String,
    pub authorities: Vec<String>,
}

impl ProfileResponse {
    fn new(record: &CredentialRecord, principal: &Principal) -> Self {
        Self {
            id: record.id.0,
            email: record.email.clone(),
            display_name: record.display_name.clone(),
            unit_system: record.unit_system,
            timezone: record.timezone.clone(),
            authorities: principal
                .authorities()
                .iter()
                .map(|a| a.to_string())
                .collect(),
        }
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn validate_email_address(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(field_error("required", "Email is required"));
    }
    if !email.validate_email() {
        return Err(field_error("email", "Email must be a valid email address"));
    }
    Ok(())
}

fn validate_password_length(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(field_error("required", "Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(field_error(
            "length",
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

fn validate_password_present(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(field_error("required", "Password is required"));
    }
    Ok(())
}

fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(field_error("required", "Display name is required"));
    }
    Ok(())
}

fn validate_refresh_token(token: &str) -> Result<(), ValidationError> {
    if token.trim().is_empty() {
        return Err(field_error("required", "Refresh token is required"));
    }
    Ok(())
}

/// Authentication service
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn CredentialVerifier>,
    codec: Arc<TokenCodec>,
    password_config: PasswordConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn CredentialVerifier>,
        codec: Arc<TokenCodec>,
        password_config: PasswordConfig,
    ) -> Self {
        Self {
            store,
            verifier,
            codec,
            password_config,
        }
    }

    /// Register a new user
    ///
    /// Fails with [`AppError::EmailConflict`] when the email is taken. The
    /// existence check runs first for a clean 409; the store's uniqueness
    /// constraint still decides the race between two concurrent requests.
    /// No token is issued.
    pub async fn register(
        &self,
        request: RegisterRequest,
        context: &AuditContext,
    ) -> Result<CredentialRecord, AppError> {
        let email = request.email.clone();

        match self.create_credential(request).await {
            Ok(record) => {
                audit_log(&AuditEvent::RegistrationSuccess {
                    user_id: record.id,
                    email: record.email.clone(),
                    ip_address: context.ip_address.clone(),
                    user_agent: context.user_agent.clone(),
                });
                Ok(record)
            }
            Err(e) => {
                audit_log(&AuditEvent::RegistrationFailure {
                    email,
                    reason: e.to_string(),
                    ip_address: context.ip_address.clone(),
                    user_agent: context.user_agent.clone(),
                });
                Err(e)
            }
        }
    }

    async fn create_credential(
        &self,
        request: RegisterRequest,
    ) -> Result<CredentialRecord, AppError> {
        if self.store.exists_by_email(&request.email).await? {
            return Err(AppError::EmailConflict);
        }

        let password_hash = hash_password_async(request.password, self.password_config.clone())
            .await
            .map_err(|e| AppError::Unexpected(format!("Failed to hash password: {e}")))?;

        let credential = NewCredential {
            email: request.email,
            password_hash,
            display_name: request.display_name,
            unit_system: request.unit_system.unwrap_or_default(),
            timezone: request
                .timezone
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        };

        self.store.save(credential).await.map_err(|e| match e {
            FitnoteError::EmailConflict(_) => AppError::EmailConflict,
            other => AppError::from(other),
        })
    }

    /// Login with email and password
    ///
    /// Wrong password and unknown email fail identically.
    pub async fn login(
        &self,
        request: LoginRequest,
        context: &AuditContext,
    ) -> Result<TokenPairResponse, AppError> {
        let principal = match self
            .verifier
            .verify_credentials(&request.email, &request.password)
            .await
        {
            Ok(principal) => principal,
            Err(e) => {
                audit_log(&AuditEvent::LoginFailure {
                    email: request.email,
                    reason: e.to_string(),
                    ip_address: context.ip_address.clone(),
                    user_agent: context.user_agent.clone(),
                });
                return Err(e);
            }
        };

        let pair = self.issue_pair(&principal)?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: principal.id,
            email: principal.email,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
        });

        Ok(pair)
    }

    /// Exchange a valid refresh token for a new token pair
    ///
    /// Two policy gaps are kept as-is:
    /// - the presented refresh token is not revoked and stays valid until
    ///   its own expiry;
    /// - the `token_type` claim is not checked, so an unexpired access token
    ///   is accepted here too.
    pub async fn refresh(
        &self,
        request: RefreshRequest,
        context: &AuditContext,
    ) -> Result<TokenPairResponse, AppError> {
        match self.refresh_pair(&request.refresh_token).await {
            Ok((principal, pair)) => {
                audit_log(&AuditEvent::TokenRefresh {
                    user_id: principal.id,
                    email: principal.email,
                    ip_address: context.ip_address.clone(),
                    user_agent: context.user_agent.clone(),
                });
                Ok(pair)
            }
            Err(e) => {
                audit_log(&AuditEvent::TokenRefreshFailure {
                    reason: e.to_string(),
                    ip_address: context.ip_address.clone(),
                    user_agent: context.user_agent.clone(),
                });
                Err(e)
            }
        }
    }

    async fn refresh_pair(&self, token: &str) -> Result<(Principal, TokenPairResponse), AppError> {
        let invalid = || AppError::InvalidCredentials(INVALID_REFRESH_MESSAGE.to_string());

        if !self.codec.validate(token) {
            return Err(invalid());
        }

        let subject = self.codec.subject(token).map_err(|_| invalid())?;
        let record = self
            .store
            .find_by_email(&subject)
            .await?
            .ok_or_else(invalid)?;

        let principal = Principal::from(record);
        let pair = self.issue_pair(&principal)?;
        Ok((principal, pair))
    }

    /// Load the profile for an authenticated principal
    pub async fn profile(&self, principal: &Principal) -> Result<ProfileResponse, AppError> {
        let record = self
            .store
            .find_by_id(principal.id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        Ok(ProfileResponse::new(&record, principal))
    }

    fn issue_pair(&self, principal: &Principal) -> Result<TokenPairResponse, AppError> {
        let issue = |kind| {
            self.codec
                .issue_for(principal.subject(), kind)
                .map_err(|e| AppError::Unexpected(format!("Failed to issue {kind} token: {e}")))
        };

        Ok(TokenPairResponse {
            access_token: issue(TokenKind::Access)?,
            access_token_expires_in_seconds: self.codec.access_ttl().as_secs(),
            refresh_token: issue(TokenKind::Refresh)?,
            refresh_token_expires_in_seconds: self.codec.refresh_ttl().as_secs(),
            token_type: "Bearer".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::StoreCredentialVerifier;
    use crate::auth::repository::InMemoryCredentialStore;
    use crate::testing::ManualClock;
    use fitnote_core::{AuthConfig, UserId};
    use std::time::Duration;

    struct Fixture {
        service: AuthService,
        store: Arc<InMemoryCredentialStore>,
        codec: Arc<TokenCodec>,
        clock: Arc<ManualClock>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryCredentialStore::new());
        let clock = ManualClock::new();
        let codec = Arc::new(
            TokenCodec::new(&AuthConfig::default())
                .unwrap()
                .with_clock(clock.clone()),
        );
        let verifier = Arc::new(
            StoreCredentialVerifier::new(store.clone(), PasswordConfig::fast())
                .await
                .unwrap(),
        );

        Fixture {
            service: AuthService::new(
                store.clone(),
                verifier,
                codec.clone(),
                PasswordConfig::fast(),
            ),
            store,
            codec,
            clock,
        }
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "password1".to_string(),
            display_name: "A".to_string(),
            unit_system: None,
            timezone: None,
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_applies_defaults() {
        let f = fixture().await;
        let ctx = AuditContext::default();

        let record = f.service.register(register_request("a@x.com"), &ctx).await.unwrap();

        assert_eq!(record.id, UserId(1));
        assert_eq!(record.unit_system, UnitSystem::Kg);
        assert_eq!(record.timezone, "Asia/Seoul");
        assert!(record.password_hash.starts_with("$argon2id$"));
        assert_ne!(record.password_hash, "password1");
    }

    #[tokio::test]
    async fn test_register_keeps_supplied_preferences() {
        let f = fixture().await;
        let mut request = register_request("b@x.com");
        request.unit_system = Some(UnitSystem::Lb);
        request.timezone = Some("Europe/Berlin".to_string());

        let record = f
            .service
            .register(request, &AuditContext::default())
            .await
            .unwrap();

        assert_eq!(record.unit_system, UnitSystem::Lb);
        assert_eq!(record.timezone, "Europe/Berlin");
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let f = fixture().await;
        let ctx = AuditContext::default();

        f.service.register(register_request("a@x.com"), &ctx).await.unwrap();
        let result = f.service.register(register_request("a@x.com"), &ctx).await;

        assert!(matches!(result, Err(AppError::EmailConflict)));
        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_login_issues_distinct_valid_pair() {
        let f = fixture().await;
        let ctx = AuditContext::default();
        f.service.register(register_request("a@x.com"), &ctx).await.unwrap();

        let pair = f
            .service
            .login(login_request("a@x.com", "password1"), &ctx)
            .await
            .unwrap();

        assert_ne!(pair.access_token, pair.refresh_token);
        assert!(f.codec.validate(&pair.access_token));
        assert!(f.codec.validate(&pair.refresh_token));
        assert_eq!(pair.access_token_expires_in_seconds, 3600);
        assert_eq!(pair.refresh_token_expires_in_seconds, 604_800);
        assert_eq!(pair.token_type, "Bearer");

        let access = f.codec.claims(&pair.access_token).unwrap();
        let refresh = f.codec.claims(&pair.refresh_token).unwrap();
        assert_eq!(access.token_type, TokenKind::Access);
        assert_eq!(refresh.token_type, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let f = fixture().await;
        let ctx = AuditContext::default();
        f.service.register(register_request("a@x.com"), &ctx).await.unwrap();

        let wrong = f
            .service
            .login(login_request("a@x.com", "password2"), &ctx)
            .await
            .unwrap_err();
        let unknown = f
            .service
            .login(login_request("nobody@x.com", "password1"), &ctx)
            .await
            .unwrap_err();

        assert_eq!(wrong.status(), unknown.status());
        assert_eq!(wrong.to_error_response(), unknown.to_error_response());
    }

    #[tokio::test]
    async fn test_refresh_issues_new_pair_for_same_subject() {
        let f = fixture().await;
        let ctx = AuditContext::default();
        f.service.register(register_request("a@x.com"), &ctx).await.unwrap();
        let pair = f
            .service
            .login(login_request("a@x.com", "password1"), &ctx)
            .await
            .unwrap();

        let refreshed = f
            .service
            .refresh(
                RefreshRequest {
                    refresh_token: pair.refresh_token.clone(),
                },
                &ctx,
            )
            .await
            .unwrap();

        assert_ne!(refreshed.access_token, pair.access_token);
        assert_eq!(f.codec.subject(&refreshed.access_token).unwrap(), "a@x.com");
        // The superseded refresh token is not revoked
        assert!(f.codec.validate(&pair.refresh_token));
    }

    #[tokio::test]
    async fn test_refresh_accepts_access_token() {
        let f = fixture().await;
        let ctx = AuditContext::default();
        f.service.register(register_request("a@x.com"), &ctx).await.unwrap();
        let pair = f
            .service
            .login(login_request("a@x.com", "password1"), &ctx)
            .await
            .unwrap();

        let result = f
            .service
            .refresh(
                RefreshRequest {
                    refresh_token: pair.access_token,
                },
                &ctx,
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired_token() {
        let f = fixture().await;
        let ctx = AuditContext::default();
        f.service.register(register_request("a@x.com"), &ctx).await.unwrap();
        let pair = f
            .service
            .login(login_request("a@x.com", "password1"), &ctx)
            .await
            .unwrap();

        f.clock.advance(Duration::from_secs(604_800 + 1));

        let result = f
            .service
            .refresh(
                RefreshRequest {
                    refresh_token: pair.refresh_token,
                },
                &ctx,
            )
            .await;

        assert!(matches!(result, Err(AppError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_refresh_rejects_unknown_subject() {
        let f = fixture().await;
        let token = f
            .codec
            .issue_for("ghost@x.com", TokenKind::Refresh)
            .unwrap();

        let result = f
            .service
            .refresh(RefreshRequest { refresh_token: token }, &AuditContext::default())
            .await;

        match result {
            Err(AppError::InvalidCredentials(message)) => {
                assert_eq!(message, INVALID_REFRESH_MESSAGE)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_profile_lookup() {
        let f = fixture().await;
        let record = f
            .service
            .register(register_request("a@x.com"), &AuditContext::default())
            .await
            .unwrap();

        let profile = f.service.profile(&Principal::from(&record)).await.unwrap();

        assert_eq!(profile.email, "a@x.com");
        assert_eq!(profile.display_name, "A");
        assert_eq!(profile.authorities, vec!["ROLE_USER".to_string()]);
    }

    #[test]
    fn test_register_request_validation() {
        let request = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            display_name: "  ".to_string(),
            unit_system: None,
            timezone: None,
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("display_name"));

        assert!(register_request("a@x.com").validate().is_ok());
    }

    #[test]
    fn test_missing_fields_deserialize_as_blank() {
        let request: RegisterRequest = serde_json::from_str(r#"{"email":"a@x.com"}"#).unwrap();
        let errors = request.validate().unwrap_err();

        assert!(errors.field_errors().contains_key("password"));
        assert!(!errors.field_errors().contains_key("email"));

        let refresh: RefreshRequest = serde_json::from_str("{}").unwrap();
        assert!(refresh.validate().is_err());
    }

    #[test]
    fn test_token_pair_serializes_camel_case() {
        let pair = TokenPairResponse {
            access_token: "a".to_string(),
            access_token_expires_in_seconds: 3600,
            refresh_token: "r".to_string(),
            refresh_token_expires_in_seconds: 604_800,
            token_type: "Bearer".to_string(),
        };

        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["accessTokenExpiresInSeconds"], 3600);
        assert_eq!(json["refreshTokenExpiresInSeconds"], 604_800);
        assert_eq!(json["tokenType"], "Bearer");
    }
}
