//! Email and password verification
//!
//! Login looks the email up in the credential store and checks the password
//! against the stored Argon2id hash. Every failure is reported with the same
//! message, so callers cannot tell an unknown email from a wrong password.

use super::password::{hash_password_async, verify_password_async, PasswordConfig, PasswordError};
use super::principal::Principal;
use crate::error::AppError;
use async_trait::async_trait;
use fitnote_core::CredentialStore;
use std::sync::Arc;

/// Message for every failed login
pub const BAD_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

/// Checks an email and password pair
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Resolve the principal, or fail with [`AppError::InvalidCredentials`]
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Principal, AppError>;
}

/// Verifier backed by a [`CredentialStore`]
pub struct StoreCredentialVerifier {
    store: Arc<dyn CredentialStore>,
    // Checked when the email is unknown, so both failure paths hash once
    decoy_hash: String,
}

impl StoreCredentialVerifier {
    pub async fn new(
        store: Arc<dyn CredentialStore>,
        password_config: PasswordConfig,
    ) -> Result<Self, PasswordError> {
        let decoy_hash =
            hash_password_async("fitnote-decoy-password".to_string(), password_config).await?;
        Ok(Self { store, decoy_hash })
    }
}

#[async_trait]
impl CredentialVerifier for StoreCredentialVerifier {
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Principal, AppError> {
        let record = self.store.find_by_email(email).await?;

        let (hash, record) = match record {
            Some(record) => (record.password_hash.clone(), Some(record)),
            None => (self.decoy_hash.clone(), None),
        };

        let matches = verify_password_async(password.to_string(), hash)
            .await
            .map_err(|e| AppError::Unexpected(format!("Password verification failed: {e}")))?;

        match record {
            Some(record) if matches => Ok(Principal::from(record)),
            _ => Err(AppError::InvalidCredentials(BAD_CREDENTIALS_MESSAGE.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password_with_config;
    use crate::auth::repository::InMemoryCredentialStore;
    use fitnote_core::{NewCredential, UnitSystem, UserId, DEFAULT_TIMEZONE};

    async fn verifier_with_user(email: &str, password: &str) -> StoreCredentialVerifier {
        let store = Arc::new(InMemoryCredentialStore::new());
        let password_hash = hash_password_with_config(password, &PasswordConfig::fast()).unwrap();
        store
            .save(NewCredential {
                email: email.to_string(),
                password_hash,
                display_name: "Lifter".to_string(),
                unit_system: UnitSystem::Kg,
                timezone: DEFAULT_TIMEZONE.to_string(),
            })
            .await
            .unwrap();

        StoreCredentialVerifier::new(store, PasswordConfig::fast())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let verifier = verifier_with_user("a@x.com", "password1").await;

        let principal = verifier
            .verify_credentials("a@x.com", "password1")
            .await
            .unwrap();

        assert_eq!(principal.id, UserId(1));
        assert_eq!(principal.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_identical() {
        let verifier = verifier_with_user("a@x.com", "password1").await;

        let wrong_password = verifier
            .verify_credentials("a@x.com", "password2")
            .await
            .unwrap_err();
        let unknown_email = verifier
            .verify_credentials("nobody@x.com", "password1")
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, AppError::InvalidCredentials(_)));
        assert!(matches!(unknown_email, AppError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn test_decoy_password_never_authenticates() {
        let verifier = verifier_with_user("a@x.com", "password1").await;

        let result = verifier
            .verify_credentials("nobody@x.com", "fitnote-decoy-password")
            .await;

        assert!(matches!(result, Err(AppError::InvalidCredentials(_))));
    }
}
