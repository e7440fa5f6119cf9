//! FitNote Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions shared by the FitNote server:
//! - Credential records and user preferences
//! - The credential store collaborator trait
//! - Common error types
//! - Configuration management
//! - Credential storage (PostgreSQL)

pub mod config;
pub mod store;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig};
pub use store::PgCredentialStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for FitNote operations
#[derive(Error, Debug)]
pub enum FitnoteError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Email already registered: {0}")]
    EmailConflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FitnoteError>;

// ============================================================================
// Credential Records
// ============================================================================

/// Opaque user identifier assigned by the credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Preferred unit system for weights
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitSystem {
    #[default]
    Kg,
    Lb,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kg => "KG",
            Self::Lb => "LB",
        }
    }
}

impl std::fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UnitSystem {
    type Err = FitnoteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "KG" => Ok(Self::Kg),
            "LB" => Ok(Self::Lb),
            other => Err(FitnoteError::ValidationError(format!(
                "Unknown unit system: {other}"
            ))),
        }
    }
}

/// Timezone applied when a registration does not name one
pub const DEFAULT_TIMEZONE: &str = "Asia/Seoul";

/// Stored user credentials and profile preferences
///
/// Email is unique across all records and matched case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: UserId,
    pub email: String,
    /// Argon2id PHC string; never serialized into API responses
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub unit_system: UnitSystem,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a credential record
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub unit_system: UnitSystem,
    pub timezone: String,
}

// ============================================================================
// Traits
// ============================================================================

/// Storage collaborator that owns credential records
///
/// Implementations must make `save` fail with [`FitnoteError::EmailConflict`]
/// when another record already holds the email, even if a concurrent caller
/// passed `exists_by_email` at the same time.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a record by exact email match
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>>;

    /// Find a record by identifier
    async fn find_by_id(&self, id: UserId) -> Result<Option<CredentialRecord>>;

    /// Check whether an email is already registered
    async fn exists_by_email(&self, email: &str) -> Result<bool>;

    /// Persist a new record, assigning its identifier
    async fn save(&self, credential: NewCredential) -> Result<CredentialRecord>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_system_parse() {
        assert_eq!("KG".parse::<UnitSystem>().unwrap(), UnitSystem::Kg);
        assert_eq!("LB".parse::<UnitSystem>().unwrap(), UnitSystem::Lb);
        assert!("kg".parse::<UnitSystem>().is_err());
        assert_eq!(UnitSystem::default(), UnitSystem::Kg);
    }

    #[test]
    fn test_unit_system_serde() {
        assert_eq!(serde_json::to_string(&UnitSystem::Lb).unwrap(), "\"LB\"");
        let parsed: UnitSystem = serde_json::from_str("\"KG\"").unwrap();
        assert_eq!(parsed, UnitSystem::Kg);
    }

    #[test]
    fn test_credential_record_hides_password_hash() {
        let record = CredentialRecord {
            id: UserId(7),
            email: "a@x.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            display_name: "A".to_string(),
            unit_system: UnitSystem::Kg,
            timezone: DEFAULT_TIMEZONE.to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("a@x.com"));
        assert!(!json.contains("argon2id"));
    }
}
