//! Authenticated principal
//!
//! The minimal identity bound to a request once its bearer token has been
//! verified: the user id used to scope downstream queries, the email used as
//! the token subject, and a fixed single-role authority set.

use fitnote_core::{CredentialRecord, UserId};
use serde::Serialize;
use utoipa::ToSchema;

/// The only authority granted to users
pub const DEFAULT_AUTHORITY: &str = "ROLE_USER";

/// Read-only identity derived from a credential record
///
/// Built per request or per login and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Credential store identifier
    #[schema(value_type = i64)]
    pub id: UserId,
    /// Email address, also the token subject
    pub email: String,
}

impl Principal {
    /// Convert a stored credential record into a principal
    pub fn from_credential(record: &CredentialRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
        }
    }

    /// Value written into the token `sub` claim
    pub fn subject(&self) -> &str {
        &self.email
    }

    pub fn authorities(&self) -> &'static [&'static str] {
        &[DEFAULT_AUTHORITY]
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities().contains(&authority)
    }
}

impl From<&CredentialRecord> for Principal {
    fn from(record: &CredentialRecord) -> Self {
        Self::from_credential(record)
    }
}

impl From<CredentialRecord> for Principal {
    fn from(record: CredentialRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
        }
    }
}
