//! In-memory credential store
//!
//! Used when no PostgreSQL URL is configured and by the test router.
//! Records live for the lifetime of the process.

use async_trait::async_trait;
use chrono::Utc;
use fitnote_core::{CredentialRecord, CredentialStore, FitnoteError, NewCredential, Result, UserId};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    next_id: i64,
    by_email: HashMap<String, UserId>,
    records: HashMap<UserId, CredentialRecord>,
}

/// Credential store backed by a locked map
///
/// `save` checks and inserts under one write lock, so two concurrent
/// registrations of the same email cannot both succeed.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(email)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<CredentialRecord>> {
        Ok(self.inner.read().await.records.get(&id).cloned())
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        Ok(self.inner.read().await.by_email.contains_key(email))
    }

    async fn save(&self, credential: NewCredential) -> Result<CredentialRecord> {
        let mut inner = self.inner.write().await;

        if inner.by_email.contains_key(&credential.email) {
            return Err(FitnoteError::EmailConflict(credential.email));
        }

        inner.next_id += 1;
        let id = UserId(inner.next_id);

        let record = CredentialRecord {
            id,
            email: credential.email,
            password_hash: credential.password_hash,
            display_name: credential.display_name,
            unit_system: credential.unit_system,
            timezone: credential.timezone,
            created_at: Utc::now(),
        };

        inner.by_email.insert(record.email.clone(), id);
        inner.records.insert(id, record.clone());

        Ok(record)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
