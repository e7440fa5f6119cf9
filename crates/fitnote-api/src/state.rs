//! Application state management
//!
//! Author: sd207@naver.com

use crate::auth::{
    AuthGate, AuthService, InMemoryCredentialStore, PasswordConfig, StoreCredentialVerifier,
    TokenCodec,
};
use anyhow::Context;
use fitnote_core::{AppConfig, CredentialStore, PgCredentialStore};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Credential store backend
    pub store: Arc<dyn CredentialStore>,
    /// Token issuance and verification
    pub codec: Arc<TokenCodec>,
    /// Registration, login and refresh
    pub auth: AuthService,
    /// Request authentication gate
    pub gate: AuthGate,
}

impl AppState {
    /// Build state from configuration
    ///
    /// Connects to PostgreSQL when a URL is configured, otherwise keeps
    /// credentials in memory.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn CredentialStore> = match &config.database.postgres_url {
            Some(url) => {
                let store = PgCredentialStore::new(url, config.database.postgres_pool_size)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                store
                    .ensure_schema()
                    .await
                    .context("Failed to create credential schema")?;
                Arc::new(store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, credentials are kept in memory");
                Arc::new(InMemoryCredentialStore::new())
            }
        };

        if config.auth.uses_dev_secret() {
            tracing::warn!("JWT_SECRET not set, tokens are signed with the development key");
        }

        let codec = TokenCodec::new(&config.auth).context("Invalid token configuration")?;
        Self::with_components(config, store, Arc::new(codec), PasswordConfig::default()).await
    }

    /// Assemble state from explicit parts
    pub async fn with_components(
        config: AppConfig,
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        password_config: PasswordConfig,
    ) -> anyhow::Result<Self> {
        let verifier = StoreCredentialVerifier::new(store.clone(), password_config.clone())
            .await
            .context("Failed to initialize credential verifier")?;

        let auth = AuthService::new(
            store.clone(),
            Arc::new(verifier),
            codec.clone(),
            password_config,
        );
        let gate = AuthGate::new(codec.clone(), store.clone(), config.auth.public_paths.clone());

        tracing::info!(store = store.name(), "Application state initialized");

        Ok(Self {
            config,
            start_time: Instant::now(),
            store,
            codec,
            auth,
            gate,
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
