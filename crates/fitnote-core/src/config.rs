//! FitNote Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Minimum signing secret length in bytes (HMAC-SHA256 key size)
pub const MIN_SECRET_BYTES: usize = 32;

/// Built-in signing secret, only for local development
pub const DEV_JWT_SECRET: &str = "development-secret-key-change-in-production";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Token signing and lifetime configuration
    pub auth: AuthConfig,

    /// Database connections
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// Load the file named by `FITNOTE_CONFIG` if set, then apply env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("FITNOTE_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        let config = base.with_env_override()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that cannot be corrected at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret {
                actual: self.auth.jwt_secret.len(),
            });
        }
        if self.auth.access_token_validity_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "JWT_ACCESS_TOKEN_VALIDITY_MS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.auth.refresh_token_validity_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "JWT_REFRESH_TOKEN_VALIDITY_MS".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env("API_PORT")? {
            self.server.port = port;
        }

        // CORS origins from environment variable (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Auth
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ms) = parse_env("JWT_ACCESS_TOKEN_VALIDITY_MS")? {
            self.auth.access_token_validity_ms = ms;
        }
        if let Some(ms) = parse_env("JWT_REFRESH_TOKEN_VALIDITY_MS")? {
            self.auth.refresh_token_validity_ms = ms;
        }

        // PostgreSQL
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.postgres_url = Some(url);
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            // Empty by default for security - set via CORS_ORIGINS env var
            cors_origins: vec![],
        }
    }
}

/// Token signing and lifetime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret (at least 32 bytes)
    pub jwt_secret: String,

    /// Access token lifetime in milliseconds (default: 1 hour)
    pub access_token_validity_ms: u64,

    /// Refresh token lifetime in milliseconds (default: 7 days)
    pub refresh_token_validity_ms: u64,

    /// Path prefixes that bypass authentication entirely
    pub public_paths: Vec<String>,
}

impl AuthConfig {
    /// Whether tokens would be signed with the publicly known development key
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_validity_ms: 3_600_000,
            refresh_token_validity_ms: 604_800_000,
            public_paths: vec![
                "/api/auth/".to_string(),
                "/v3/api-docs".to_string(),
                "/swagger-ui".to_string(),
                "/health".to_string(),
            ],
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory store is used when unset
    pub postgres_url: Option<String>,

    /// PostgreSQL connection pool size
    pub postgres_pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: None,
            postgres_pool_size: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("JWT secret must be at least 32 bytes, got {actual}")]
    WeakSecret { actual: usize },
}
