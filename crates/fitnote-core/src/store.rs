//! PostgreSQL credential store
//!
//! Persists credential records using SQLx and PostgreSQL. Email uniqueness is
//! enforced by a unique index, so concurrent registrations of the same email
//! resolve at the database rather than in the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

use crate::{CredentialRecord, CredentialStore, FitnoteError, NewCredential, Result, UserId};

/// SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            BIGSERIAL PRIMARY KEY,
    email         VARCHAR(255) NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    display_name  VARCHAR(100) NOT NULL,
    unit_system   VARCHAR(8)   NOT NULL DEFAULT 'KG',
    timezone      VARCHAR(64)  NOT NULL DEFAULT 'Asia/Seoul',
    created_at    TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ  NOT NULL DEFAULT NOW()
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (email);
"#;

/// PostgreSQL credential store
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Create a new credential store connection
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                FitnoteError::DatabaseError(format!("PostgreSQL connection failed: {e}"))
            })?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `users` table and its unique email index if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| FitnoteError::DatabaseError(format!("Failed to create schema: {e}")))?;

        Ok(())
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    display_name: String,
    unit_system: String,
    timezone: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for CredentialRecord {
    fn from(row: UserRow) -> Self {
        CredentialRecord {
            id: UserId(row.id),
            email: row.email,
            password_hash: row.password_hash,
            display_name: row.display_name,
            // Rows are only written through `save`, which stores a known value
            unit_system: row.unit_system.parse().unwrap_or_default(),
            timezone: row.timezone,
            created_at: row.created_at,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, password_hash, display_name, unit_system, timezone, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FitnoteError::DatabaseError(format!("Failed to fetch user: {e}")))?;

        Ok(row.map(CredentialRecord::from))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<CredentialRecord>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, password_hash, display_name, unit_system, timezone, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FitnoteError::DatabaseError(format!("Failed to fetch user: {e}")))?;

        Ok(row.map(CredentialRecord::from))
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    FitnoteError::DatabaseError(format!("Failed to check existing user: {e}"))
                })?;

        Ok(exists)
    }

    async fn save(&self, credential: NewCredential) -> Result<CredentialRecord> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (email, password_hash, display_name, unit_system, timezone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, display_name, unit_system, timezone, created_at
            "#,
        )
        .bind(&credential.email)
        .bind(&credential.password_hash)
        .bind(&credential.display_name)
        .bind(credential.unit_system.as_str())
        .bind(&credential.timezone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                FitnoteError::EmailConflict(credential.email.clone())
            } else {
                FitnoteError::DatabaseError(format!("Failed to create user: {e}"))
            }
        })?;

        Ok(row.into())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
