use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Persists alias -> salt/password-hash rows. Only registration and login
/// touch this; everything downstream works off the session.
#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a fresh account. Uniqueness is enforced by the UNIQUE
    /// constraint on alias, so two concurrent registrations cannot both
    /// succeed; the loser surfaces as `AliasExists`.
    pub async fn insert_account(
        &self,
        alias: &str,
        salt: &str,
        password_hash: &str,
    ) -> ApiResult<()> {
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO accounts (id, alias, salt, password_hash) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(alias)
            .bind(salt)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::AliasExists,
                _ => ApiError::Storage(err),
            })?;
        Ok(())
    }

    pub async fn alias_exists(&self, alias: &str) -> ApiResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM accounts WHERE alias = ?)")
                .bind(alias)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Stored `(salt, password_hash)` for an alias, `None` when the account
    /// does not exist.
    pub async fn credentials(&self, alias: &str) -> ApiResult<Option<(String, String)>> {
        Ok(
            sqlx::query_as("SELECT salt, password_hash FROM accounts WHERE alias = ?")
                .bind(alias)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}

/// Persists session-id -> alias grants. Sessions expire by age alone; there
/// is no revocation in scope, so no delete path exists.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, session_id: &str, alias: &str) -> ApiResult<()> {
        sqlx::query("INSERT INTO sessions (id, alias) VALUES (?, ?)")
            .bind(session_id)
            .bind(alias)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Resolves a session id to its alias, treating anything older than
    /// `ttl` as absent. Expiry lives in the query itself so a stale row can
    /// never authenticate a request.
    pub async fn pull(&self, session_id: &str, ttl: time::Duration) -> ApiResult<Option<String>> {
        let cutoff = format!("-{} seconds", ttl.whole_seconds());
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT alias FROM sessions WHERE id = ? AND created_at > datetime('now', ?)",
        )
        .bind(session_id)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(alias,)| alias))
    }
}
