//! API token repository

use crate::db::DynDatabasePool;
use crate::models::{ApiToken, NewApiToken, Role};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait ApiTokenRepository: Send + Sync {
    async fn create(&self, token: &NewApiToken) -> Result<ApiToken>;

    /// Look a token up by the SHA-256 hex digest of its plaintext
    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<ApiToken>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ApiToken>>;

    /// All tokens, newest first, including revoked ones
    async fn list(&self) -> Result<Vec<ApiToken>>;

    /// Mark a token revoked. Returns false when the token does not exist.
    async fn revoke(&self, id: i64) -> Result<bool>;

    async fn touch_last_used(&self, id: i64) -> Result<()>;
}

pub struct SqlxApiTokenRepository {
    pool: DynDatabasePool,
}

impl SqlxApiTokenRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ApiTokenRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ApiTokenRepository for SqlxApiTokenRepository {
    async fn create(&self, token: &NewApiToken) -> Result<ApiToken> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO api_tokens (name, token_hash, token_prefix, role, created_by, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&token.name)
        .bind(&token.token_hash)
        .bind(&token.token_prefix)
        .bind(token.role.as_str())
        .bind(&token.created_by)
        .bind(token.expires_at)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create API token")?;

        Ok(ApiToken {
            id: result.last_insert_rowid(),
            name: token.name.clone(),
            token_hash: token.token_hash.clone(),
            token_prefix: token.token_prefix.clone(),
            role: token.role,
            created_by: token.created_by.clone(),
            expires_at: token.expires_at,
            last_used_at: None,
            revoked_at: None,
            created_at: now,
        })
    }

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<ApiToken>> {
        let row = sqlx::query("SELECT * FROM api_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get API token by hash")?;
        row.as_ref().map(row_to_token).transpose()
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ApiToken>> {
        let row = sqlx::query("SELECT * FROM api_tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get API token by ID")?;
        row.as_ref().map(row_to_token).transpose()
    }

    async fn list(&self) -> Result<Vec<ApiToken>> {
        let rows = sqlx::query("SELECT * FROM api_tokens ORDER BY created_at DESC, id DESC")
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list API tokens")?;
        rows.iter().map(row_to_token).collect()
    }

    async fn revoke(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE api_tokens SET revoked_at = COALESCE(revoked_at, ?) WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to revoke API token")?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_used(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE api_tokens SET last_used_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update API token usage")?;
        Ok(())
    }
}

fn row_to_token(row: &sqlx::sqlite::SqliteRow) -> Result<ApiToken> {
    let role_str: String = row.get("role");
    let role = Role::from_str(&role_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid token role in database: {}", role_str))?;

    Ok(ApiToken {
        id: row.get("id"),
        name: row.get("name"),
        token_hash: row.get("token_hash"),
        token_prefix: row.get("token_prefix"),
        role,
        created_by: row.get("created_by"),
        expires_at: row.get("expires_at"),
        last_used_at: row.get("last_used_at"),
        revoked_at: row.get("revoked_at"),
        created_at: row.get("created_at"),
    })
}
