//! Session repository
//!
//! Rows back the browser session cookie; the row id is the cookie value.

use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// `(id, user_id, expires_at, created_at)`
type SessionRow = (String, i64, DateTime<Utc>, DateTime<Utc>);

fn session_from_row((id, user_id, expires_at, created_at): SessionRow) -> Session {
    Session {
        id,
        user_id,
        expires_at,
        created_at,
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<()>;

    /// Look up a session by cookie value, expired or not
    async fn find(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove sessions that expired before `cutoff`
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn insert(&self, session: &Session) -> Result<()> {
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .bind(session.created_at)
            .execute(self.pool.sqlite())
            .await
            .with_context(|| format!("Failed to store session for user {}", session.user_id))?;
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to look up session")?;
        Ok(row.map(session_from_row))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(cutoff)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to prune expired sessions")?;
        Ok(result.rows_affected())
    }
}
