//! Audit log repository

use crate::db::DynDatabasePool;
use crate::models::{AuditFilter, AuditLog, ListParams, NewAuditLog};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn insert(&self, entry: &NewAuditLog) -> Result<AuditLog>;

    /// Newest first
    async fn list(&self, filter: &AuditFilter, params: &ListParams) -> Result<Vec<AuditLog>>;

    async fn count(&self, filter: &AuditFilter) -> Result<i64>;
}

pub struct SqlxAuditLogRepository {
    pool: DynDatabasePool,
}

impl SqlxAuditLogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuditLogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AuditLogRepository for SqlxAuditLogRepository {
    async fn insert(&self, entry: &NewAuditLog) -> Result<AuditLog> {
        let now = Utc::now();
        let details = serde_json::to_string(&entry.details).context("Failed to encode audit details")?;

        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (actor, action, target_type, target_id, details, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.actor)
        .bind(&entry.action)
        .bind(&entry.target_type)
        .bind(entry.target_id)
        .bind(&details)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to insert audit log")?;

        Ok(AuditLog {
            id: result.last_insert_rowid(),
            actor: entry.actor.clone(),
            action: entry.action.clone(),
            target_type: entry.target_type.clone(),
            target_id: entry.target_id,
            details: entry.details.clone(),
            created_at: now,
        })
    }

    async fn list(&self, filter: &AuditFilter, params: &ListParams) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM audit_logs
            WHERE (?1 IS NULL OR action = ?1)
              AND (?2 IS NULL OR target_type = ?2)
            ORDER BY created_at DESC, id DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(filter.action.as_deref())
        .bind(filter.target_type.as_deref())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list audit logs")?;

        rows.iter()
            .map(|row| {
                let details: String = row.get("details");
                Ok(AuditLog {
                    id: row.get("id"),
                    actor: row.get("actor"),
                    action: row.get("action"),
                    target_type: row.get("target_type"),
                    target_id: row.get("target_id"),
                    details: serde_json::from_str(&details)
                        .context("Invalid audit details in database")?,
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    async fn count(&self, filter: &AuditFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM audit_logs
            WHERE (?1 IS NULL OR action = ?1)
              AND (?2 IS NULL OR target_type = ?2)
            "#,
        )
        .bind(filter.action.as_deref())
        .bind(filter.target_type.as_deref())
        .fetch_one(self.pool.sqlite())
        .await
        .context("Failed to count audit logs")?;
        Ok(count)
    }
}
