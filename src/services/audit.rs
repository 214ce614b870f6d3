//! Audit service
//!
//! Append-only record of moderation and admin actions. Other services call
//! `record` after a successful write, where a failed insert is only logged,
//! or `try_record` where the caller must learn that no entry was stored.

use crate::db::repositories::AuditLogRepository;
use crate::models::{AuditFilter, AuditLog, ListParams, NewAuditLog, PagedResult};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuditServiceError {
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct AuditService {
    repo: Arc<dyn AuditLogRepository>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditLogRepository>) -> Self {
        Self { repo }
    }

    /// Append an entry, logging instead of failing when the insert errors
    pub async fn record(&self, entry: NewAuditLog) {
        if let Err(e) = self.try_record(&entry).await {
            tracing::error!("Failed to write audit log for {}: {:#}", entry.action, e);
        }
    }

    /// Append an entry, returning the insert error
    pub async fn try_record(&self, entry: &NewAuditLog) -> Result<AuditLog, AuditServiceError> {
        tracing::info!(
            actor = %entry.actor,
            action = %entry.action,
            target_type = %entry.target_type,
            target_id = ?entry.target_id,
            "audit"
        );
        let stored = self
            .repo
            .insert(entry)
            .await
            .with_context(|| format!("Failed to write audit log for {}", entry.action))?;
        Ok(stored)
    }

    /// Newest-first page of entries
    pub async fn list(
        &self,
        filter: &AuditFilter,
        params: &ListParams,
    ) -> Result<PagedResult<AuditLog>, AuditServiceError> {
        let items = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list audit logs")?;
        let total = self
            .repo
            .count(filter)
            .await
            .context("Failed to count audit logs")?;
        Ok(PagedResult::new(items, total, params))
    }
}
