//! Audit log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded admin or moderation action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    /// Username, or `token:<name>` for API tokens
    pub actor: String,
    /// Dotted action name, e.g. `comment.approve`
    pub action: String,
    pub target_type: String,
    pub target_id: Option<i64>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Entry to append to the audit log
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub actor: String,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<i64>,
    pub details: serde_json::Value,
}

impl NewAuditLog {
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        target_type: impl Into<String>,
        target_id: Option<i64>,
    ) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            target_type: target_type.into(),
            target_id,
            details: serde_json::json!({}),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Filters for listing the audit log
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub action: Option<String>,
    pub target_type: Option<String>,
}
