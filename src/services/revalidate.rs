//! Cache revalidation webhook
//!
//! A CMS or deploy hook calls the webhook with the paths that changed. The
//! call is authenticated by an HMAC-SHA256 signature over
//! `"{timestamp}.{raw body}"`, or by a principal holding `cache:revalidate`.

use crate::cache::{post_key, CacheLayer, MemoryCache, FEED_PATTERN, POST_PATTERN, SITEMAP_KEY};
use crate::config::RevalidateConfig;
use crate::models::{NewAuditLog, PostKind};
use crate::services::audit::AuditService;
use chrono::{DateTime, Utc};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-folio-signature";
pub const TIMESTAMP_HEADER: &str = "x-folio-timestamp";

#[derive(Debug, thiserror::Error)]
pub enum RevalidateError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevalidateRequest {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevalidateResponse {
    pub revalidated: bool,
    pub purged: Vec<String>,
    pub now: DateTime<Utc>,
}

pub struct RevalidateService {
    cache: Arc<MemoryCache>,
    audit: Arc<AuditService>,
    config: RevalidateConfig,
}

impl RevalidateService {
    pub fn new(cache: Arc<MemoryCache>, audit: Arc<AuditService>, config: RevalidateConfig) -> Self {
        Self {
            cache,
            audit,
            config,
        }
    }

    /// Check a signed webhook call against the shared secret
    pub fn verify_signature(
        &self,
        timestamp: &str,
        signature: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), RevalidateError> {
        let secret = self
            .config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RevalidateError::Unauthorized("Webhook secret not configured".to_string()))?;

        let ts: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| RevalidateError::Unauthorized("Invalid timestamp".to_string()))?;
        let max_skew = u64::try_from(self.config.max_skew_seconds).unwrap_or(0);
        let within_window = now
            .timestamp()
            .checked_sub(ts)
            .map(i64::unsigned_abs)
            .is_some_and(|skew| skew <= max_skew);
        if !within_window {
            return Err(RevalidateError::Unauthorized(
                "Timestamp outside allowed window".to_string(),
            ));
        }

        let expected = signature
            .trim()
            .strip_prefix("sha256=")
            .and_then(|hex| HEXLOWER_PERMISSIVE.decode(hex.as_bytes()).ok())
            .ok_or_else(|| RevalidateError::Unauthorized("Malformed signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {}", e))?;
        mac.update(timestamp.trim().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| RevalidateError::Unauthorized("Signature mismatch".to_string()))
    }

    /// Purge the cache entries behind the given paths and tags
    pub async fn revalidate(
        &self,
        request: &RevalidateRequest,
        actor: Option<String>,
    ) -> Result<RevalidateResponse, RevalidateError> {
        let patterns = patterns_for(request);
        let mut removed = 0;
        for pattern in &patterns {
            removed += self.cache.delete_pattern(pattern).await?;
        }

        tracing::info!(patterns = ?patterns, removed, actor = ?actor, "Revalidated cache");

        if let Some(actor) = actor {
            self.audit
                .record(
                    NewAuditLog::new(actor, "cache.revalidate", "cache", None).with_details(json!({
                        "paths": request.paths,
                        "tags": request.tags,
                        "purged": patterns,
                    })),
                )
                .await;
        }

        Ok(RevalidateResponse {
            revalidated: true,
            purged: patterns,
            now: Utc::now(),
        })
    }
}

/// `sha256=<hex>` signature for a webhook body
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {}", e))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(format!("sha256={}", HEXLOWER.encode(&mac.finalize().into_bytes())))
}

/// Cache patterns to purge for a request. An empty request purges everything.
///
/// Unknown paths map to nothing.
pub fn patterns_for(request: &RevalidateRequest) -> Vec<String> {
    if request.paths.is_empty() && request.tags.is_empty() {
        return vec![
            POST_PATTERN.to_string(),
            FEED_PATTERN.to_string(),
            SITEMAP_KEY.to_string(),
        ];
    }

    let mut out: Vec<String> = Vec::new();
    let mut push = |pattern: String| {
        if !out.contains(&pattern) {
            out.push(pattern);
        }
    };

    for path in &request.paths {
        if let Some(pattern) = pattern_for_path(path) {
            push(pattern);
        }
    }
    if !request.tags.is_empty() {
        push(FEED_PATTERN.to_string());
    }
    out
}

fn pattern_for_path(path: &str) -> Option<String> {
    let path = path.trim();
    let path = path.split(['?', '#']).next().unwrap_or("");
    let trimmed = path.trim_matches('/');

    if trimmed == "sitemap.xml" {
        return Some(SITEMAP_KEY.to_string());
    }
    if trimmed.is_empty() {
        return Some(FEED_PATTERN.to_string());
    }

    let mut parts = trimmed.split('/');
    let section = parts.next()?;
    PostKind::from_path_segment(section)?;
    match (parts.next(), parts.next()) {
        (None, _) => Some(FEED_PATTERN.to_string()),
        (Some(slug), None) if !slug.is_empty() => Some(post_key(slug)),
        _ => None,
    }
}
