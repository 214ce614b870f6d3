//! API token service
//!
//! Tokens are `folio_` followed by 32 random bytes in unpadded base64url.
//! The plaintext is returned once at issue time; only its SHA-256 digest is
//! stored.

use crate::db::repositories::ApiTokenRepository;
use crate::models::{ApiToken, NewApiToken, NewAuditLog, Principal, Role};
use crate::services::audit::AuditService;
use anyhow::Context;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{Duration, Utc};
use data_encoding::{BASE64URL_NOPAD, HEXLOWER};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Prefix that marks a bearer value as an API token
pub const TOKEN_PREFIX: &str = "folio_";

/// Characters of the plaintext kept for display
const DISPLAY_PREFIX_LEN: usize = 12;

const MAX_EXPIRY_DAYS: i64 = 3650;

#[derive(Debug, thiserror::Error)]
pub enum TokenServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Token not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A freshly issued token together with its plaintext
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    /// Shown once; not recoverable afterwards
    pub token: String,
    #[serde(flatten)]
    pub record: ApiToken,
}

pub struct TokenService {
    repo: Arc<dyn ApiTokenRepository>,
    audit: Arc<AuditService>,
}

impl TokenService {
    pub fn new(repo: Arc<dyn ApiTokenRepository>, audit: Arc<AuditService>) -> Self {
        Self { repo, audit }
    }

    /// SHA-256 hex digest used as the lookup key
    pub fn hash_token(token: &str) -> String {
        HEXLOWER.encode(&Sha256::digest(token.as_bytes()))
    }

    fn generate_plaintext() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        format!("{}{}", TOKEN_PREFIX, BASE64URL_NOPAD.encode(&bytes))
    }

    pub async fn issue(
        &self,
        name: &str,
        role: Role,
        expires_in_days: Option<i64>,
        issuer: &Principal,
    ) -> Result<IssuedToken, TokenServiceError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(TokenServiceError::ValidationError(
                "Token name must be 1 to 100 characters".to_string(),
            ));
        }
        let expires_at = match expires_in_days {
            Some(days) if !(1..=MAX_EXPIRY_DAYS).contains(&days) => {
                return Err(TokenServiceError::ValidationError(format!(
                    "expires_in_days must be between 1 and {}",
                    MAX_EXPIRY_DAYS
                )));
            }
            Some(days) => Some(Utc::now() + Duration::days(days)),
            None => None,
        };

        let token = Self::generate_plaintext();
        let record = self
            .repo
            .create(&NewApiToken {
                name: name.to_string(),
                token_hash: Self::hash_token(&token),
                token_prefix: token.chars().take(DISPLAY_PREFIX_LEN).collect(),
                role,
                created_by: Some(issuer.actor()),
                expires_at,
            })
            .await
            .context("Failed to store API token")?;

        self.audit
            .record(
                NewAuditLog::new(issuer.actor(), "token.issue", "api_token", Some(record.id))
                    .with_details(json!({ "name": record.name, "role": record.role })),
            )
            .await;

        Ok(IssuedToken { token, record })
    }

    /// Resolve a plaintext bearer token.
    ///
    /// Unknown, revoked and expired tokens all resolve to `None`.
    pub async fn resolve(&self, token: &str) -> Result<Option<ApiToken>, TokenServiceError> {
        if !token.starts_with(TOKEN_PREFIX) {
            return Ok(None);
        }

        let found = self
            .repo
            .get_by_hash(&Self::hash_token(token))
            .await
            .context("Failed to look up API token")?;

        match found {
            Some(record) if record.is_active() => {
                if let Err(e) = self.repo.touch_last_used(record.id).await {
                    tracing::warn!("Failed to update token usage: {:#}", e);
                }
                Ok(Some(record))
            }
            Some(record) => {
                tracing::debug!(token_id = record.id, "Rejected inactive API token");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<ApiToken>, TokenServiceError> {
        Ok(self.repo.list().await.context("Failed to list API tokens")?)
    }

    pub async fn revoke(&self, id: i64, actor: &Principal) -> Result<(), TokenServiceError> {
        if !self.repo.revoke(id).await.context("Failed to revoke API token")? {
            return Err(TokenServiceError::NotFound(id));
        }

        self.audit
            .record(NewAuditLog::new(actor.actor(), "token.revoke", "api_token", Some(id)))
            .await;
        Ok(())
    }
}
