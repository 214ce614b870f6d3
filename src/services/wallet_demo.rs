//! Wallet demo sandbox
//!
//! Simulated tipping and attestations for showing off the wallet UI without
//! touching a chain. Everything lives in memory and resets on restart; live
//! wallet interactions answer `NotImplemented`.

use crate::config::WalletDemoConfig;
use crate::db::repositories::PostRepository;
use crate::models::Post;
use crate::services::rate_limiter::RateLimiter;
use anyhow::Context;
use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const MAX_TIP_AMOUNT: f64 = 1000.0;
const MAX_SUBJECT_CHARS: usize = 200;
const MAX_STATEMENT_CHARS: usize = 1000;
/// Attestations kept in memory; the oldest are dropped past this
pub const MAX_ATTESTATIONS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum WalletDemoError {
    #[error("Wallet demo is disabled")]
    Disabled,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many demo requests, try again later")]
    RateLimited,

    #[error("{0} is not available in demo mode")]
    NotImplemented(&'static str),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TipRequest {
    pub post_slug: String,
    pub amount: f64,
}

/// Fake receipt for a simulated tip
#[derive(Debug, Clone, Serialize)]
pub struct TipReceipt {
    pub id: Uuid,
    pub tx_hash: String,
    pub amount: f64,
    pub post_slug: String,
    pub simulated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TipTotals {
    pub count: u64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttestationRequest {
    pub subject: String,
    pub statement: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attestation {
    pub uid: String,
    pub subject: String,
    pub statement: String,
    pub simulated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoStats {
    pub tips: u64,
    pub tip_amount_total: f64,
    pub tipped_posts: usize,
    pub attestations: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
struct DemoState {
    tips: HashMap<String, TipTotals>,
    attestations: HashMap<String, Attestation>,
    /// Insertion order of `attestations`, oldest first
    attestation_order: VecDeque<String>,
}

pub struct WalletDemoService {
    enabled: bool,
    posts: Arc<dyn PostRepository>,
    limiter: RateLimiter,
    state: RwLock<DemoState>,
    attestation_capacity: usize,
    started_at: DateTime<Utc>,
}

impl WalletDemoService {
    pub fn new(posts: Arc<dyn PostRepository>, config: &WalletDemoConfig) -> Self {
        Self {
            enabled: config.enabled,
            posts,
            limiter: RateLimiter::per_minute(config.rate_limit_per_minute),
            state: RwLock::new(DemoState::default()),
            attestation_capacity: MAX_ATTESTATIONS,
            started_at: Utc::now(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn ensure_enabled(&self) -> Result<(), WalletDemoError> {
        if self.enabled {
            Ok(())
        } else {
            Err(WalletDemoError::Disabled)
        }
    }

    /// Record a simulated tip on a published post
    pub async fn tip(&self, request: TipRequest, ip: Option<&str>) -> Result<TipReceipt, WalletDemoError> {
        self.ensure_enabled()?;

        if !(request.amount > 0.0 && request.amount <= MAX_TIP_AMOUNT) {
            return Err(WalletDemoError::ValidationError(format!(
                "Amount must be greater than 0 and at most {}",
                MAX_TIP_AMOUNT
            )));
        }
        let post_slug = request.post_slug.trim().to_string();
        let published = self
            .posts
            .get_by_slug(&post_slug)
            .await
            .context("Failed to load post")?
            .is_some_and(|p: Post| p.is_published());
        if !published {
            return Err(WalletDemoError::NotFound(format!("post {}", post_slug)));
        }
        self.rate_limit(ip).await?;

        let id = Uuid::new_v4();
        let receipt = TipReceipt {
            id,
            tx_hash: format!("0xdemo{}", sha256_hex(id.as_bytes())),
            amount: request.amount,
            post_slug: post_slug.clone(),
            simulated: true,
            created_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        let totals = state.tips.entry(post_slug).or_default();
        totals.count += 1;
        totals.total_amount += request.amount;
        drop(state);

        tracing::info!(post = %receipt.post_slug, amount = receipt.amount, "Demo tip recorded");
        Ok(receipt)
    }

    pub async fn tip_totals(&self, post_slug: &str) -> Result<TipTotals, WalletDemoError> {
        self.ensure_enabled()?;
        let state = self.state.read().await;
        Ok(state.tips.get(post_slug).copied().unwrap_or_default())
    }

    /// Issue a fake attestation, kept until restart
    pub async fn attest(
        &self,
        request: AttestationRequest,
        ip: Option<&str>,
    ) -> Result<Attestation, WalletDemoError> {
        self.ensure_enabled()?;

        let subject = request.subject.trim().to_string();
        let statement = request.statement.trim().to_string();
        if subject.is_empty() || subject.chars().count() > MAX_SUBJECT_CHARS {
            return Err(WalletDemoError::ValidationError(format!(
                "Subject must be between 1 and {} characters",
                MAX_SUBJECT_CHARS
            )));
        }
        if statement.is_empty() || statement.chars().count() > MAX_STATEMENT_CHARS {
            return Err(WalletDemoError::ValidationError(format!(
                "Statement must be between 1 and {} characters",
                MAX_STATEMENT_CHARS
            )));
        }
        self.rate_limit(ip).await?;

        let nonce = Uuid::new_v4();
        let uid = format!(
            "0x{}",
            sha256_hex(format!("{}|{}|{}", subject, statement, nonce).as_bytes())
        );
        let attestation = Attestation {
            uid: uid.clone(),
            subject,
            statement,
            simulated: true,
            created_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        state.attestations.insert(uid.clone(), attestation.clone());
        state.attestation_order.push_back(uid);
        while state.attestation_order.len() > self.attestation_capacity {
            if let Some(oldest) = state.attestation_order.pop_front() {
                state.attestations.remove(&oldest);
            }
        }
        drop(state);

        tracing::info!(uid = %attestation.uid, "Demo attestation issued");
        Ok(attestation)
    }

    pub async fn get_attestation(&self, uid: &str) -> Result<Attestation, WalletDemoError> {
        self.ensure_enabled()?;
        self.state
            .read()
            .await
            .attestations
            .get(uid)
            .cloned()
            .ok_or_else(|| WalletDemoError::NotFound(format!("attestation {}", uid)))
    }

    pub async fn stats(&self) -> Result<DemoStats, WalletDemoError> {
        self.ensure_enabled()?;
        let state = self.state.read().await;
        Ok(DemoStats {
            tips: state.tips.values().map(|t| t.count).sum(),
            tip_amount_total: state.tips.values().map(|t| t.total_amount).sum(),
            tipped_posts: state.tips.len(),
            attestations: state.attestations.len(),
            started_at: self.started_at,
        })
    }

    /// Placeholder for interactions that need a live wallet or chain
    pub fn live_only(&self, feature: &'static str) -> Result<(), WalletDemoError> {
        self.ensure_enabled()?;
        Err(WalletDemoError::NotImplemented(feature))
    }

    /// Per-IP limit; callers without a resolvable address are not limited
    async fn rate_limit(&self, ip: Option<&str>) -> Result<(), WalletDemoError> {
        let Some(ip) = ip else {
            return Ok(());
        };
        if self.limiter.check_and_record(ip).await {
            Ok(())
        } else {
            tracing::debug!(ip = %ip, "Wallet demo rate limited");
            Err(WalletDemoError::RateLimited)
        }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&Sha256::digest(data))
}
