//! Media asset model
//!
//! Only metadata is kept here; the binary lives on a CDN or object store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: i64,
    pub url: String,
    pub alt_text: String,
    pub mime_type: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/replace payload for a media asset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaAssetInput {
    pub url: String,
    pub alt_text: String,
    pub mime_type: String,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub bytes: Option<i64>,
}
