//! Pagination types
//!
//! - `ListParams` / `PagedResult` for admin listings (offset pagination)
//! - `Cursor` / `CursorPage` for the public post feed (keyset pagination)

use chrono::{DateTime, Utc};
use data_encoding::BASE64URL_NOPAD;
use serde::{Deserialize, Serialize};

/// Offset pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        ((self.total as u64 + self.per_page as u64 - 1) / self.per_page as u64) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

/// Default page size of the public feed
pub const DEFAULT_FEED_LIMIT: u32 = 10;
/// Largest page size of the public feed
pub const MAX_FEED_LIMIT: u32 = 50;

/// Clamp a requested feed page size to 1..=MAX_FEED_LIMIT
pub fn clamp_feed_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT)
}

/// Position in the `(published_at DESC, slug ASC)` ordering of the feed.
///
/// The next page holds rows strictly after this position:
/// `published_at < ts OR (published_at = ts AND slug > slug)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// `published_at` as unix microseconds
    pub published_micros: i64,
    pub slug: String,
}

/// Error for cursors that were not produced by `Cursor::encode`
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Malformed cursor")]
pub struct InvalidCursor;

impl Cursor {
    pub fn new(published_at: DateTime<Utc>, slug: impl Into<String>) -> Self {
        Self {
            published_micros: published_at.timestamp_micros(),
            slug: slug.into(),
        }
    }

    /// Opaque, URL-safe representation
    pub fn encode(&self) -> String {
        let raw = format!("{}:{}", self.published_micros, self.slug);
        BASE64URL_NOPAD.encode(raw.as_bytes())
    }

    pub fn decode(value: &str) -> Result<Self, InvalidCursor> {
        let bytes = BASE64URL_NOPAD
            .decode(value.trim().as_bytes())
            .map_err(|_| InvalidCursor)?;
        let raw = String::from_utf8(bytes).map_err(|_| InvalidCursor)?;
        let (micros, slug) = raw.split_once(':').ok_or(InvalidCursor)?;
        let published_micros = micros.parse::<i64>().map_err(|_| InvalidCursor)?;
        if slug.is_empty() {
            return Err(InvalidCursor);
        }
        Ok(Self {
            published_micros,
            slug: slug.to_string(),
        })
    }
}

/// One page of a keyset-paginated listing
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    /// Present only when another page exists
    pub next_cursor: Option<String>,
}
