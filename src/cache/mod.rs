//! Cache layer
//!
//! Read-through cache for public post lookups, feed pages and the sitemap.
//! Keys are namespaced so writes can invalidate with glob patterns:
//!
//! - `post:slug:<slug>` for single posts
//! - `posts:<kind>:<tag>:<cursor>:<limit>` for feed pages
//! - `sitemap` for the rendered sitemap
//!
//! ```rust,ignore
//! use folio::cache::{create_cache, CacheLayer};
//! use folio::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("post:slug:hello", &post, cache.default_ttl()).await?;
//! cache.delete_pattern("posts:*").await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Pattern covering every single-post entry
pub const POST_PATTERN: &str = "post:*";
/// Pattern covering every feed page entry
pub const FEED_PATTERN: &str = "posts:*";
/// Key of the cached sitemap
pub const SITEMAP_KEY: &str = "sitemap";

/// Key of a single post looked up by slug
pub fn post_key(slug: &str) -> String {
    format!("post:slug:{}", slug)
}

/// Cache layer trait
///
/// Generic methods keep this trait from being object safe, so services hold
/// the concrete `MemoryCache`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values matching a glob pattern, returning how many were removed
    async fn delete_pattern(&self, pattern: &str) -> Result<usize>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Create the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}
