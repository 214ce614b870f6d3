//! Sliding-window rate limiting
//!
//! `RateLimiter` counts events per key inside a trailing window. Instances
//! guard login failures (per username), comment submissions and wallet demo
//! actions (per client IP). State is in memory and resets on restart.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keyed sliding-window counter
#[derive(Clone)]
pub struct RateLimiter {
    max_events: usize,
    window: Duration,
    events: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
}

impl RateLimiter {
    /// Allow at most `max_events` per key within `window`
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            max_events,
            window,
            events: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// `max_events` per minute
    pub fn per_minute(max_events: usize) -> Self {
        Self::new(max_events, Duration::minutes(1))
    }

    /// Whether `key` has already used up its window
    pub async fn is_limited(&self, key: &str) -> bool {
        let mut events = self.events.write().await;
        let cutoff = Utc::now() - self.window;

        match events.get_mut(key) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= self.max_events
            }
            None => false,
        }
    }

    /// Record one event for `key`
    pub async fn record(&self, key: &str) {
        let mut events = self.events.write().await;
        events.entry(key.to_string()).or_default().push(Utc::now());
    }

    /// Record an event unless the key is limited. Returns false when limited.
    pub async fn check_and_record(&self, key: &str) -> bool {
        let mut events = self.events.write().await;
        let now = Utc::now();
        let cutoff = now - self.window;

        let times = events.entry(key.to_string()).or_default();
        times.retain(|time| *time > cutoff);
        if times.len() >= self.max_events {
            return false;
        }
        times.push(now);
        true
    }

    /// Forget every event recorded for `key`
    pub async fn clear(&self, key: &str) {
        self.events.write().await.remove(key);
    }

    /// Drop expired events and empty keys (called periodically)
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut events = self.events.write().await;
        events.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    /// Number of keys currently tracked
    pub async fn tracked_keys(&self) -> usize {
        self.events.read().await.len()
    }
}

/// Failed-login limiter: 5 failures per username per 15 minutes
#[derive(Clone)]
pub struct LoginRateLimiter {
    inner: RateLimiter,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            inner: RateLimiter::new(5, Duration::minutes(15)),
        }
    }

    /// Check if username is rate limited
    pub async fn is_username_limited(&self, username: &str) -> bool {
        self.inner.is_limited(&username.to_lowercase()).await
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        self.inner.record(&username.to_lowercase()).await;
    }

    /// Clear failed attempts for username (on successful login)
    pub async fn clear_username_attempts(&self, username: &str) {
        self.inner.clear(&username.to_lowercase()).await;
    }

    pub async fn cleanup(&self) {
        self.inner.cleanup().await;
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_username_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_username_limited("testuser").await);
            limiter.record_failed_attempt("testuser").await;
        }
        limiter.record_failed_attempt("testuser").await;
        assert!(limiter.is_username_limited("testuser").await);

        limiter.clear_username_attempts("testuser").await;
        assert!(!limiter.is_username_limited("testuser").await);
    }

    #[tokio::test]
    async fn test_case_insensitive_username() {
        let limiter = LoginRateLimiter::new();
        for name in ["TestUser", "testuser", "TESTUSER", "testUser"] {
            limiter.record_failed_attempt(name).await;
        }
        assert!(!limiter.is_username_limited("testuser").await);
        limiter.record_failed_attempt("testuser").await;
        assert!(limiter.is_username_limited("TestUser").await);
    }

    #[tokio::test]
    async fn test_check_and_record_stops_at_limit() {
        let limiter = RateLimiter::per_minute(3);
        for _ in 0..3 {
            assert!(limiter.check_and_record("10.0.0.1").await);
        }
        assert!(!limiter.check_and_record("10.0.0.1").await);
        assert!(limiter.check_and_record("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_window_expiry() {
        let limiter = RateLimiter::new(1, Duration::milliseconds(50));
        assert!(limiter.check_and_record("k").await);
        assert!(!limiter.check_and_record("k").await);

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert!(limiter.check_and_record("k").await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_keys() {
        let limiter = RateLimiter::new(5, Duration::milliseconds(20));
        limiter.record("a").await;
        limiter.record("b").await;
        assert_eq!(limiter.tracked_keys().await, 2);

        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
