//! Configuration management
//!
//! Configuration is loaded from `config.yml` and may be overridden through
//! `FOLIO_*` environment variables. Missing values fall back to defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub comments: CommentConfig,
    #[serde(default)]
    pub revalidate: RevalidateConfig,
    #[serde(default)]
    pub wallet_demo: WalletDemoConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (cookie auth needs an explicit origin)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path or URL, `:memory:` for an in-memory database
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/folio.db".to_string()
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Public site identity, used for the sitemap and `/site`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_name")]
    pub name: String,
    /// Absolute base URL of the public site, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub description: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            base_url: default_base_url(),
            description: String::new(),
        }
    }
}

fn default_site_name() -> String {
    "Folio".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl SiteConfig {
    /// Base URL with any trailing slash removed
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Admin account created on startup when the user table is empty
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            cookie_name: default_cookie_name(),
            bootstrap_admin: None,
        }
    }
}

/// Credentials for the initial admin account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

fn default_session_days() -> i64 {
    7
}

fn default_cookie_name() -> String {
    "session".to_string()
}

/// Comment submission policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentConfig {
    /// Hold new comments as pending until a moderator approves them
    #[serde(default = "default_true")]
    pub require_moderation: bool,
    /// Maximum comment body length in characters
    #[serde(default = "default_comment_max_length")]
    pub max_length: usize,
    /// Submissions allowed per IP per minute
    #[serde(default = "default_comment_rate")]
    pub rate_limit_per_minute: usize,
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            require_moderation: true,
            max_length: default_comment_max_length(),
            rate_limit_per_minute: default_comment_rate(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_comment_max_length() -> usize {
    5000
}

fn default_comment_rate() -> usize {
    5
}

/// Revalidation webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevalidateConfig {
    /// Shared HMAC secret; signed webhook calls are rejected when unset
    #[serde(default)]
    pub secret: Option<String>,
    /// Allowed clock skew for the signature timestamp
    #[serde(default = "default_max_skew")]
    pub max_skew_seconds: i64,
}

impl Default for RevalidateConfig {
    fn default() -> Self {
        Self {
            secret: None,
            max_skew_seconds: default_max_skew(),
        }
    }
}

fn default_max_skew() -> i64 {
    300
}

/// Wallet demo sandbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDemoConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_demo_rate")]
    pub rate_limit_per_minute: usize,
}

impl Default for WalletDemoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate_limit_per_minute: default_demo_rate(),
        }
    }
}

fn default_demo_rate() -> usize {
    10
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration.
    /// Invalid YAML is reported with its line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Recognised variables:
    /// - FOLIO_SERVER_HOST / FOLIO_SERVER_PORT / FOLIO_SERVER_CORS_ORIGIN
    /// - FOLIO_DATABASE_URL
    /// - FOLIO_CACHE_TTL_SECONDS
    /// - FOLIO_SITE_NAME / FOLIO_SITE_BASE_URL
    /// - FOLIO_AUTH_SESSION_DAYS
    /// - FOLIO_COMMENTS_REQUIRE_MODERATION
    /// - FOLIO_REVALIDATE_SECRET
    /// - FOLIO_WALLET_DEMO_ENABLED
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("FOLIO_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parsed_env::<u16>("FOLIO_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(cors_origin) = std::env::var("FOLIO_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(url) = std::env::var("FOLIO_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(ttl) = parsed_env::<u64>("FOLIO_CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl;
        }

        if let Ok(name) = std::env::var("FOLIO_SITE_NAME") {
            self.site.name = name;
        }
        if let Ok(base_url) = std::env::var("FOLIO_SITE_BASE_URL") {
            self.site.base_url = base_url;
        }

        if let Some(days) = parsed_env::<i64>("FOLIO_AUTH_SESSION_DAYS") {
            self.auth.session_days = days;
        }

        if let Some(flag) = parsed_env::<bool>("FOLIO_COMMENTS_REQUIRE_MODERATION") {
            self.comments.require_moderation = flag;
        }

        if let Ok(secret) = std::env::var("FOLIO_REVALIDATE_SECRET") {
            if !secret.is_empty() {
                self.revalidate.secret = Some(secret);
            }
        }

        if let Some(flag) = parsed_env::<bool>("FOLIO_WALLET_DEMO_ENABLED") {
            self.wallet_demo.enabled = flag;
        }
    }
}

/// Read and parse an environment variable, ignoring unparseable values
fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
