//! Configuration management for the query engine

use crate::error::{ConfigError, Result, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for the query engine.
///
/// Holds the upstream connection settings, cache sizing and query defaults.
///
/// # Example
///
/// ```rust,no_run
/// use swapi_query_engine::config::EngineConfig;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EngineConfig::load().await?;
/// println!("Upstream URL: {}", config.upstream.url);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

/// Connection settings for the upstream SWAPI service.
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::config::UpstreamConfig;
///
/// let config = UpstreamConfig {
///     url: "https://swapi.dev/api/".to_string(),
///     timeout: 10,
///     retry_attempts: 3,
///     base_delay_ms: 500,
///     user_agent: "swapi-query-engine/0.1.0".to_string(),
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base delay of the exponential backoff, doubled on every attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Sizing of the process-wide page and entity caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_page_capacity")]
    pub page_capacity: usize,
    #[serde(default = "default_entity_capacity")]
    pub entity_capacity: usize,
    /// Time-to-live in seconds, 0 disables expiry
    #[serde(default)]
    pub ttl_secs: u64,
}

/// Defaults applied to every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Levels of cascading enrichment below a requested field
    #[serde(default = "default_enrichment_depth")]
    pub enrichment_depth: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            timeout: default_timeout(),
            retry_attempts: default_retry_attempts(),
            base_delay_ms: default_base_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_capacity: default_page_capacity(),
            entity_capacity: default_entity_capacity(),
            ttl_secs: 0,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            enrichment_depth: default_enrichment_depth(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

impl EngineConfig {
    /// Loads configuration from the default location, falling back to
    /// defaults when no file exists. Environment overrides are applied last.
    pub async fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        let mut config = if config_path.exists() {
            Self::from_file(&config_path).await?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a specific TOML file.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use swapi_query_engine::config::EngineConfig;
    /// use std::path::Path;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = EngineConfig::from_file(Path::new("custom.toml")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::InvalidFile {
                path: path.to_path_buf(),
            })?;

        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default configuration file path (sqe.toml in current directory).
    pub fn default_config_path() -> PathBuf {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("sqe.toml")
    }

    pub fn validate(&self) -> Result<()> {
        <Self as Validate>::validate(self).map_err(|e| e.into())
    }

    /// Applies environment variable overrides to the configuration.
    ///
    /// The following environment variables are supported:
    /// - `SQE_UPSTREAM_URL` - Override upstream base URL
    /// - `SQE_UPSTREAM_TIMEOUT` - Override request timeout (seconds)
    /// - `SQE_CACHE_CAPACITY` - Override page cache capacity
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SQE_UPSTREAM_URL") {
            self.upstream.url = url;
        }

        if let Ok(timeout) = std::env::var("SQE_UPSTREAM_TIMEOUT") {
            match timeout.parse() {
                Ok(secs) => self.upstream.timeout = secs,
                Err(_) => tracing::warn!("Ignoring invalid SQE_UPSTREAM_TIMEOUT: {}", timeout),
            }
        }

        if let Ok(capacity) = std::env::var("SQE_CACHE_CAPACITY") {
            match capacity.parse() {
                Ok(n) => self.cache.page_capacity = n,
                Err(_) => tracing::warn!("Ignoring invalid SQE_CACHE_CAPACITY: {}", capacity),
            }
        }
    }

    /// Configuration pointed at a local test server with fast retries.
    pub fn test_config(upstream_url: &str) -> Self {
        Self {
            upstream: UpstreamConfig {
                url: upstream_url.to_string(),
                timeout: 5,
                retry_attempts: 3,
                base_delay_ms: 1,
                user_agent: default_user_agent(),
            },
            cache: CacheConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

fn default_upstream_url() -> String {
    "https://swapi.dev/api/".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    format!("swapi-query-engine/{}", env!("CARGO_PKG_VERSION"))
}
fn default_page_capacity() -> usize {
    256
}
fn default_entity_capacity() -> usize {
    1024
}
fn default_page_size() -> usize {
    10
}
fn default_max_concurrent_fetches() -> usize {
    8
}
fn default_enrichment_depth() -> usize {
    2
}

impl Validate for EngineConfig {
    type Error = ConfigError;

    fn validate(&self) -> std::result::Result<(), Self::Error> {
        self.upstream.validate()?;
        self.cache.validate()?;
        self.query.validate()?;
        Ok(())
    }
}

impl Validate for UpstreamConfig {
    type Error = ConfigError;

    fn validate(&self) -> std::result::Result<(), Self::Error> {
        let parsed = url::Url::parse(&self.url).map_err(|_| ConfigError::InvalidUpstreamUrl {
            url: self.url.clone(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUpstreamUrl {
                url: self.url.clone(),
            });
        }

        if self.timeout == 0 {
            return Err(ConfigError::ValidationFailed {
                message: "Upstream timeout must be greater than 0".to_string(),
            });
        }

        if self.retry_attempts == 0 {
            return Err(ConfigError::ValidationFailed {
                message: "Upstream retry attempts must be greater than 0".to_string(),
            });
        }

        if self.retry_attempts > 10 {
            return Err(ConfigError::ValidationFailed {
                message: "Upstream retry attempts should not exceed 10".to_string(),
            });
        }

        Ok(())
    }
}

impl Validate for CacheConfig {
    type Error = ConfigError;

    fn validate(&self) -> std::result::Result<(), Self::Error> {
        if self.page_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.page_capacity".to_string(),
                value: "0".to_string(),
            });
        }
        if self.entity_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.entity_capacity".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for QueryConfig {
    type Error = ConfigError;

    fn validate(&self) -> std::result::Result<(), Self::Error> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "query.page_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::InvalidValue {
                key: "query.max_concurrent_fetches".to_string(),
                value: "0".to_string(),
            });
        }
        if self.enrichment_depth == 0 || self.enrichment_depth > 5 {
            return Err(ConfigError::ValidationFailed {
                message: format!(
                    "Enrichment depth must be between 1 and 5, got {}",
                    self.enrichment_depth
                ),
            });
        }
        Ok(())
    }
}
