//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub account: AccountConfig,
    pub remote: RemoteConfig,
    pub streaming: StreamingConfig,
    pub cache: CacheConfig,
    pub direct_messages: DirectMessageConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// The authenticated account this client runs as
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Numeric id of the authenticated account
    pub user_id: u64,
    /// Handle without the leading '@'
    pub screen_name: String,
}

/// Remote service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// REST and streaming base URL (e.g., "https://api.example.com/1.1")
    pub base_url: String,
    /// Bearer token sent with every request
    pub access_token: String,
    /// Timeout for REST requests in seconds (default: 30)
    pub request_timeout_secs: u64,
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Streaming session timings
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    /// Silence tolerated before a forced reconnect (default: 120)
    pub keep_alive_secs: u64,
    /// Pause after a rate-limit error (default: 120)
    pub rate_limit_backoff_secs: u64,
    /// Pause after a network error (default: 30)
    pub network_backoff_secs: u64,
}

impl StreamingConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }

    pub fn network_backoff(&self) -> Duration {
        Duration::from_secs(self.network_backoff_secs)
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            keep_alive_secs: 120,
            rate_limit_backoff_secs: 120,
            network_backoff_secs: 30,
        }
    }
}

/// Entity cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Minimum spacing between applied account updates (default: 60)
    pub account_update_throttle_secs: u64,
    /// Accounts not referenced for this long are evicted (default: 3600)
    pub account_max_idle_secs: u64,
    /// Statuses outside every timeline feed are evicted after this long (default: 3600)
    pub status_max_idle_secs: u64,
    /// Interval of the cache sweep (default: 300)
    pub cleanup_interval_secs: u64,
}

impl CacheConfig {
    pub fn account_update_throttle(&self) -> Duration {
        Duration::from_secs(self.account_update_throttle_secs)
    }

    pub fn account_max_idle(&self) -> Duration {
        Duration::from_secs(self.account_max_idle_secs)
    }

    pub fn status_max_idle(&self) -> Duration {
        Duration::from_secs(self.status_max_idle_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            account_update_throttle_secs: 60,
            account_max_idle_secs: 3600,
            status_max_idle_secs: 3600,
            cleanup_interval_secs: 300,
        }
    }
}

/// Direct message polling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DirectMessageConfig {
    /// Poll interval in seconds (default: 300)
    pub poll_interval_secs: u64,
}

impl DirectMessageConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for DirectMessageConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
        }
    }
}

/// Prometheus endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Serve `/metrics` and `/health`
    pub enabled: bool,
    /// Bind address (default: "127.0.0.1:9464")
    pub bind: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    /// Default `EnvFilter` directives; `RUST_LOG` still takes precedence
    pub fn filter_directives(&self) -> String {
        format!("chirpstream={},tower_http=info", self.level.trim())
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (CHIRPSTREAM__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("remote.request_timeout_secs", 30)?
            .set_default("streaming.keep_alive_secs", 120)?
            .set_default("streaming.rate_limit_backoff_secs", 120)?
            .set_default("streaming.network_backoff_secs", 30)?
            .set_default("cache.account_update_throttle_secs", 60)?
            .set_default("cache.account_max_idle_secs", 3600)?
            .set_default("cache.status_max_idle_secs", 3600)?
            .set_default("cache.cleanup_interval_secs", 300)?
            .set_default("direct_messages.poll_interval_secs", 300)?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.bind", "127.0.0.1:9464")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("CHIRPSTREAM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.account.screen_name.trim().is_empty() {
            return Err(AppError::Config(
                "account.screen_name must not be empty".to_string(),
            ));
        }

        if let Err(e) = url::Url::parse(&self.remote.base_url) {
            return Err(AppError::Config(format!(
                "remote.base_url is not a valid URL: {e}"
            )));
        }

        let durations = [
            ("remote.request_timeout_secs", self.remote.request_timeout_secs),
            ("streaming.keep_alive_secs", self.streaming.keep_alive_secs),
            (
                "streaming.rate_limit_backoff_secs",
                self.streaming.rate_limit_backoff_secs,
            ),
            (
                "streaming.network_backoff_secs",
                self.streaming.network_backoff_secs,
            ),
            (
                "cache.account_update_throttle_secs",
                self.cache.account_update_throttle_secs,
            ),
            ("cache.account_max_idle_secs", self.cache.account_max_idle_secs),
            ("cache.status_max_idle_secs", self.cache.status_max_idle_secs),
            ("cache.cleanup_interval_secs", self.cache.cleanup_interval_secs),
            (
                "direct_messages.poll_interval_secs",
                self.direct_messages.poll_interval_secs,
            ),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, secs)| *secs == 0) {
            return Err(AppError::Config(format!("{name} must be greater than 0")));
        }

        if self.metrics.enabled && self.metrics.bind.parse::<SocketAddr>().is_err() {
            return Err(AppError::Config(format!(
                "metrics.bind is not a socket address: {}",
                self.metrics.bind
            )));
        }

        Ok(())
    }
}
