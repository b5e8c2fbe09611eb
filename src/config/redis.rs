//! Redis configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Redis configuration for the event bus
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (`redis://host:port/db`)
    #[serde(default = "default_url")]
    pub url: String,

    /// Prefix for channel and stream keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Connect and liveness-probe timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retry a connection attempt once when it times out
    #[serde(default = "default_retry_on_timeout")]
    pub retry_on_timeout: bool,
}

impl RedisConfig {
    /// Creates a configuration for `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Overrides the key prefix.
    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS_URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.key_prefix.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS_KEY_PREFIX"));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            key_prefix: default_key_prefix(),
            timeout_secs: default_timeout(),
            retry_on_timeout: default_retry_on_timeout(),
        }
    }
}

fn default_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_key_prefix() -> String {
    "events:".to_string()
}

fn default_timeout() -> u64 {
    5
}

fn default_retry_on_timeout() -> bool {
    true
}
