//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `AGENT_EVENTS` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use agent_events::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Event bus backend: {:?}", config.event_bus.backend);
//! ```

mod error;
mod event_bus;
mod logging;
mod redis;

pub use error::{ConfigError, ValidationError};
pub use event_bus::{EventBusBackend, EventBusConfig};
pub use logging::{LogFormat, LoggingConfig};
pub use redis::RedisConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields an in-memory
/// bus with pretty logging. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Event bus selection (backend, decorator)
    #[serde(default)]
    pub event_bus: EventBusConfig,

    /// Redis configuration (used by the redis backend)
    #[serde(default)]
    pub redis: RedisConfig,

    /// Logging configuration (filter, format)
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `AGENT_EVENTS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `AGENT_EVENTS__EVENT_BUS__BACKEND=redis` -> `event_bus.backend = redis`
    /// - `AGENT_EVENTS__REDIS__URL=...` -> `redis.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("AGENT_EVENTS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Redis settings are only checked when the redis backend is selected.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.event_bus.uses_redis() {
            self.redis.validate()?;
        }
        self.logging.validate()?;
        Ok(())
    }
}
