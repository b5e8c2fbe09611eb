//! Event bus selection

use serde::Deserialize;

/// Which event bus implementation to build
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventBusBackend {
    /// In-process delivery
    #[default]
    Memory,
    /// Redis pub/sub with per-type streams
    Redis,
}

/// Event bus configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EventBusConfig {
    /// Backend to build
    #[serde(default)]
    pub backend: EventBusBackend,

    /// Wrap the bus in a decorator that logs every operation
    #[serde(default)]
    pub log_events: bool,
}

impl EventBusConfig {
    pub fn uses_redis(&self) -> bool {
        self.backend == EventBusBackend::Redis
    }
}
