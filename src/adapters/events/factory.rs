//! Builds the configured event bus.

use std::sync::Arc;

use super::{InMemoryEventBus, LoggingEventBus, RedisEventBus};
use crate::config::{AppConfig, EventBusBackend};
use crate::domain::foundation::EventBusError;
use crate::ports::EventBus;

/// Builds the bus selected by `config.event_bus`.
///
/// No connection is opened here; the Redis bus connects on first use.
///
/// # Errors
///
/// Returns a connection error when the Redis URL cannot be parsed.
pub fn build_event_bus(config: &AppConfig) -> Result<Arc<dyn EventBus>, EventBusError> {
    let bus: Arc<dyn EventBus> = match config.event_bus.backend {
        EventBusBackend::Memory => Arc::new(InMemoryEventBus::new()),
        EventBusBackend::Redis => Arc::new(RedisEventBus::new(config.redis.clone())?),
    };

    tracing::info!(
        backend = ?config.event_bus.backend,
        log_events = config.event_bus.log_events,
        "Built event bus"
    );

    if config.event_bus.log_events {
        Ok(Arc::new(LoggingEventBus::wrap(bus)))
    } else {
        Ok(bus)
    }
}
