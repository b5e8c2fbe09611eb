//! Logging event bus decorator.
//!
//! Records every publish, subscribe and unsubscribe as a structured
//! `tracing` event, then forwards to an optional inner bus. Errors from the
//! inner bus are returned unchanged.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{EventBusError, EventEnvelope};
use crate::ports::{EventBus, SharedHandler};

/// Event bus that logs all traffic.
///
/// Without an inner bus every operation is a no-op beyond the log entry,
/// which makes it usable as a dry-run sink.
#[derive(Default)]
pub struct LoggingEventBus {
    inner: Option<Arc<dyn EventBus>>,
}

impl LoggingEventBus {
    /// Creates a logging-only bus with no delivery.
    pub fn new() -> Self {
        Self { inner: None }
    }

    /// Wraps `inner`, forwarding every call after logging it.
    pub fn wrap(inner: Arc<dyn EventBus>) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn has_inner(&self) -> bool {
        self.inner.is_some()
    }
}

#[async_trait]
impl EventBus for LoggingEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), EventBusError> {
        tracing::info!(
            event_type = %event.event_type,
            event_id = ?event.event_id().map(|id| id.as_str()),
            correlation_id = ?event.correlation_id(),
            timestamp = ?event.timestamp().map(|ts| ts.to_iso8601()),
            "Publishing event"
        );

        match &self.inner {
            Some(inner) => inner.publish(event).await,
            None => Ok(()),
        }
    }

    async fn subscribe(
        &self,
        event_type: &str,
        handler: SharedHandler,
    ) -> Result<(), EventBusError> {
        tracing::info!(event_type, handler = handler.name(), "Subscribing handler");

        match &self.inner {
            Some(inner) => inner.subscribe(event_type, handler).await,
            None => Ok(()),
        }
    }

    async fn unsubscribe(
        &self,
        event_type: &str,
        handler: &SharedHandler,
    ) -> Result<(), EventBusError> {
        tracing::info!(event_type, handler = handler.name(), "Unsubscribing handler");

        match &self.inner {
            Some(inner) => inner.unsubscribe(event_type, handler).await,
            None => Ok(()),
        }
    }

    async fn close(&self) {
        tracing::info!("Closing event bus");

        if let Some(inner) = &self.inner {
            inner.close().await;
        }
    }
}
