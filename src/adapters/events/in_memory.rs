//! In-memory event bus implementation.
//!
//! Direct, in-process delivery for single-process deployments and tests.
//! Handlers for one publish run concurrently and `publish` returns once
//! all of them have completed or failed.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::dispatch::invoke_handler;
use crate::domain::foundation::{EventBusError, EventEnvelope};
use crate::ports::{same_handler, EventBus, SharedHandler};

/// In-memory event bus.
///
/// Features:
/// - Exact event-type routing
/// - Concurrent handler execution with per-handler failure isolation
/// - Optional capture of published events for assertions
///
/// # Example
///
/// ```ignore
/// let bus = InMemoryEventBus::new();
///
/// bus.subscribe_to::<TaskProcessedEvent>(handler).await?;
/// bus.publish_event(&TaskProcessedEvent::new("task-1", "done")).await?;
///
/// assert_eq!(bus.event_count(), 1);
/// assert!(bus.has_event("TaskProcessedEvent"));
/// ```
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<String, Vec<SharedHandler>>>,
    published: RwLock<Vec<EventEnvelope>>,
    record_events: bool,
}

impl InMemoryEventBus {
    /// Creates a new empty event bus that records published events.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            published: RwLock::new(Vec::new()),
            record_events: true,
        }
    }

    /// Creates a bus that does not keep a log of published events.
    pub fn without_recording() -> Self {
        Self {
            record_events: false,
            ..Self::new()
        }
    }

    // === Introspection ===

    /// Returns all published events in publish order.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Clears the published event log.
    pub fn clear_published_events(&self) {
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns count of published events.
    pub fn event_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Checks if a specific event type was published.
    pub fn has_event(&self, event_type: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.event_type == event_type)
    }

    /// Returns the number of handlers registered for an event type.
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Alias for [`handler_count`](Self::handler_count).
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.handler_count(event_type)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), EventBusError> {
        if self.record_events {
            self.published
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }

        // Clone handlers to release lock before await points
        let type_handlers: Vec<SharedHandler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        if type_handlers.is_empty() {
            return Ok(());
        }

        let results = join_all(
            type_handlers
                .iter()
                .map(|handler| invoke_handler(handler, event.clone())),
        )
        .await;

        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            tracing::debug!(
                event_type = %event.event_type,
                failed,
                total = results.len(),
                "Some handlers failed"
            );
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        event_type: &str,
        handler: SharedHandler,
    ) -> Result<(), EventBusError> {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let registered = handlers.entry(event_type.to_string()).or_default();
        if !registered.iter().any(|h| same_handler(h, &handler)) {
            registered.push(handler);
        }
        Ok(())
    }

    async fn unsubscribe(
        &self,
        event_type: &str,
        handler: &SharedHandler,
    ) -> Result<(), EventBusError> {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(registered) = handlers.get_mut(event_type) {
            registered.retain(|h| !same_handler(h, handler));
            if registered.is_empty() {
                handlers.remove(event_type);
            }
        }
        Ok(())
    }
}
