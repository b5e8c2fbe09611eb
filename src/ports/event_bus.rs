//! EventBus port - Publish/subscribe contract shared by every adapter.
//!
//! This port defines how producers and consumers exchange events without
//! knowing about the underlying transport (in-memory, Redis, etc.).

use async_trait::async_trait;

use super::event_handler::SharedHandler;
use crate::domain::foundation::{DomainEvent, ErrorKind, EventBusError, EventEnvelope};

/// Port for exchanging domain events.
///
/// Implementations must ensure:
/// - Publishing with zero subscribers is not an error
/// - Handlers match the exact event type name, nothing else
/// - Registering the same handler twice for one type delivers once
/// - Unsubscribing an unknown handler or type is a no-op
/// - Transport failures surface as `EventBusError`, never raw
///
/// # Example
///
/// ```ignore
/// let event = TaskProcessedEvent::new("task-123", "completed");
/// bus.publish(event.to_envelope()?).await?;
/// ```
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Delivers the event to every handler registered for its type.
    async fn publish(&self, event: EventEnvelope) -> Result<(), EventBusError>;

    /// Registers `handler` for events whose type name equals `event_type`.
    async fn subscribe(&self, event_type: &str, handler: SharedHandler)
        -> Result<(), EventBusError>;

    /// Removes a registration made with `subscribe`.
    async fn unsubscribe(
        &self,
        event_type: &str,
        handler: &SharedHandler,
    ) -> Result<(), EventBusError>;

    /// Releases transport resources. Buses without any hold nothing to release.
    async fn close(&self) {}
}

/// Typed helpers over [`EventBus`] for concrete domain events.
#[async_trait]
pub trait EventBusExt: EventBus {
    /// Renders and publishes a domain event.
    ///
    /// A payload that cannot be rendered surfaces as a publish error.
    async fn publish_event<E: DomainEvent>(&self, event: &E) -> Result<(), EventBusError> {
        let envelope = event.to_envelope().map_err(|e| {
            EventBusError::wrap(
                ErrorKind::Publish,
                format!("failed to serialize {}", E::EVENT_TYPE),
                e,
            )
        })?;
        self.publish(envelope).await
    }

    /// Subscribes `handler` to the event type `E`.
    async fn subscribe_to<E: DomainEvent>(&self, handler: SharedHandler) -> Result<(), EventBusError> {
        self.subscribe(E::EVENT_TYPE, handler).await
    }

    /// Unsubscribes `handler` from the event type `E`.
    async fn unsubscribe_from<E: DomainEvent>(
        &self,
        handler: &SharedHandler,
    ) -> Result<(), EventBusError> {
        self.unsubscribe(E::EVENT_TYPE, handler).await
    }
}

impl<B: EventBus + ?Sized> EventBusExt for B {}
