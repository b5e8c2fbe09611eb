//! EventHandler port - Consumer logic registered against one event type.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{EventEnvelope, HandlerError};

/// Handler for processing delivered events.
///
/// Implementations should be:
/// - **Idempotent** - Delivery is at-least-once, duplicates are possible
/// - **Quick** - Long operations should be queued for async processing
/// - **Isolated** - Errors are logged by the bus and never reach the publisher
///
/// Synchronous and asynchronous closures are adapted to this trait once, at
/// registration time, by `handler_fn` and `async_handler_fn`.
///
/// # Example
///
/// ```ignore
/// struct TaskAuditor { /* ... */ }
///
/// #[async_trait]
/// impl EventHandler for TaskAuditor {
///     async fn handle(&self, event: EventEnvelope) -> Result<(), HandlerError> {
///         let task: TaskProcessedEvent = event.decode()?;
///         // Record audit entry...
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "TaskAuditor"
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process an event.
    async fn handle(&self, event: EventEnvelope) -> Result<(), HandlerError>;

    /// Handler name for logging.
    fn name(&self) -> &str;
}

/// Shared handle to a registered handler.
pub type SharedHandler = Arc<dyn EventHandler>;

/// Returns true when both handles point at the same handler instance.
///
/// Registration identity is the allocation, not the vtable, so two clones of
/// one `Arc` compare equal and two separately built handlers never do.
pub fn same_handler(a: &SharedHandler, b: &SharedHandler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl EventHandler for Noop {
        async fn handle(&self, _: EventEnvelope) -> Result<(), HandlerError> {
            Ok(())
        }
        fn name(&self) -> &str {
            "Noop"
        }
    }

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventHandler) {}

    #[test]
    fn clones_are_the_same_handler() {
        let a: SharedHandler = Arc::new(Noop);
        let b = Arc::clone(&a);
        assert!(same_handler(&a, &b));
    }

    #[test]
    fn distinct_instances_are_different_handlers() {
        let a: SharedHandler = Arc::new(Noop);
        let b: SharedHandler = Arc::new(Noop);
        assert!(!same_handler(&a, &b));
    }
}
