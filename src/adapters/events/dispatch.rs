//! Handler invocation shared by the bus adapters.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::domain::foundation::EventEnvelope;
use crate::ports::SharedHandler;

/// Runs one handler, containing its failure.
///
/// Errors and panics are logged and reported as `false`; they never
/// propagate to the publisher or to sibling handlers.
pub(crate) async fn invoke_handler(handler: &SharedHandler, event: EventEnvelope) -> bool {
    let event_type = event.event_type.clone();
    let event_id = event.event_id().map(ToString::to_string);

    match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(
                handler = handler.name(),
                event_type = %event_type,
                event_id = ?event_id,
                error = %e,
                "Error in event handler"
            );
            false
        }
        Err(_) => {
            tracing::error!(
                handler = handler.name(),
                event_type = %event_type,
                event_id = ?event_id,
                "Event handler panicked"
            );
            false
        }
    }
}
