//! Foundation module - Shared domain primitives.
//!
//! Contains the event vocabulary (identifiers, metadata, envelopes),
//! the ambient correlation context, timestamps and error types that
//! every bus adapter builds on.

pub mod correlation;
mod errors;
mod events;
mod timestamp;

pub use correlation::{CorrelationContext, CorrelationError};
pub use errors::{BoxError, ErrorKind, EventBusError, HandlerError};
pub use events::{domain_event, DomainEvent, EventEnvelope, EventId, EventMetadata, METADATA_KEY};
pub use timestamp::Timestamp;
