//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `EventBus` - Publish, subscribe and unsubscribe
//! - `EventBusExt` - Typed helpers for concrete domain events
//! - `EventHandler` - Consumer logic invoked for delivered events

mod event_bus;
mod event_handler;

pub use event_bus::{EventBus, EventBusExt};
pub use event_handler::{same_handler, EventHandler, SharedHandler};
