//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - Event bus implementations (in-memory, logging, Redis)

pub mod events;

pub use events::{InMemoryEventBus, LoggingEventBus, RedisEventBus};
