//! Event bus adapters.
//!
//! Adapters implement the `EventBus` port for different environments:
//!
//! - `InMemoryEventBus` - In-process bus for tests and single-process deployments
//! - `LoggingEventBus` - Decorator that logs every operation before forwarding it
//! - `RedisEventBus` - Pub/sub delivery with a durable stream per event type
//!
//! `build_event_bus` picks one of them from `AppConfig`.
//! `handler_fn` and `async_handler_fn` adapt closures to the `EventHandler` port.

mod dispatch;
mod factory;
mod fn_handler;
mod in_memory;
mod logging;
mod redis;

pub use factory::build_event_bus;
pub use fn_handler::{async_handler_fn, handler_fn, AsyncFnHandler, SyncFnHandler};
pub use in_memory::InMemoryEventBus;
pub use logging::LoggingEventBus;
pub use self::redis::{ConnectionState, RedisEventBus, STREAM_FIELD};
