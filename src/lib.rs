//! Agent Events - Event bus for conversational agent services
//!
//! Producers publish domain events without knowing who consumes them.
//! Consumers register handlers per event type. Three buses implement the
//! same port: an in-process bus, a logging decorator and a Redis bus that
//! delivers over pub/sub and keeps a stream per event type.
//!
//! A correlation id set at the edge of a request travels inside every event
//! and is restored in the handler's context on the consuming side.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
