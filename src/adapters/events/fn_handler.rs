//! Closure adapters for the `EventHandler` port.
//!
//! Plain functions and closures are wrapped once, when they are registered,
//! so the buses only ever dispatch through `EventHandler::handle`.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::domain::foundation::{EventEnvelope, HandlerError};
use crate::ports::{EventHandler, SharedHandler};

/// Handler backed by a synchronous closure.
pub struct SyncFnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> EventHandler for SyncFnHandler<F>
where
    F: Fn(&EventEnvelope) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, event: EventEnvelope) -> Result<(), HandlerError> {
        (self.f)(&event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handler backed by a closure returning a future.
pub struct AsyncFnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> EventHandler for AsyncFnHandler<F>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, event: EventEnvelope) -> Result<(), HandlerError> {
        (self.f)(event).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wraps a synchronous closure as a shared handler.
pub fn handler_fn<F>(name: impl Into<String>, f: F) -> SharedHandler
where
    F: Fn(&EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(SyncFnHandler {
        name: name.into(),
        f,
    })
}

/// Wraps an async closure as a shared handler.
pub fn async_handler_fn<F, Fut>(name: impl Into<String>, f: F) -> SharedHandler
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(AsyncFnHandler {
        name: name.into(),
        f,
    })
}
