//! Ambient correlation context for tracing causal chains of work.
//!
//! The context lives in a tokio task-local. Each scope owns its own copy:
//! replacing the context in one task is never visible to a sibling task,
//! and a task spawned with [`spawn_with_correlation`] starts from a copy of
//! its parent's context.
//!
//! Outside of any scope, reads fall back to a process-wide default context
//! and writes fail with [`CorrelationError::NoActiveScope`].

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::future::Future;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

tokio::task_local! {
    static CURRENT: RefCell<CorrelationContext>;
}

static DEFAULT_CONTEXT: Lazy<CorrelationContext> = Lazy::new(|| CorrelationContext::create(None, None));

/// Correlation information attached to a unit of work.
///
/// Immutable: changing the ambient correlation replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationContext {
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl CorrelationContext {
    /// Creates a context with the given correlation id and no request/user.
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            request_id: None,
            user_id: None,
        }
    }

    /// Creates a context with a freshly generated correlation id.
    pub fn create(request_id: Option<String>, user_id: Option<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            request_id,
            user_id,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Errors from mutating the ambient context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    #[error("no correlation scope is active in the current task")]
    NoActiveScope,
}

/// Builds a context, generating the correlation id when none is given.
pub fn create_correlation_context(
    request_id: Option<String>,
    user_id: Option<String>,
    correlation_id: Option<String>,
) -> CorrelationContext {
    CorrelationContext {
        correlation_id: correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        request_id,
        user_id,
    }
}

/// Returns the context of the current scope, or the process default.
pub fn current_context() -> CorrelationContext {
    CURRENT
        .try_with(|cell| cell.borrow().clone())
        .unwrap_or_else(|_| DEFAULT_CONTEXT.clone())
}

/// Returns the current correlation id.
pub fn correlation_id() -> String {
    CURRENT
        .try_with(|cell| cell.borrow().correlation_id.clone())
        .unwrap_or_else(|_| DEFAULT_CONTEXT.correlation_id.clone())
}

/// Replaces the context of the current scope.
pub fn set_correlation_context(context: CorrelationContext) -> Result<(), CorrelationError> {
    CURRENT
        .try_with(|cell| {
            cell.replace(context);
        })
        .map_err(|_| CorrelationError::NoActiveScope)
}

/// Replaces the correlation id, keeping the request and user ids.
pub fn set_correlation_id(correlation_id: impl Into<String>) -> Result<(), CorrelationError> {
    let current = current_context();
    set_correlation_context(CorrelationContext {
        correlation_id: correlation_id.into(),
        ..current
    })
}

/// Resets the current scope to a fresh default context.
pub fn clear_correlation_id() -> Result<(), CorrelationError> {
    set_correlation_context(CorrelationContext::create(None, None))
}

/// Runs `future` inside a new correlation scope seeded with `context`.
pub async fn with_correlation<F>(context: CorrelationContext, future: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(RefCell::new(context), future).await
}

/// Runs `future` in a new scope that starts from a copy of the current context.
pub async fn in_current_correlation<F>(future: F) -> F::Output
where
    F: Future,
{
    with_correlation(current_context(), future).await
}

/// Spawns a task that inherits a copy of the caller's correlation context.
pub fn spawn_with_correlation<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let context = current_context();
    tokio::spawn(CURRENT.scope(RefCell::new(context), future))
}
