//! Error types for the event bus and its collaborators.

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed cause carried by [`EventBusError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure categories for bus operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The event could not be handed to the transport.
    Publish,
    /// A handler could not be registered or deregistered.
    Subscription,
    /// The transport connection could not be established.
    Connection,
    /// A payload could not be encoded or decoded.
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Publish => "PUBLISH_FAILED",
            ErrorKind::Subscription => "SUBSCRIPTION_FAILED",
            ErrorKind::Connection => "CONNECTION_FAILED",
            ErrorKind::Serialization => "SERIALIZATION_FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Error surfaced by every caller-facing bus operation.
///
/// Transport errors never escape raw; they are wrapped here with the kind
/// of the operation that triggered them and kept as the `source`.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct EventBusError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    source: Option<BoxError>,
}

impl EventBusError {
    /// Creates a new error without an underlying cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a publish-path error.
    pub fn publish(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Publish, message)
    }

    /// Creates a subscribe/unsubscribe-path error.
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Subscription, message)
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Re-tags an error under another kind, keeping the original as the cause.
    ///
    /// Used when a connection failure surfaces through `publish` or `subscribe`.
    pub fn wrap(kind: ErrorKind, message: impl Into<String>, cause: EventBusError) -> Self {
        Self::new(kind, message).with_source(cause)
    }

    pub fn is_publish(&self) -> bool {
        self.kind == ErrorKind::Publish
    }

    pub fn is_subscription(&self) -> bool {
        self.kind == ErrorKind::Subscription
    }

    pub fn is_connection(&self) -> bool {
        self.kind == ErrorKind::Connection
    }

    pub fn is_serialization(&self) -> bool {
        self.kind == ErrorKind::Serialization
    }
}

/// Error returned by an event handler.
///
/// Handler failures are logged by the bus and never reach the publisher.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self(format!("payload decode failed: {}", err))
    }
}

impl From<EventBusError> for HandlerError {
    fn from(err: EventBusError) -> Self {
        Self(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_displays_code() {
        assert_eq!(ErrorKind::Publish.to_string(), "PUBLISH_FAILED");
        assert_eq!(ErrorKind::Subscription.to_string(), "SUBSCRIPTION_FAILED");
        assert_eq!(ErrorKind::Connection.to_string(), "CONNECTION_FAILED");
        assert_eq!(ErrorKind::Serialization.to_string(), "SERIALIZATION_FAILED");
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = EventBusError::publish("transport down");
        assert_eq!(err.to_string(), "PUBLISH_FAILED: transport down");
        assert!(err.is_publish());
        assert!(!err.is_subscription());
    }

    #[test]
    fn wrap_keeps_cause_chain() {
        let cause = EventBusError::connection("refused");
        let err = EventBusError::wrap(ErrorKind::Subscription, "subscribe failed", cause);

        assert!(err.is_subscription());
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "CONNECTION_FAILED: refused");
    }

    #[test]
    fn new_error_has_no_source() {
        let err = EventBusError::serialization("bad json");
        assert!(err.source().is_none());
        assert!(err.is_serialization());
    }

    #[test]
    fn handler_error_converts_from_strings() {
        let a: HandlerError = "boom".into();
        let b: HandlerError = String::from("bang").into();
        assert_eq!(a.message(), "boom");
        assert_eq!(b.to_string(), "bang");
    }
}
