//! Event infrastructure for domain event publishing and handling.
//!
//! This module provides the core types and traits for event-driven architecture:
//! - `EventId` - Unique identifier for events
//! - `EventMetadata` - Identity, correlation and versioning block
//! - `EventEnvelope` - The JSON wire document every bus transports
//! - `DomainEvent` - Trait that all domain events implement
//! - `domain_event!` - Macro to simplify DomainEvent implementations

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use super::correlation;
use super::{EventBusError, Timestamp};

/// Key reserved for the metadata block in the wire document.
pub const METADATA_KEY: &str = "metadata";

// ============================================
// DomainEvent Trait
// ============================================

/// Trait that all domain events must implement.
///
/// A domain event is an immutable value: payload fields are whatever the
/// implementing struct serializes, and the metadata block is carried in a
/// field skipped by serde. Use the `domain_event!` macro to implement this
/// trait with minimal boilerplate.
pub trait DomainEvent: Serialize + Send + Sync {
    /// Routing key for the event, derived from the type name by the macro.
    const EVENT_TYPE: &'static str;

    /// Returns the metadata captured at construction.
    fn metadata(&self) -> &EventMetadata;

    /// Returns the event with its metadata replaced.
    fn with_metadata(self, metadata: EventMetadata) -> Self
    where
        Self: Sized;

    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    fn event_id(&self) -> &EventId {
        &self.metadata().event_id
    }

    fn correlation_id(&self) -> &str {
        &self.metadata().correlation_id
    }

    fn timestamp(&self) -> Timestamp {
        self.metadata().timestamp
    }

    fn version(&self) -> u32 {
        self.metadata().version
    }

    /// Renders the event as its wire document.
    fn to_envelope(&self) -> Result<EventEnvelope, EventBusError>
    where
        Self: Sized,
    {
        EventEnvelope::from_event(self)
    }

    /// Short human-readable form used in log lines.
    fn describe(&self) -> String {
        format!(
            "{}(id={}, correlation_id={})",
            self.event_type(),
            self.event_id(),
            self.correlation_id()
        )
    }
}

/// Macro to implement DomainEvent for a struct with a `metadata` field.
///
/// The struct must carry `#[serde(skip)] metadata: EventMetadata`. The event
/// type defaults to the struct identifier.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct TaskProcessedEvent {
///     #[serde(skip)]
///     pub metadata: EventMetadata,
///     pub task_id: String,
///     pub status: String,
/// }
///
/// domain_event!(TaskProcessedEvent);
/// ```
#[macro_export]
macro_rules! domain_event {
    ($event_name:ident) => {
        $crate::domain_event!($event_name, event_type = stringify!($event_name));
    };
    ($event_name:ident, event_type = $event_type:expr) => {
        impl $crate::domain::foundation::DomainEvent for $event_name {
            const EVENT_TYPE: &'static str = $event_type;

            fn metadata(&self) -> &$crate::domain::foundation::EventMetadata {
                &self.metadata
            }

            fn with_metadata(self, metadata: $crate::domain::foundation::EventMetadata) -> Self {
                Self { metadata, ..self }
            }
        }
    };
}

// Re-export the macro
pub use domain_event;

/// Unique identifier for events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random EventId using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates an EventId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity and causal metadata carried by every domain event.
///
/// Only `correlation_id` is required on the wire. A block missing the other
/// fields decodes with a fresh event id, the decode time and version 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub event_id: EventId,
    pub correlation_id: String,
    #[serde(default = "Timestamp::now")]
    pub timestamp: Timestamp,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl EventMetadata {
    /// Creates metadata bound to the ambient correlation id.
    pub fn new() -> Self {
        Self {
            event_id: EventId::new(),
            correlation_id: correlation::correlation_id(),
            timestamp: Timestamp::now(),
            version: default_version(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire document for events.
///
/// Domain events render as `{event_type, metadata, data}`. Values published
/// without domain metadata use the fallback `{event_type, data, correlation_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub event_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,

    #[serde(default)]
    pub data: JsonValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl EventEnvelope {
    /// Renders a domain event as its wire document.
    pub fn from_event<E: DomainEvent>(event: &E) -> Result<Self, EventBusError> {
        let data = serde_json::to_value(event).map_err(|e| {
            EventBusError::serialization(format!("failed to serialize {}: {}", E::EVENT_TYPE, e))
                .with_source(e)
        })?;

        match &data {
            JsonValue::Object(fields) if fields.contains_key(METADATA_KEY) => {
                Err(EventBusError::serialization(format!(
                    "{} payload uses the reserved '{}' key",
                    E::EVENT_TYPE,
                    METADATA_KEY
                )))
            }
            JsonValue::Object(_) => Ok(Self {
                event_type: E::EVENT_TYPE.to_string(),
                metadata: Some(event.metadata().clone()),
                data,
                correlation_id: None,
            }),
            _ => Err(EventBusError::serialization(format!(
                "{} payload must serialize to a JSON object",
                E::EVENT_TYPE
            ))),
        }
    }

    /// Wraps an arbitrary value in the fallback shape with the ambient correlation id.
    pub fn from_value<T: Serialize>(
        event_type: impl Into<String>,
        value: &T,
    ) -> Result<Self, EventBusError> {
        let event_type = event_type.into();
        let data = serde_json::to_value(value).map_err(|e| {
            EventBusError::serialization(format!("failed to serialize {}: {}", event_type, e))
                .with_source(e)
        })?;

        Ok(Self {
            event_type,
            metadata: None,
            data,
            correlation_id: Some(correlation::correlation_id()),
        })
    }

    pub fn event_id(&self) -> Option<&EventId> {
        self.metadata.as_ref().map(|m| &m.event_id)
    }

    /// Correlation id from the metadata block, if any.
    pub fn metadata_correlation_id(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.correlation_id.as_str())
    }

    /// Correlation id from the metadata block, falling back to the top-level field.
    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata_correlation_id()
            .or(self.correlation_id.as_deref())
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        self.metadata.as_ref().map(|m| m.timestamp)
    }

    /// Deserialize `data` to a specific payload type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }

    /// Rebuilds the typed domain event, restoring its metadata.
    pub fn decode<E>(&self) -> Result<E, EventBusError>
    where
        E: DomainEvent + DeserializeOwned,
    {
        if self.event_type != E::EVENT_TYPE {
            return Err(EventBusError::serialization(format!(
                "expected {}, got {}",
                E::EVENT_TYPE,
                self.event_type
            )));
        }

        let event: E = self.payload_as().map_err(|e| {
            EventBusError::serialization(format!("failed to decode {}: {}", E::EVENT_TYPE, e))
                .with_source(e)
        })?;

        Ok(match &self.metadata {
            Some(metadata) => event.with_metadata(metadata.clone()),
            None => event,
        })
    }

    /// Encodes the envelope as a JSON string.
    pub fn to_json(&self) -> Result<String, EventBusError> {
        serde_json::to_string(self).map_err(|e| {
            EventBusError::serialization(format!("failed to encode {}: {}", self.event_type, e))
                .with_source(e)
        })
    }

    /// Decodes an envelope from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, EventBusError> {
        serde_json::from_str(raw).map_err(|e| {
            EventBusError::serialization(format!("failed to deserialize event: {}", e)).with_source(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::correlation::{with_correlation, CorrelationContext};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct SampleEvent {
        #[serde(skip)]
        metadata: EventMetadata,
        name: String,
        count: u32,
    }

    domain_event!(SampleEvent);

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct RenamedEvent {
        #[serde(skip)]
        metadata: EventMetadata,
    }

    domain_event!(RenamedEvent, event_type = "agent.renamed");

    #[derive(Debug, Clone, Serialize)]
    struct CollidingEvent {
        #[serde(skip)]
        metadata: EventMetadata,
        #[serde(rename = "metadata")]
        note: String,
    }

    domain_event!(CollidingEvent);

    #[derive(Debug, Clone, Serialize)]
    #[serde(transparent)]
    struct ScalarEvent {
        #[serde(skip)]
        metadata: EventMetadata,
        value: u32,
    }

    domain_event!(ScalarEvent);

    fn sample(name: &str) -> SampleEvent {
        SampleEvent {
            metadata: EventMetadata::new(),
            name: name.to_string(),
            count: 3,
        }
    }

    // ============================================================
    // EventId / EventMetadata
    // ============================================================

    #[test]
    fn event_id_generates_unique_values() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn event_id_serializes_transparently() {
        let id = EventId::from_string("test-id");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""test-id""#);
        assert_eq!(id.to_string(), "test-id");
    }

    #[test]
    fn metadata_defaults() {
        let metadata = EventMetadata::new();
        assert_eq!(metadata.version, 1);
        assert!(Uuid::parse_str(metadata.event_id.as_str()).is_ok());
        assert!(!metadata.correlation_id.is_empty());
    }

    #[tokio::test]
    async fn metadata_captures_ambient_correlation() {
        let metadata = with_correlation(CorrelationContext::new("abc-123"), async {
            EventMetadata::new()
        })
        .await;
        assert_eq!(metadata.correlation_id, "abc-123");
    }

    #[tokio::test]
    async fn explicit_correlation_overrides_ambient() {
        let metadata = with_correlation(CorrelationContext::new("ambient"), async {
            EventMetadata::new().with_correlation_id("explicit")
        })
        .await;
        assert_eq!(metadata.correlation_id, "explicit");
    }

    #[test]
    fn metadata_serializes_expected_keys() {
        let metadata = EventMetadata::new().with_version(2);
        let value = serde_json::to_value(&metadata).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 4);
        assert!(object["event_id"].is_string());
        assert!(object["correlation_id"].is_string());
        assert!(object["timestamp"].is_string());
        assert_eq!(object["version"], 2);
    }

    // ============================================================
    // DomainEvent
    // ============================================================

    #[test]
    fn event_type_defaults_to_struct_name() {
        assert_eq!(sample("a").event_type(), "SampleEvent");
        assert_eq!(SampleEvent::EVENT_TYPE, "SampleEvent");
    }

    #[test]
    fn event_type_can_be_overridden() {
        let event = RenamedEvent {
            metadata: EventMetadata::new(),
        };
        assert_eq!(event.event_type(), "agent.renamed");
    }

    #[test]
    fn accessors_read_metadata() {
        let metadata = EventMetadata::new()
            .with_event_id(EventId::from_string("evt-1"))
            .with_correlation_id("corr-1")
            .with_version(4);
        let event = sample("x").with_metadata(metadata.clone());

        assert_eq!(event.event_id().as_str(), "evt-1");
        assert_eq!(event.correlation_id(), "corr-1");
        assert_eq!(event.version(), 4);
        assert_eq!(event.timestamp(), metadata.timestamp);
    }

    #[test]
    fn events_created_later_have_later_timestamps() {
        let first = sample("first");
        let second = sample("second");
        assert!(!second.timestamp().is_before(&first.timestamp()));
        assert_ne!(first.event_id(), second.event_id());
    }

    #[test]
    fn describe_includes_identity() {
        let event = sample("x").with_metadata(
            EventMetadata::new()
                .with_event_id(EventId::from_string("evt-9"))
                .with_correlation_id("corr-9"),
        );
        assert_eq!(event.describe(), "SampleEvent(id=evt-9, correlation_id=corr-9)");
    }

    // ============================================================
    // EventEnvelope
    // ============================================================

    #[test]
    fn to_envelope_renders_wire_shape() {
        let event = sample("widget");
        let envelope = event.to_envelope().unwrap();
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["event_type"], "SampleEvent");
        assert_eq!(value["data"], json!({"name": "widget", "count": 3}));
        assert_eq!(value["metadata"]["event_id"], event.event_id().as_str());
        assert_eq!(value["metadata"]["correlation_id"], event.correlation_id());
        assert_eq!(value["metadata"]["version"], 1);
        assert_eq!(value["metadata"]["timestamp"], event.timestamp().to_iso8601());
        assert!(value.get("correlation_id").is_none());
    }

    #[test]
    fn to_envelope_is_deterministic() {
        let event = sample("same");
        let a = event.to_envelope().unwrap().to_json().unwrap();
        let b = event.to_envelope().unwrap().to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn to_envelope_rejects_reserved_key() {
        let event = CollidingEvent {
            metadata: EventMetadata::new(),
            note: "clash".to_string(),
        };
        let err = event.to_envelope().unwrap_err();
        assert!(err.is_serialization());
        assert!(err.message.contains("reserved"));
    }

    #[test]
    fn to_envelope_rejects_non_object_payload() {
        let event = ScalarEvent {
            metadata: EventMetadata::new(),
            value: 7,
        };
        assert!(event.to_envelope().unwrap_err().is_serialization());
    }

    #[tokio::test]
    async fn from_value_uses_fallback_shape() {
        let envelope = with_correlation(CorrelationContext::new("fallback-1"), async {
            EventEnvelope::from_value("Heartbeat", &json!({"beat": 1})).unwrap()
        })
        .await;
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["event_type"], "Heartbeat");
        assert_eq!(value["data"], json!({"beat": 1}));
        assert_eq!(value["correlation_id"], "fallback-1");
        assert!(value.get("metadata").is_none());
        assert_eq!(envelope.correlation_id(), Some("fallback-1"));
        assert_eq!(envelope.metadata_correlation_id(), None);
    }

    #[test]
    fn from_value_accepts_scalars() {
        let envelope = EventEnvelope::from_value("Tick", &"now").unwrap();
        assert_eq!(envelope.data, json!("now"));
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let envelope = sample("round").to_envelope().unwrap();
        let raw = envelope.to_json().unwrap();
        let restored = EventEnvelope::from_json(&raw).unwrap();

        assert_eq!(restored, envelope);
        assert_eq!(restored.event_type, "SampleEvent");
        assert_eq!(restored.metadata_correlation_id(), envelope.metadata_correlation_id());
    }

    #[test]
    fn from_json_accepts_naive_timestamp() {
        let raw = r#"{
            "event_type": "SampleEvent",
            "metadata": {
                "event_id": "evt-1",
                "correlation_id": "abc-123",
                "timestamp": "2024-01-02T03:04:05.123456",
                "version": 1
            },
            "data": {"name": "legacy", "count": 1}
        }"#;

        let envelope = EventEnvelope::from_json(raw).unwrap();
        assert_eq!(envelope.metadata_correlation_id(), Some("abc-123"));
        assert_eq!(
            envelope.timestamp().unwrap().to_iso8601(),
            "2024-01-02T03:04:05.123456+00:00"
        );
        let decoded: SampleEvent = envelope.decode().unwrap();
        assert_eq!(decoded.event_id().as_str(), "evt-1");
    }

    #[test]
    fn from_json_fills_missing_metadata_fields() {
        let raw = r#"{
            "event_type": "SampleEvent",
            "metadata": {"correlation_id": "abc-456"},
            "data": {"name": "minimal", "count": 2}
        }"#;

        let envelope = EventEnvelope::from_json(raw).unwrap();
        let metadata = envelope.metadata.as_ref().unwrap();
        assert_eq!(metadata.correlation_id, "abc-456");
        assert_eq!(metadata.version, 1);
        assert!(Uuid::parse_str(metadata.event_id.as_str()).is_ok());
    }

    #[test]
    fn metadata_without_correlation_id_is_rejected() {
        let raw = r#"{"event_type": "SampleEvent", "metadata": {"version": 1}, "data": {}}"#;
        assert!(EventEnvelope::from_json(raw).unwrap_err().is_serialization());
    }

    #[test]
    fn from_json_rejects_garbage() {
        let err = EventEnvelope::from_json("{not json").unwrap_err();
        assert!(err.is_serialization());
    }

    #[test]
    fn decode_restores_typed_event() {
        let event = sample("typed");
        let envelope = event.to_envelope().unwrap();

        let decoded: SampleEvent = envelope.decode().unwrap();
        assert_eq!(decoded.name, "typed");
        assert_eq!(decoded.count, 3);
        assert_eq!(decoded.metadata(), event.metadata());
    }

    #[test]
    fn decode_rejects_wrong_type() {
        let envelope = sample("typed").to_envelope().unwrap();
        let result: Result<RenamedEvent, _> = envelope.decode();
        assert!(result.unwrap_err().is_serialization());
    }
}
