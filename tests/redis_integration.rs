//! Integration tests for the Redis event bus.
//!
//! These need a running Redis server and are ignored by default:
//!
//! ```text
//! AGENT_EVENTS_TEST_REDIS_URL=redis://localhost:6379/15 cargo test -- --ignored
//! ```
//!
//! Each test uses its own key prefix so runs never see each other's traffic.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use redis::streams::StreamRangeReply;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use uuid::Uuid;

use agent_events::adapters::events::{async_handler_fn, handler_fn, ConnectionState, STREAM_FIELD};
use agent_events::adapters::RedisEventBus;
use agent_events::config::RedisConfig;
use agent_events::domain::agent::TaskProcessedEvent;
use agent_events::domain::foundation::correlation::{self, with_correlation, CorrelationContext};
use agent_events::domain::foundation::{DomainEvent, EventEnvelope, HandlerError};
use agent_events::ports::{EventBus, EventBusExt, SharedHandler};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Test Infrastructure
// =============================================================================

fn redis_url() -> String {
    std::env::var("AGENT_EVENTS_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://localhost:6379/15".to_string())
}

fn test_bus() -> RedisEventBus {
    let prefix = format!("test-{}:", Uuid::new_v4());
    RedisEventBus::new(RedisConfig::new(redis_url()).with_key_prefix(prefix)).unwrap()
}

/// Handler that forwards every envelope and the correlation id it ran under
fn forwarding_handler(name: &str) -> (SharedHandler, mpsc::UnboundedReceiver<(EventEnvelope, String)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = handler_fn(name, move |event| {
        let _ = tx.send((event.clone(), correlation::correlation_id()));
        Ok(())
    });
    (handler, rx)
}

async fn next_delivery(
    rx: &mut mpsc::UnboundedReceiver<(EventEnvelope, String)>,
) -> Option<(EventEnvelope, String)> {
    tokio::time::timeout(DELIVERY_TIMEOUT, rx.recv()).await.ok().flatten()
}

async fn stream_len(bus: &RedisEventBus, event_type: &str) -> usize {
    let client = redis::Client::open(redis_url()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    redis::cmd("XLEN")
        .arg(bus.stream_name(event_type))
        .query_async(&mut conn)
        .await
        .unwrap()
}

async fn delete_streams(bus: &RedisEventBus, event_types: &[&str]) {
    let client = redis::Client::open(redis_url()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    for event_type in event_types {
        let _: () = redis::cmd("DEL")
            .arg(bus.stream_name(event_type))
            .query_async(&mut conn)
            .await
            .unwrap();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn connect_reports_connected_state() {
    let bus = test_bus();
    bus.connect().await.unwrap();
    assert_eq!(bus.state(), ConnectionState::Connected);

    bus.close().await;
    assert_eq!(bus.state(), ConnectionState::Disconnected);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn publish_delivers_with_correlation_and_appends_to_stream() {
    let bus = test_bus();
    let (handler, mut rx) = forwarding_handler("Forwarder");
    bus.subscribe_to::<TaskProcessedEvent>(handler).await.unwrap();

    let event = with_correlation(CorrelationContext::new("abc-123"), async {
        let event = TaskProcessedEvent::new("task-1", "completed");
        bus.publish_event(&event).await.unwrap();
        event
    })
    .await;

    let (received, seen_correlation) = next_delivery(&mut rx).await.expect("event not delivered");
    let decoded: TaskProcessedEvent = received.decode().unwrap();
    assert_eq!(decoded, event);
    assert_eq!(decoded.correlation_id(), "abc-123");
    assert_eq!(seen_correlation, "abc-123");

    assert_eq!(stream_len(&bus, "TaskProcessedEvent").await, 1);

    bus.close().await;
    delete_streams(&bus, &["TaskProcessedEvent"]).await;
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn stream_entries_hold_the_wire_document() {
    let bus = test_bus();
    let event = TaskProcessedEvent::new("task-9", "archived");
    bus.publish_event(&event).await.unwrap();

    let client = redis::Client::open(redis_url()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let reply: StreamRangeReply = conn
        .xrange_all(bus.stream_name("TaskProcessedEvent"))
        .await
        .unwrap();

    assert_eq!(reply.ids.len(), 1);
    let raw: String = reply.ids[0].get(STREAM_FIELD).expect("missing event field");
    let envelope = EventEnvelope::from_json(&raw).unwrap();
    assert_eq!(envelope.event_id(), Some(event.event_id()));

    bus.close().await;
    delete_streams(&bus, &["TaskProcessedEvent"]).await;
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn concurrent_publishes_are_all_delivered() {
    let bus = Arc::new(test_bus());
    let (handler, mut rx) = forwarding_handler("Forwarder");
    bus.subscribe_to::<TaskProcessedEvent>(handler).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..5 {
        let bus = bus.clone();
        tasks.push(tokio::spawn(with_correlation(
            CorrelationContext::new(format!("request-{i}")),
            async move {
                bus.publish_event(&TaskProcessedEvent::new(format!("task-{i}"), "completed"))
                    .await
                    .unwrap();
            },
        )));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut seen = HashSet::new();
    for _ in 0..5 {
        let (envelope, correlation_id) = next_delivery(&mut rx).await.expect("missing delivery");
        let task: TaskProcessedEvent = envelope.decode().unwrap();
        assert_eq!(task.correlation_id(), correlation_id);
        seen.insert(task.task_id);
    }

    let expected: HashSet<String> = (0..5).map(|i| format!("task-{i}")).collect();
    assert_eq!(seen, expected);

    bus.close().await;
    delete_streams(&bus, &["TaskProcessedEvent"]).await;
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn unsubscribed_handler_stops_receiving() {
    let bus = test_bus();
    let (handler, mut rx) = forwarding_handler("Forwarder");
    bus.subscribe_to::<TaskProcessedEvent>(handler.clone())
        .await
        .unwrap();

    bus.publish_event(&TaskProcessedEvent::new("task-1", "started"))
        .await
        .unwrap();
    assert!(next_delivery(&mut rx).await.is_some());

    bus.unsubscribe_from::<TaskProcessedEvent>(&handler)
        .await
        .unwrap();
    bus.publish_event(&TaskProcessedEvent::new("task-1", "completed"))
        .await
        .unwrap();

    let late = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(late.is_err() || late.unwrap().is_none());
    assert_eq!(stream_len(&bus, "TaskProcessedEvent").await, 2);

    bus.close().await;
    delete_streams(&bus, &["TaskProcessedEvent"]).await;
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn failing_handler_does_not_block_delivery() {
    let bus = test_bus();
    let broken = async_handler_fn("Broken", |_| async {
        Err::<(), _>(HandlerError::new("downstream unavailable"))
    });
    let (healthy, mut rx) = forwarding_handler("Healthy");

    bus.subscribe_to::<TaskProcessedEvent>(broken).await.unwrap();
    bus.subscribe_to::<TaskProcessedEvent>(healthy).await.unwrap();

    bus.publish_event(&TaskProcessedEvent::new("task-1", "failed"))
        .await
        .unwrap();

    assert!(next_delivery(&mut rx).await.is_some());

    bus.close().await;
    delete_streams(&bus, &["TaskProcessedEvent"]).await;
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn nothing_is_delivered_after_close() {
    let bus = test_bus();
    let (handler, mut rx) = forwarding_handler("Forwarder");
    bus.subscribe_to::<TaskProcessedEvent>(handler).await.unwrap();
    bus.close().await;
    bus.close().await;

    // Publishing reconnects the command connection but not the listener
    bus.publish_event(&TaskProcessedEvent::new("task-1", "completed"))
        .await
        .unwrap();

    let late = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(late.is_err() || late.unwrap().is_none());

    bus.close().await;
    delete_streams(&bus, &["TaskProcessedEvent"]).await;
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn buses_sharing_a_prefix_see_each_others_events() {
    let prefix = format!("test-{}:", Uuid::new_v4());
    let publisher =
        RedisEventBus::new(RedisConfig::new(redis_url()).with_key_prefix(prefix.clone())).unwrap();
    let consumer = RedisEventBus::new(RedisConfig::new(redis_url()).with_key_prefix(prefix)).unwrap();

    let (handler, mut rx) = forwarding_handler("Consumer");
    consumer
        .subscribe("TaskProcessedEvent", handler)
        .await
        .unwrap();

    publisher
        .publish_event(&TaskProcessedEvent::new("task-x", "completed"))
        .await
        .unwrap();

    let (envelope, _) = next_delivery(&mut rx).await.expect("event not delivered");
    assert_eq!(envelope.event_type, "TaskProcessedEvent");

    publisher.close().await;
    consumer.close().await;
    delete_streams(&publisher, &["TaskProcessedEvent"]).await;
}
