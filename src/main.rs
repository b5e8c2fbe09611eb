//! Agent events smoke check.
//!
//! Builds the configured bus, subscribes a handler, publishes one
//! `TaskProcessedEvent` under a fresh correlation id and reports whether it
//! came back.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use agent_events::adapters::events::{async_handler_fn, build_event_bus};
use agent_events::config::AppConfig;
use agent_events::domain::agent::TaskProcessedEvent;
use agent_events::domain::foundation::correlation::{self, with_correlation};
use agent_events::domain::foundation::{CorrelationContext, HandlerError};
use agent_events::ports::{EventBusExt, SharedHandler};
use agent_events::telemetry::init_tracing;
use tokio::sync::mpsc;

type Delivery = (String, String);

/// Forwards each delivered task id with the correlation id seen by the handler.
fn smoke_handler(tx: mpsc::UnboundedSender<Delivery>) -> SharedHandler {
    async_handler_fn("SmokeCheck", move |event| {
        let tx = tx.clone();
        async move {
            let task: TaskProcessedEvent = event.decode()?;
            tx.send((task.task_id, correlation::correlation_id()))
                .map_err(|_| HandlerError::new("smoke check receiver dropped"))?;
            Ok::<(), HandlerError>(())
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.logging);

    tracing::info!(backend = ?config.event_bus.backend, "Starting event bus smoke check");

    let bus = build_event_bus(&config)?;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handler = smoke_handler(tx);
    bus.subscribe_to::<TaskProcessedEvent>(Arc::clone(&handler)).await?;

    let context = CorrelationContext::create(None, None);
    let expected = context.correlation_id.clone();
    with_correlation(context, async {
        bus.publish_event(&TaskProcessedEvent::new("smoke-check", "completed"))
            .await
    })
    .await?;

    let outcome = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;

    bus.unsubscribe_from::<TaskProcessedEvent>(&handler).await?;
    bus.close().await;

    match outcome {
        Ok(Some((task_id, correlation_id))) if correlation_id == expected => {
            tracing::info!(task_id = %task_id, correlation_id = %correlation_id, "Event delivered");
            Ok(())
        }
        Ok(Some((_, correlation_id))) => {
            Err(format!("correlation id mismatch: expected {expected}, got {correlation_id}").into())
        }
        _ => Err("event was not delivered within 5 seconds".into()),
    }
}
