//! Redis-backed event bus.
//!
//! Every publish goes to two places:
//! - the pub/sub channel `{prefix}channel:{event_type}` for live delivery
//! - the stream `{prefix}stream:{event_type}` as a durable record
//!
//! Only the pub/sub channel drives delivery. Streams are append-only here and
//! exist for replay and inspection by other tools.
//!
//! The command connection is opened lazily and validated with `PING` before
//! each use. A single background listener owns the pub/sub connection and
//! dispatches messages to the handlers registered in this process.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{MultiplexedConnection, PubSubSink, PubSubStream};
use redis::{AsyncCommands, ConnectionAddr, RedisResult};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::dispatch::invoke_handler;
use crate::config::RedisConfig;
use crate::domain::foundation::correlation::{self, with_correlation};
use crate::domain::foundation::{CorrelationContext, ErrorKind, EventBusError, EventEnvelope};
use crate::ports::{same_handler, EventBus, SharedHandler};

/// Field name holding the serialized event in each stream entry.
pub const STREAM_FIELD: &str = "event";

/// Lifecycle of the command connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct ConnectionSlot {
    conn: Option<MultiplexedConnection>,
    // Bumped on every successful connect
    generation: u64,
}

struct Listener {
    sink: PubSubSink,
    task: JoinHandle<()>,
}

/// Handlers by event type, plus the channels the listener is subscribed to.
#[derive(Default)]
struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<SharedHandler>>>,
    channels: RwLock<HashSet<String>>,
}

impl HandlerRegistry {
    /// Returns `false` when the handler was already registered.
    fn add(&self, event_type: &str, handler: SharedHandler) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let entry = handlers.entry(event_type.to_string()).or_default();
        if entry.iter().any(|h| same_handler(h, &handler)) {
            return false;
        }
        entry.push(handler);
        true
    }

    /// Returns `true` when the removal left the type with no handlers.
    fn remove(&self, event_type: &str, handler: &SharedHandler) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = handlers.get_mut(event_type) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|h| !same_handler(h, handler));
        if entry.len() == before {
            return false;
        }
        if entry.is_empty() {
            handlers.remove(event_type);
            return true;
        }
        false
    }

    fn handlers_for(&self, event_type: &str) -> Vec<SharedHandler> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }

    fn handler_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .map_or(0, Vec::len)
    }

    fn is_tracked(&self, channel: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(channel)
    }

    fn track(&self, channel: &str) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string());
    }

    fn untrack(&self, channel: &str) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel);
    }

    fn channels(&self) -> Vec<String> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Turns raw pub/sub messages into handler invocations.
#[derive(Clone)]
struct MessageDispatcher {
    registry: Arc<HandlerRegistry>,
    channel_prefix: String,
}

impl MessageDispatcher {
    /// Decodes one message and runs the matching handlers in registration order.
    ///
    /// Returns how many handlers completed successfully. Undecodable
    /// payloads are logged and dropped.
    async fn handle_message(&self, channel: &str, payload: &str) -> usize {
        let event_type = channel.strip_prefix(&self.channel_prefix).unwrap_or(channel);

        let mut event = match EventEnvelope::from_json(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(channel, error = %e, "Dropping undecodable Redis message");
                return 0;
            }
        };
        if event.event_type.is_empty() {
            event.event_type = event_type.to_string();
        }

        if let Some(id) = event.metadata_correlation_id() {
            if let Err(e) = correlation::set_correlation_id(id) {
                tracing::debug!(error = %e, "Could not restore correlation id");
            }
        }

        let handlers = self.registry.handlers_for(event_type);
        let mut delivered = 0;
        for handler in &handlers {
            if invoke_handler(handler, event.clone()).await {
                delivered += 1;
            }
        }
        delivered
    }
}

async fn listen(mut stream: PubSubStream, dispatcher: MessageDispatcher) {
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name().to_string();
        match msg.get_payload::<String>() {
            Ok(payload) => {
                dispatcher.handle_message(&channel, &payload).await;
            }
            Err(e) => {
                tracing::error!(channel = %channel, error = %e, "Dropping non-text Redis message");
            }
        }
    }
    tracing::warn!("Redis pub/sub stream ended");
}

/// Redis event bus using pub/sub for delivery and streams for persistence.
///
/// # Example
///
/// ```ignore
/// let bus = RedisEventBus::new(RedisConfig::new("redis://localhost:6379/0"))?;
///
/// bus.subscribe_to::<TaskProcessedEvent>(handler).await?;
/// bus.publish_event(&TaskProcessedEvent::new("task-1", "completed")).await?;
///
/// bus.close().await;
/// ```
pub struct RedisEventBus {
    config: RedisConfig,
    client: redis::Client,
    connection: Mutex<ConnectionSlot>,
    // Kept outside the slot lock so readers never wait on a connect
    state: watch::Sender<ConnectionState>,
    registry: Arc<HandlerRegistry>,
    dispatcher: MessageDispatcher,
    listener: Mutex<Option<Listener>>,
}

impl RedisEventBus {
    /// Creates a bus for the given configuration. No connection is opened yet.
    ///
    /// # Errors
    ///
    /// Returns a connection error when the URL cannot be parsed.
    pub fn new(config: RedisConfig) -> Result<Self, EventBusError> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            EventBusError::connection("Invalid Redis connection URL").with_source(e)
        })?;

        let registry = Arc::new(HandlerRegistry::default());
        let dispatcher = MessageDispatcher {
            registry: Arc::clone(&registry),
            channel_prefix: format!("{}channel:", config.key_prefix),
        };

        Ok(Self {
            config,
            client,
            connection: Mutex::new(ConnectionSlot {
                conn: None,
                generation: 0,
            }),
            state: watch::channel(ConnectionState::Disconnected).0,
            registry,
            dispatcher,
            listener: Mutex::new(None),
        })
    }

    /// Creates a bus for `url` with default settings.
    pub fn from_url(url: impl Into<String>) -> Result<Self, EventBusError> {
        Self::new(RedisConfig::new(url))
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    pub fn key_prefix(&self) -> &str {
        &self.config.key_prefix
    }

    /// Pub/sub channel for an event type.
    pub fn channel_name(&self, event_type: &str) -> String {
        format!("{}channel:{}", self.config.key_prefix, event_type)
    }

    /// Stream key for an event type.
    pub fn stream_name(&self, event_type: &str) -> String {
        format!("{}stream:{}", self.config.key_prefix, event_type)
    }

    pub fn host(&self) -> String {
        match &self.client.get_connection_info().addr {
            ConnectionAddr::Tcp(host, _) => host.clone(),
            ConnectionAddr::TcpTls { host, .. } => host.clone(),
            _ => "localhost".to_string(),
        }
    }

    pub fn port(&self) -> u16 {
        match &self.client.get_connection_info().addr {
            ConnectionAddr::Tcp(_, port) => *port,
            ConnectionAddr::TcpTls { port, .. } => *port,
            _ => 6379,
        }
    }

    pub fn db(&self) -> i64 {
        self.client.get_connection_info().redis.db
    }

    /// Current state of the command connection.
    ///
    /// Does not wait on an in-flight connect, so `Connecting` is visible while
    /// one is pending.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every change of [`Self::state`].
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Number of handlers registered in this process for an event type.
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.registry.handler_count(event_type)
    }

    /// Opens the command connection now instead of on first use.
    pub async fn connect(&self) -> Result<(), EventBusError> {
        self.ensure_connection().await.map(|_| ())
    }

    /// Stops the listener and drops both connections.
    ///
    /// Safe to call more than once. Handler registrations are kept, and the
    /// next subscribe restarts the listener on every tracked channel.
    pub async fn close(&self) {
        if let Some(Listener { sink, task }) = self.listener.lock().await.take() {
            task.abort();
            match task.await {
                Err(e) if e.is_panic() => {
                    tracing::warn!(error = %e, "Redis listener panicked before shutdown");
                }
                _ => {}
            }
            drop(sink);
        }

        let mut slot = self.connection.lock().await;
        slot.conn = None;
        self.set_state(ConnectionState::Disconnected);

        tracing::info!(endpoint = %self.endpoint(), "Redis event bus closed");
    }

    fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host(), self.port(), self.db())
    }

    async fn ping(&self, conn: &mut MultiplexedConnection) -> Result<(), EventBusError> {
        let reply: Result<RedisResult<String>, _> =
            timeout(self.config.timeout(), redis::cmd("PING").query_async(conn)).await;

        match reply {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(EventBusError::connection("Redis PING failed").with_source(e)),
            Err(e) => Err(EventBusError::connection("Redis PING timed out").with_source(e)),
        }
    }

    async fn open_connection(&self) -> Result<MultiplexedConnection, EventBusError> {
        let attempts = if self.config.retry_on_timeout { 2 } else { 1 };

        for attempt in 1..=attempts {
            match timeout(
                self.config.timeout(),
                self.client.get_multiplexed_async_connection(),
            )
            .await
            {
                Ok(Ok(mut conn)) => {
                    self.ping(&mut conn).await?;
                    return Ok(conn);
                }
                Ok(Err(e)) => {
                    return Err(EventBusError::connection(format!(
                        "Failed to connect to Redis at {}",
                        self.endpoint()
                    ))
                    .with_source(e));
                }
                Err(_) => {
                    tracing::warn!(attempt, endpoint = %self.endpoint(), "Redis connection attempt timed out");
                }
            }
        }

        Err(EventBusError::connection(format!(
            "Timed out connecting to Redis at {}",
            self.endpoint()
        )))
    }

    /// Returns a live command connection, reconnecting when the probe fails.
    async fn ensure_connection(&self) -> Result<MultiplexedConnection, EventBusError> {
        let (current, seen_generation) = {
            let slot = self.connection.lock().await;
            (slot.conn.clone(), slot.generation)
        };

        if let Some(mut conn) = current {
            match self.ping(&mut conn).await {
                Ok(()) => return Ok(conn),
                Err(e) => {
                    tracing::warn!(error = %e, "Redis connection failed liveness probe");
                }
            }
        }

        let mut slot = self.connection.lock().await;

        // Another caller reconnected while we were probing
        if slot.generation != seen_generation {
            if let Some(conn) = &slot.conn {
                return Ok(conn.clone());
            }
        }

        slot.conn = None;
        self.set_state(ConnectionState::Connecting);

        match self.open_connection().await {
            Ok(conn) => {
                slot.conn = Some(conn.clone());
                slot.generation += 1;
                self.set_state(ConnectionState::Connected);
                tracing::info!(endpoint = %self.endpoint(), "Connected to Redis");
                Ok(conn)
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                tracing::error!(endpoint = %self.endpoint(), error = %e, "Failed to connect to Redis");
                Err(e)
            }
        }
    }

    async fn start_listener(&self) -> Result<Listener, EventBusError> {
        let pubsub = timeout(self.config.timeout(), self.client.get_async_pubsub())
            .await
            .map_err(|e| EventBusError::connection("Timed out opening Redis pub/sub").with_source(e))?
            .map_err(|e| EventBusError::connection("Failed to open Redis pub/sub").with_source(e))?;

        let (mut sink, stream) = pubsub.split();

        for channel in self.registry.channels() {
            sink.subscribe(&channel).await.map_err(|e| {
                EventBusError::subscription(format!("Failed to resubscribe to {}", channel))
                    .with_source(e)
            })?;
        }

        let task = tokio::spawn(with_correlation(
            CorrelationContext::create(None, None),
            listen(stream, self.dispatcher.clone()),
        ));

        tracing::info!(endpoint = %self.endpoint(), "Started Redis listener");
        Ok(Listener { sink, task })
    }

    /// Makes sure the listener is running and subscribed to `channel`.
    async fn listen_on(&self, channel: &str) -> Result<(), EventBusError> {
        let mut guard = self.listener.lock().await;

        let listener = match guard.take() {
            Some(listener) if !listener.task.is_finished() => listener,
            stale => {
                if stale.is_some() {
                    tracing::warn!("Redis listener stopped, restarting");
                }
                self.start_listener().await?
            }
        };
        let listener = guard.insert(listener);

        if !self.registry.is_tracked(channel) {
            listener.sink.subscribe(channel).await.map_err(|e| {
                EventBusError::subscription(format!("Failed to subscribe to {}", channel))
                    .with_source(e)
            })?;
            self.registry.track(channel);
        }
        Ok(())
    }

    #[cfg(test)]
    async fn handle_message(&self, channel: &str, payload: &str) -> usize {
        self.dispatcher.handle_message(channel, payload).await
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), EventBusError> {
        let mut conn = self.ensure_connection().await.map_err(|e| {
            EventBusError::wrap(
                ErrorKind::Publish,
                format!("Failed to publish {}", event.event_type),
                e,
            )
        })?;

        let payload = event.to_json().map_err(|e| {
            EventBusError::wrap(
                ErrorKind::Publish,
                format!("Failed to serialize {}", event.event_type),
                e,
            )
        })?;

        let channel = self.channel_name(&event.event_type);
        let stream = self.stream_name(&event.event_type);

        let published: RedisResult<i64> = conn.publish(&channel, &payload).await;
        let appended: RedisResult<String> = conn
            .xadd(&stream, "*", &[(STREAM_FIELD, payload.as_str())])
            .await;

        if let Err(e) = published {
            return Err(EventBusError::publish(format!("Failed to publish to {}", channel)).with_source(e));
        }
        if let Err(e) = appended {
            return Err(EventBusError::publish(format!("Failed to append to {}", stream)).with_source(e));
        }

        tracing::debug!(
            event_type = %event.event_type,
            event_id = ?event.event_id().map(ToString::to_string),
            channel = %channel,
            "Published event to Redis"
        );
        Ok(())
    }

    async fn subscribe(&self, event_type: &str, handler: SharedHandler) -> Result<(), EventBusError> {
        self.ensure_connection().await.map_err(|e| {
            EventBusError::wrap(
                ErrorKind::Subscription,
                format!("Failed to subscribe to {}", event_type),
                e,
            )
        })?;

        let added = self.registry.add(event_type, Arc::clone(&handler));
        let channel = self.channel_name(event_type);

        if let Err(e) = self.listen_on(&channel).await {
            if added {
                self.registry.remove(event_type, &handler);
            }
            return Err(EventBusError::wrap(
                ErrorKind::Subscription,
                format!("Failed to subscribe to {}", event_type),
                e,
            ));
        }

        tracing::info!(
            event_type,
            handler = handler.name(),
            channel = %channel,
            "Subscribed handler to Redis channel"
        );
        Ok(())
    }

    async fn unsubscribe(&self, event_type: &str, handler: &SharedHandler) -> Result<(), EventBusError> {
        if !self.registry.remove(event_type, handler) {
            return Ok(());
        }

        let channel = self.channel_name(event_type);
        let mut guard = self.listener.lock().await;

        // A concurrent subscribe may have re-registered the type
        if self.registry.handler_count(event_type) > 0 {
            return Ok(());
        }

        if let Some(listener) = guard.as_mut() {
            if self.registry.is_tracked(&channel) {
                listener.sink.unsubscribe(&channel).await.map_err(|e| {
                    EventBusError::subscription(format!("Failed to unsubscribe from {}", channel))
                        .with_source(e)
                })?;
            }
        }
        self.registry.untrack(&channel);

        tracing::info!(event_type, channel = %channel, "Unsubscribed from Redis channel");
        Ok(())
    }

    async fn close(&self) {
        RedisEventBus::close(self).await;
    }
}

impl Drop for RedisEventBus {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.task.abort();
        }
    }
}

impl fmt::Display for RedisEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RedisEventBus(redis_url={}, key_prefix={})",
            self.config.url, self.config.key_prefix
        )
    }
}

impl fmt::Debug for RedisEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisEventBus")
            .field("endpoint", &self.endpoint())
            .field("key_prefix", &self.config.key_prefix)
            .finish_non_exhaustive()
    }
}
