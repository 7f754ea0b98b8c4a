//! Hub connection lifecycle and invocations.
//!
//! One background task owns the WebSocket. It connects, performs the
//! handshake, then loops over inbound frames, outbound calls and the
//! keep-alive ping until the connection is lost, at which point it
//! reconnects on the [`ReconnectPolicy`] schedule. Callers observe the
//! connection through [`ConnectionState`] and receive [`PushEvent`]s over a
//! broadcast channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use super::events::PushEvent;
use super::protocol::{self, HubMessage};
use super::retry::ReconnectPolicy;
use crate::error::HubError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Supplies the current access token on every connection attempt.
pub type TokenFactory = Arc<dyn Fn() -> Option<SecretString> + Send + Sync>;

/// Client keep-alive ping interval.
const PING_INTERVAL: Duration = Duration::from_secs(15);
/// Silence after which the connection is treated as lost.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
/// How long the server gets to answer the handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long the server gets to complete an invocation.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);
/// Capacity of the push event channel.
const EVENT_CAPACITY: usize = 64;

/// Hub method names the client invokes.
mod method {
    pub const SUBSCRIBE_ORDER: &str = "SubscribeToOrder";
    pub const UNSUBSCRIBE_ORDER: &str = "UnsubscribeFromOrder";
    pub const SUBSCRIBE_SHIPMENT: &str = "SubscribeToShipment";
    pub const UNSUBSCRIBE_SHIPMENT: &str = "UnsubscribeFromShipment";
    pub const SUBSCRIBE_PRODUCT_STOCK: &str = "SubscribeToProductStock";
    pub const UNSUBSCRIBE_PRODUCT_STOCK: &str = "UnsubscribeFromProductStock";
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not started, stopped, or the initial connect failed (offline mode).
    #[default]
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    Connected,
    /// Connection lost; retrying.
    Reconnecting {
        /// Attempt number, starting at 1.
        attempt: u32,
    },
}

impl ConnectionState {
    /// Whether the state may still turn into `Connected` on its own.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting { .. })
    }
}

/// Why a connected session ended.
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    Lost(String),
    Closed {
        error: Option<String>,
        allow_reconnect: bool,
    },
}

type Completion = oneshot::Sender<Result<Option<Value>, HubError>>;

// =============================================================================
// HubClient
// =============================================================================

/// Client for the real-time notification hub.
///
/// Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct HubClient {
    inner: Arc<HubInner>,
}

struct HubInner {
    /// Distinguishes clients in logs.
    id: Uuid,
    url: Url,
    token_factory: TokenFactory,
    invoke_timeout: Duration,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<PushEvent>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: Mutex<HashMap<String, Completion>>,
    next_invocation_id: AtomicU64,
    running: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Stops the hub when dropped.
#[must_use = "the hub stops when the guard is dropped"]
#[derive(Debug)]
pub struct HubGuard {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl HubGuard {
    /// Stop the hub and wait for the connection task to finish.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for HubGuard {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HubClient {
    /// Create a client for the hub at `url`. Nothing connects until
    /// [`start`](Self::start).
    #[must_use]
    pub fn new(url: Url, token_factory: TokenFactory, invoke_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(HubInner {
                id: Uuid::new_v4(),
                url,
                token_factory,
                invoke_timeout,
                state,
                events,
                outgoing: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                next_invocation_id: AtomicU64::new(1),
                running: Mutex::new(None),
            }),
        }
    }

    /// Start the connection task, replacing any previous one.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self) -> HubGuard {
        let shutdown = CancellationToken::new();
        if let Some(previous) = lock(&self.inner.running).replace(shutdown.clone()) {
            previous.cancel();
        }
        let span = info_span!("hub", id = %self.inner.id);
        let task = tokio::spawn(Arc::clone(&self.inner).run(shutdown.clone()).instrument(span));
        HubGuard {
            shutdown,
            task: Some(task),
        }
    }

    /// Stop the connection task, if running.
    pub fn stop(&self) {
        if let Some(running) = lock(&self.inner.running).take() {
            running.cancel();
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Receive push events.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<PushEvent> {
        self.inner.events.subscribe()
    }

    /// Call a hub method and wait for its completion.
    ///
    /// While the connection is being established this waits up to the
    /// configured invoke timeout for it to settle.
    ///
    /// # Errors
    ///
    /// - `HubError::NotConnected` if the hub is offline
    /// - `HubError::ConnectTimeout` if the connection did not settle in time
    /// - `HubError::ConnectionLost` if the connection dropped mid-call
    /// - `HubError::Invocation` if the server returned an error
    pub async fn invoke(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Option<Value>, HubError> {
        self.wait_until_connected().await?;

        let id = self
            .inner
            .next_invocation_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        let frame = protocol::encode_invocation(Some(&id), method, &arguments)?;

        let (tx, rx) = oneshot::channel();
        lock(&self.inner.pending).insert(id.clone(), tx);

        let sent = lock(&self.inner.outgoing)
            .as_ref()
            .is_some_and(|out| out.send(frame).is_ok());
        if !sent {
            lock(&self.inner.pending).remove(&id);
            return Err(HubError::ConnectionLost);
        }
        debug!(method, invocation_id = %id, "Hub invocation sent");

        match tokio::time::timeout(COMPLETION_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(HubError::ConnectionLost),
            Err(_) => {
                lock(&self.inner.pending).remove(&id);
                Err(HubError::InvocationTimeout(method.to_string()))
            }
        }
    }

    async fn wait_until_connected(&self) -> Result<(), HubError> {
        let mut rx = self.inner.state.subscribe();
        let current = *rx.borrow_and_update();
        match current {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Disconnected => return Err(HubError::NotConnected),
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. } => {}
        }

        let settled = tokio::time::timeout(self.inner.invoke_timeout, async {
            rx.wait_for(|s| !s.is_pending())
                .await
                .map(|s| *s == ConnectionState::Connected)
        })
        .await;
        match settled {
            Ok(Ok(true)) => Ok(()),
            Ok(_) => Err(HubError::NotConnected),
            Err(_) => Err(HubError::ConnectTimeout),
        }
    }

    /// Receive status updates for an order.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn subscribe_order(&self, order_id: &str) -> Result<(), HubError> {
        self.invoke(method::SUBSCRIBE_ORDER, vec![Value::from(order_id)])
            .await
            .map(drop)
    }

    /// Stop receiving status updates for an order.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn unsubscribe_order(&self, order_id: &str) -> Result<(), HubError> {
        self.invoke(method::UNSUBSCRIBE_ORDER, vec![Value::from(order_id)])
            .await
            .map(drop)
    }

    /// Receive tracking updates for a shipment.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn subscribe_shipment(&self, shipment_id: &str) -> Result<(), HubError> {
        self.invoke(method::SUBSCRIBE_SHIPMENT, vec![Value::from(shipment_id)])
            .await
            .map(drop)
    }

    /// Stop receiving tracking updates for a shipment.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn unsubscribe_shipment(&self, shipment_id: &str) -> Result<(), HubError> {
        self.invoke(method::UNSUBSCRIBE_SHIPMENT, vec![Value::from(shipment_id)])
            .await
            .map(drop)
    }

    /// Get notified when a product variant is back in stock.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn subscribe_product_stock(
        &self,
        product_id: &str,
        color: &str,
        size: &str,
    ) -> Result<(), HubError> {
        self.invoke(method::SUBSCRIBE_PRODUCT_STOCK, stock_arguments(product_id, color, size))
            .await
            .map(drop)
    }

    /// Stop back-in-stock notifications for a product variant.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke).
    pub async fn unsubscribe_product_stock(
        &self,
        product_id: &str,
        color: &str,
        size: &str,
    ) -> Result<(), HubError> {
        self.invoke(
            method::UNSUBSCRIBE_PRODUCT_STOCK,
            stock_arguments(product_id, color, size),
        )
        .await
        .map(drop)
    }
}

fn stock_arguments(product_id: &str, color: &str, size: &str) -> Vec<Value> {
    vec![
        Value::from(product_id),
        Value::from(color),
        Value::from(size),
    ]
}

// =============================================================================
// Connection Task
// =============================================================================

impl HubInner {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(?previous, ?state, "Hub connection state changed");
        }
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        self.set_state(ConnectionState::Connecting);
        let first = tokio::select! {
            () = shutdown.cancelled() => None,
            result = self.connect() => Some(result),
        };
        let (mut ws, mut leftover) = match first {
            Some(Ok(connection)) => connection,
            Some(Err(e)) => {
                warn!(error = %e, url = %self.url, "Hub unavailable, continuing offline");
                self.set_state(ConnectionState::Disconnected);
                return;
            }
            None => {
                self.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        let mut policy = ReconnectPolicy::default();
        loop {
            self.set_state(ConnectionState::Connected);
            info!(url = %self.url, "Hub connected");

            let connected_at = Instant::now();
            let end = self.session(ws, &leftover, &shutdown).await;
            policy.session_ended(connected_at.elapsed());
            self.fail_pending();
            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Closed {
                    error,
                    allow_reconnect: false,
                } => {
                    warn!(?error, "Hub closed the connection");
                    break;
                }
                SessionEnd::Closed { error, .. } => {
                    info!(?error, "Hub closed the connection, reconnecting");
                }
                SessionEnd::Lost(reason) => {
                    warn!(%reason, "Hub connection lost, reconnecting");
                }
            }

            match self.reconnect(&mut policy, &shutdown).await {
                Some(connection) => (ws, leftover) = connection,
                None => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!("Hub stopped");
    }

    /// Retry until connected or shut down.
    async fn reconnect(
        &self,
        policy: &mut ReconnectPolicy,
        shutdown: &CancellationToken,
    ) -> Option<(WsStream, String)> {
        loop {
            let delay = policy.next_delay();
            self.set_state(ConnectionState::Reconnecting {
                attempt: policy.attempt(),
            });

            tokio::select! {
                () = shutdown.cancelled() => return None,
                () = tokio::time::sleep(delay) => {}
            }
            let result = tokio::select! {
                () = shutdown.cancelled() => return None,
                result = self.connect() => result,
            };
            match result {
                Ok(connection) => return Some(connection),
                Err(e) => warn!(
                    attempt = policy.attempt(),
                    error = %e,
                    "Hub reconnect failed"
                ),
            }
        }
    }

    /// Open the WebSocket and complete the handshake. Returns the stream and
    /// any frames that arrived with the handshake response.
    async fn connect(&self) -> Result<(WsStream, String), HubError> {
        let mut url = self.url.clone();
        if let Some(token) = (self.token_factory)() {
            url.query_pairs_mut()
                .append_pair("access_token", token.expose_secret());
        }

        let (mut ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        ws.send(Message::Text(protocol::handshake_request()?.into()))
            .await?;

        let reply = tokio::time::timeout(HANDSHAKE_TIMEOUT, ws.next())
            .await
            .map_err(|_| HubError::Handshake("no response".to_string()))?;
        match reply {
            Some(Ok(Message::Text(text))) => {
                let rest = protocol::parse_handshake(&text)?.to_string();
                Ok((ws, rest))
            }
            Some(Ok(other)) => Err(HubError::Handshake(format!(
                "unexpected handshake frame: {other:?}"
            ))),
            Some(Err(e)) => Err(e.into()),
            None => Err(HubError::ConnectionLost),
        }
    }

    /// Pump one connected session until it ends.
    async fn session(
        &self,
        ws: WsStream,
        leftover: &str,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        *lock(&self.outgoing) = Some(tx);

        if let Some(end) = self.handle_text(leftover) {
            *lock(&self.outgoing) = None;
            return end;
        }

        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await;
        let idle = tokio::time::sleep(IDLE_TIMEOUT);
        tokio::pin!(idle);

        let end = loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    let _ = sink.close().await;
                    break SessionEnd::Shutdown;
                }

                () = &mut idle => {
                    break SessionEnd::Lost("no frames within the idle timeout".to_string());
                }

                _ = ping.tick() => {
                    let frame = match protocol::encode_ping() {
                        Ok(frame) => frame,
                        Err(e) => break SessionEnd::Lost(e.to_string()),
                    };
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        break SessionEnd::Lost(format!("ping failed: {e}"));
                    }
                }

                Some(frame) = rx.recv() => {
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        break SessionEnd::Lost(format!("send failed: {e}"));
                    }
                }

                message = stream.next() => {
                    idle.as_mut().reset(Instant::now() + IDLE_TIMEOUT);
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(end) = self.handle_text(&text) {
                                break end;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            break SessionEnd::Lost("closed by peer".to_string());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break SessionEnd::Lost(e.to_string()),
                    }
                }
            }
        };

        *lock(&self.outgoing) = None;
        end
    }

    /// Dispatch every frame in a transport message.
    fn handle_text(&self, text: &str) -> Option<SessionEnd> {
        let messages = match protocol::parse_messages(text) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Dropping malformed hub message");
                return None;
            }
        };

        for message in messages {
            match message {
                HubMessage::Invocation {
                    target, arguments, ..
                } => match PushEvent::decode(&target, &arguments) {
                    Ok(Some(event)) => {
                        let _ = self.events.send(event);
                    }
                    Ok(None) => debug!(%target, "Ignoring unknown hub target"),
                    Err(e) => warn!(%target, error = %e, "Dropping malformed hub event"),
                },
                HubMessage::Completion {
                    invocation_id,
                    result,
                    error,
                } => {
                    let Some(tx) = lock(&self.pending).remove(&invocation_id) else {
                        debug!(%invocation_id, "Completion for unknown invocation");
                        continue;
                    };
                    let outcome = error.map_or(Ok(result), |e| Err(HubError::Invocation(e)));
                    let _ = tx.send(outcome);
                }
                HubMessage::Ping => {}
                HubMessage::Close {
                    error,
                    allow_reconnect,
                } => {
                    return Some(SessionEnd::Closed {
                        error,
                        allow_reconnect,
                    });
                }
                HubMessage::Other(kind) => debug!(kind, "Ignoring hub message type"),
            }
        }
        None
    }

    /// Fail every outstanding invocation.
    fn fail_pending(&self) {
        let pending = std::mem::take(&mut *lock(&self.pending));
        for (_, tx) in pending {
            let _ = tx.send(Err(HubError::ConnectionLost));
        }
    }
}
