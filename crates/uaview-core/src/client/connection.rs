// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! One client session and its lifecycle.
//!
//! ```text
//!   Idle ──connect──► Connecting ──ok──► Connected ──close──► Closed
//!    ▲                    │                                     ▲
//!    └──────failure───────┘                                     │
//!    └──────────────────────────close───────────────────────────┘
//! ```
//!
//! `connect()` is serialised by an async mutex that is released on every
//! path. A connect on a `Connected` session is a no-op and a failed attempt
//! returns to `Idle`, so callers may retry. `Closed` is terminal.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::poll::{PollLoop, Route, RouteTable};
use crate::client::sink::{ClientEvent, EventSink};
use crate::client::stats::{ConnectionStats, StatsSnapshot};
use crate::client::subscription::Subscription;
use crate::config::{ClientConfig, SubscriptionParameters};
use crate::credentials::Credentials;
use crate::endpoint::Endpoint;
use crate::error::{TimeoutError, UaError, UaResult};
use crate::node::{self, Node, SessionContext};
use crate::transport::{ClientCertificate, ConnectRequest, IdentityToken, UaTransport};
use crate::types::NodeId;

// =============================================================================
// ConnectionState
// =============================================================================

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Constructed; no session.
    #[default]
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// Session established and poll loop running.
    Connected,
    /// Torn down for good.
    Closed,
}

impl ConnectionState {
    /// Returns `true` when connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` when closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ConnectionSettings
// =============================================================================

/// Fields moved out of a builder into a new connection.
pub(crate) struct ConnectionSettings {
    pub(crate) endpoint: Endpoint,
    pub(crate) credentials: Option<Credentials>,
    pub(crate) certificate: Option<ClientCertificate>,
    pub(crate) trust_list: Vec<Vec<u8>>,
    pub(crate) revoked_list: Vec<Vec<u8>>,
}

impl ConnectionSettings {
    fn identity(&self) -> IdentityToken {
        self.credentials
            .as_ref()
            .map(Credentials::identity_token)
            .unwrap_or_default()
    }
}

// =============================================================================
// Connection
// =============================================================================

/// A session with one server endpoint.
///
/// Created through [`ConnectionManager`](crate::client::ConnectionManager)
/// and always handled as `Arc<Connection>`.
pub struct Connection {
    id: u64,
    settings: ConnectionSettings,
    config: ClientConfig,
    transport: Arc<dyn UaTransport>,
    sink: Arc<dyn EventSink>,
    stats: Arc<ConnectionStats>,
    state: RwLock<ConnectionState>,
    connect_lock: tokio::sync::Mutex<()>,
    lifecycle_events: tokio::sync::Mutex<()>,
    shutdown: watch::Sender<bool>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    routes: Arc<RouteTable>,
    next_client_handle: AtomicU32,
    self_ref: Weak<Connection>,
}

impl Connection {
    pub(crate) fn new(
        id: u64,
        config: ClientConfig,
        transport: Arc<dyn UaTransport>,
        settings: ConnectionSettings,
        sink: Arc<dyn EventSink>,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new_cyclic(|self_ref| Self {
            id,
            settings,
            config,
            transport,
            sink,
            stats: Arc::new(ConnectionStats::new()),
            state: RwLock::new(ConnectionState::Idle),
            connect_lock: tokio::sync::Mutex::new(()),
            lifecycle_events: tokio::sync::Mutex::new(()),
            shutdown,
            poll_task: Mutex::new(None),
            routes: Arc::new(RwLock::new(HashMap::new())),
            next_client_handle: AtomicU32::new(1),
            self_ref: self_ref.clone(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Returns `true` when connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Returns the endpoint this connection targets.
    pub fn endpoint(&self) -> &Endpoint {
        &self.settings.endpoint
    }

    /// Returns the endpoint URL. No network access.
    pub fn endpoint_url(&self) -> &str {
        &self.settings.endpoint.url
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn transport(&self) -> &Arc<dyn UaTransport> {
        &self.transport
    }

    #[cfg(test)]
    pub(crate) fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub(crate) fn allocate_client_handle(&self) -> u32 {
        self.next_client_handle.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register_route(&self, client_handle: u32, route: Route) {
        self.routes.write().insert(client_handle, route);
    }

    pub(crate) fn remove_routes(&self, client_handles: &[u32]) {
        let mut routes = self.routes.write();
        for handle in client_handles {
            routes.remove(handle);
        }
    }

    fn session_context(&self) -> SessionContext {
        SessionContext {
            connection_id: self.id,
            transport: Arc::clone(&self.transport),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Moves to `next` unless the connection was closed meanwhile.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.write();
        if state.is_closed() {
            return false;
        }
        *state = next;
        true
    }

    // =========================================================================
    // Connect
    // =========================================================================

    /// Starts connecting in the background and returns immediately.
    ///
    /// The outcome is reported to the sink as `Connected` or
    /// `ConnectFailed`. The handle resolves to the same result as
    /// [`connect`](Self::connect).
    pub fn connect_and_run(&self) -> JoinHandle<UaResult<()>> {
        let this = self.self_ref.upgrade();
        tokio::spawn(async move {
            match this {
                Some(connection) => connection.connect().await,
                None => Err(UaError::closed()),
            }
        })
    }

    /// Connects and starts the poll loop.
    ///
    /// A no-op when already connected.
    pub async fn connect(&self) -> UaResult<()> {
        let _guard = self.connect_lock.lock().await;

        match self.state() {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closed => return Err(UaError::closed()),
            ConnectionState::Idle | ConnectionState::Connecting => {}
        }
        if !self.transition(ConnectionState::Connecting) {
            return Err(UaError::closed());
        }

        info!(
            connection_id = self.id,
            endpoint = %self.settings.endpoint,
            "Connecting"
        );

        if let Err(e) = self.handshake().await {
            self.transition(ConnectionState::Idle);
            e.log("connect");
            self.sink
                .on_event(ClientEvent::ConnectFailed {
                    connection_id: self.id,
                    reason: e.to_string(),
                })
                .await;
            return Err(e);
        }

        let _events = self.lifecycle_events.lock().await;
        if !self.enter_connected() {
            // Closed while the handshake was in flight.
            if let Err(e) = self.transport.disconnect().await {
                e.log("disconnect after close");
            }
            return Err(UaError::closed());
        }

        info!(connection_id = self.id, endpoint = %self.endpoint_url(), "Connected");
        self.sink
            .on_event(ClientEvent::Connected {
                connection_id: self.id,
                endpoint_url: self.endpoint_url().to_string(),
            })
            .await;
        Ok(())
    }

    /// Moves to `Connected` and starts the poll loop in one step, so close()
    /// either sees neither or finds the poll task to stop.
    fn enter_connected(&self) -> bool {
        let mut state = self.state.write();
        if state.is_closed() {
            return false;
        }
        *state = ConnectionState::Connected;
        self.start_poll_loop();
        true
    }

    async fn handshake(&self) -> UaResult<()> {
        self.transport
            .set_security_mode(self.settings.endpoint.security_mode)
            .await?;

        let identity = self.settings.identity();
        debug!(
            connection_id = self.id,
            anonymous = identity.is_anonymous(),
            "Activating session"
        );

        let request = ConnectRequest {
            endpoint: self.settings.endpoint.clone(),
            identity,
            certificate: self.settings.certificate.clone(),
            trust_list: self.settings.trust_list.clone(),
            revoked_list: self.settings.revoked_list.clone(),
        };

        let timeout = self.config.connect_timeout;
        match tokio::time::timeout(timeout, self.transport.connect(&request)).await {
            Ok(result) => result,
            Err(_) => Err(UaError::timeout(TimeoutError::new("connect", timeout))),
        }
    }

    fn start_poll_loop(&self) {
        let poll = PollLoop {
            connection_id: self.id,
            transport: Arc::clone(&self.transport),
            routes: Arc::clone(&self.routes),
            sink: Arc::clone(&self.sink),
            stats: Arc::clone(&self.stats),
            interval: self.config.poll_interval,
            shutdown: self.shutdown.subscribe(),
        };
        let handle = tokio::spawn(poll.run());
        if let Some(previous) = self.poll_task.lock().replace(handle) {
            previous.abort();
        }
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Returns the root folder node.
    pub async fn root_node(&self) -> Option<Node> {
        self.node(NodeId::root_folder()).await
    }

    /// Classifies `node_id` with one round trip and wraps it.
    ///
    /// Returns `None` for unknown ids and when not connected; the cause is
    /// logged. Use [`try_node`](Self::try_node) to receive it instead.
    pub async fn node(&self, node_id: NodeId) -> Option<Node> {
        match self.try_node(node_id).await {
            Ok(node) => node,
            Err(e) => {
                e.log("node lookup");
                None
            }
        }
    }

    /// Like [`node`](Self::node) but surfaces transport errors.
    pub async fn try_node(&self, node_id: NodeId) -> UaResult<Option<Node>> {
        self.ensure_connected()?;
        node::resolve(&self.session_context(), node_id).await
    }

    fn ensure_connected(&self) -> UaResult<()> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Closed => Err(UaError::closed()),
            ConnectionState::Idle | ConnectionState::Connecting => Err(UaError::not_connected()),
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Creates a subscription and monitors `attribute_ids` of `node` on it.
    ///
    /// Uses the configured default subscription and monitoring parameters.
    pub async fn create_subscription(
        &self,
        node: &Node,
        attribute_ids: &[u32],
    ) -> UaResult<Subscription> {
        let subscription = self
            .create_empty_subscription(self.config.subscription.clone())
            .await?;
        for &attribute_id in attribute_ids {
            subscription.subscribe_data_changed(node, attribute_id).await?;
        }
        Ok(subscription)
    }

    /// Creates a subscription with no monitored items.
    pub async fn create_empty_subscription(
        &self,
        parameters: SubscriptionParameters,
    ) -> UaResult<Subscription> {
        self.ensure_connected()?;
        parameters.validate()?;

        let subscription_id = self.transport.create_subscription(&parameters).await?;
        info!(
            connection_id = self.id,
            subscription_id,
            interval = ?parameters.publishing_interval,
            "Subscription created"
        );

        Ok(Subscription::new(
            subscription_id,
            self.self_ref.clone(),
            parameters,
            self.config.monitoring.clone(),
            self.config.event_channel_capacity,
        ))
    }

    // =========================================================================
    // Close
    // =========================================================================

    /// Stops the poll loop, closes the session and emits `Disconnected`.
    ///
    /// Idempotent. When this returns no further cache updates or events
    /// are produced by this connection.
    pub async fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), ConnectionState::Closed);
        if previous.is_closed() {
            return;
        }

        // Stored even when no poll loop has subscribed yet.
        self.shutdown.send_replace(true);
        let handle = self.poll_task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!(connection_id = self.id, "Poll loop panicked");
                }
            }
        }

        if previous != ConnectionState::Idle {
            if let Err(e) = self.transport.disconnect().await {
                e.log("close");
            }
        }
        self.routes.write().clear();

        info!(connection_id = self.id, previous = %previous, "Connection closed");
        let _events = self.lifecycle_events.lock().await;
        self.sink
            .on_event(ClientEvent::Disconnected { connection_id: self.id })
            .await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(handle) = self.poll_task.get_mut().take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.settings.endpoint.url)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sink::ChannelSink;
    use crate::mock::MockServer;
    use crate::types::AttributeId;
    use crate::variant::DataValue;
    use std::time::Duration;

    fn connection(server: &MockServer) -> (Arc<Connection>, tokio::sync::mpsc::Receiver<ClientEvent>) {
        let (sink, rx) = ChannelSink::with_channel(32);
        (connection_with_sink(server, Arc::new(sink)), rx)
    }

    fn connection_with_sink(server: &MockServer, sink: Arc<dyn EventSink>) -> Arc<Connection> {
        let config = ClientConfig::builder()
            .poll_interval(Duration::from_millis(10))
            .build()
            .unwrap();
        let settings = ConnectionSettings {
            endpoint: Endpoint::unsecured(server.url()),
            credentials: None,
            certificate: None,
            trust_list: Vec::new(),
            revoked_list: Vec::new(),
        };
        Connection::new(1, config, server.transport(), settings, sink)
    }

    /// Sink whose data-change handling never finishes.
    struct StallingSink;

    #[async_trait::async_trait]
    impl EventSink for StallingSink {
        async fn on_event(&self, event: ClientEvent) {
            if matches!(event, ClientEvent::DataChanged(_)) {
                std::future::pending::<()>().await;
            }
        }
    }

    async fn wait_for_notifications(conn: &Connection, expected: u64) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while conn.stats().notifications < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_connect_emits_connected() {
        let server = MockServer::with_standard_nodes();
        let (conn, mut rx) = connection(&server);
        assert_eq!(conn.state(), ConnectionState::Idle);

        conn.connect().await.unwrap();
        assert!(conn.is_connected());
        assert!(matches!(rx.recv().await, Some(ClientEvent::Connected { connection_id: 1, .. })));

        // Second connect is a no-op.
        conn.connect().await.unwrap();
        assert_eq!(server.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_returns_to_idle() {
        let server = MockServer::with_standard_nodes();
        server.fail_next_connect("refused");
        let (conn, mut rx) = connection(&server);

        assert!(conn.connect().await.is_err());
        assert_eq!(conn.state(), ConnectionState::Idle);
        assert!(matches!(rx.recv().await, Some(ClientEvent::ConnectFailed { .. })));

        conn.connect().await.unwrap();
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_node_lookup_requires_session() {
        let server = MockServer::with_standard_nodes();
        let (conn, _rx) = connection(&server);
        assert!(conn.root_node().await.is_none());
        assert_eq!(server.read_count(), 0);

        conn.connect().await.unwrap();
        let root = conn.root_node().await.unwrap();
        assert_eq!(root.node_id(), &NodeId::root_folder());
        assert_eq!(root.connection_id(), 1);
    }

    #[tokio::test]
    async fn test_close_is_terminal_and_idempotent() {
        let server = MockServer::with_standard_nodes();
        let (conn, mut rx) = connection(&server);
        conn.connect().await.unwrap();
        let _ = rx.recv().await;

        conn.close().await;
        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!server.is_connected());
        assert!(matches!(rx.recv().await, Some(ClientEvent::Disconnected { connection_id: 1 })));
        assert!(conn.connect().await.is_err());
        assert!(conn.root_node().await.is_none());
    }

    #[tokio::test]
    async fn test_subscription_routes_notifications() {
        let server = MockServer::with_standard_nodes();
        let (conn, mut rx) = connection(&server);
        conn.connect().await.unwrap();
        let _ = rx.recv().await;

        let root = conn.root_node().await.unwrap();
        let subscription = conn
            .create_subscription(&root, &[AttributeId::DisplayName.value()])
            .await
            .unwrap();
        assert_eq!(subscription.monitored_items().len(), 1);

        server.push_data_change(
            &NodeId::root_folder(),
            AttributeId::DisplayName.value(),
            DataValue::new(crate::types::LocalizedText::from("Renamed")),
        );

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, ClientEvent::DataChanged(_)));

        let reads = server.read_count();
        let name = root.display_name().await.unwrap().into_option().unwrap();
        assert_eq!(name.text, "Renamed");
        assert_eq!(server.read_count(), reads);
    }

    #[tokio::test]
    async fn test_close_completes_behind_stalled_sink() {
        let server = MockServer::with_standard_nodes();
        let conn = connection_with_sink(&server, Arc::new(StallingSink));
        conn.connect().await.unwrap();

        let root = conn.root_node().await.unwrap();
        let _subscription = conn
            .create_subscription(&root, &[AttributeId::DisplayName.value()])
            .await
            .unwrap();
        server.push_data_change(
            &NodeId::root_folder(),
            AttributeId::DisplayName.value(),
            DataValue::new(crate::types::LocalizedText::from("Stuck")),
        );
        wait_for_notifications(&conn, 1).await;

        tokio::time::timeout(Duration::from_secs(2), conn.close())
            .await
            .expect("close must not wait on the sink");
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!server.is_connected());
    }

    #[tokio::test]
    async fn test_close_during_connect_emits_only_disconnected() {
        let server = MockServer::with_standard_nodes();
        server.delay_connect(Duration::from_millis(100));
        let (conn, mut rx) = connection(&server);

        let pending = conn.connect_and_run();
        tokio::time::sleep(Duration::from_millis(20)).await;
        conn.close().await;

        assert!(pending.await.unwrap().is_err());
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!server.is_connected());

        assert!(matches!(rx.recv().await, Some(ClientEvent::Disconnected { connection_id: 1 })));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        let polls = server.poll_count();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.poll_count(), polls);
    }
}
