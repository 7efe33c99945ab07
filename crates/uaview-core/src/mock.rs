// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory scripted server for tests.
//!
//! [`MockServer`] implements [`UaTransport`] over a small address space kept
//! in memory. Tests script it directly: add nodes, push notifications that the
//! next poll drains, inject connect or teardown failures, and count requests
//! to assert what did or did not reach the "network".

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::config::{ClientConfig, SubscriptionParameters};
use crate::endpoint::Endpoint;
use crate::error::{ConnectionError, OperationError, SubscriptionError, UaError, UaResult};
use crate::transport::{
    ConnectRequest, IdentityToken, MonitoredItemKind, MonitoredItemRequest, Notification,
    TransportFactory, UaTransport,
};
use crate::types::{
    AttributeId, BrowseDirection, LocalizedText, NodeClass, NodeId, QualifiedName,
    ReferenceDescription, SecurityMode, SecurityPolicy, StatusCode,
};
use crate::variant::{DataValue, Variant};

/// Default URL of a mock server.
pub const MOCK_URL: &str = "opc.tcp://mock.local:4840";

/// Method on the Server object that echoes its inputs.
pub const ECHO_METHOD: u32 = 11492;

// =============================================================================
// Address space
// =============================================================================

struct MockNode {
    class: NodeClass,
    attributes: HashMap<AttributeId, DataValue>,
    references: Vec<ReferenceDescription>,
}

impl MockNode {
    fn new(id: &NodeId, class: NodeClass, name: &str) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(AttributeId::NodeId, DataValue::new(id.clone()));
        attributes.insert(
            AttributeId::NodeClass,
            DataValue::new(Variant::Int32(class.value() as i32)),
        );
        attributes.insert(
            AttributeId::BrowseName,
            DataValue::new(QualifiedName::new(id.namespace_index, name)),
        );
        attributes.insert(AttributeId::DisplayName, DataValue::new(LocalizedText::from(name)));
        attributes.insert(AttributeId::WriteMask, DataValue::new(0u32));
        attributes.insert(AttributeId::UserWriteMask, DataValue::new(0u32));
        Self {
            class,
            attributes,
            references: Vec::new(),
        }
    }
}

struct MockSubscription {
    parameters: SubscriptionParameters,
    items: HashMap<u32, MonitoredItemRequest>,
}

#[derive(Default)]
struct MockState {
    nodes: HashMap<NodeId, MockNode>,
    subscriptions: HashMap<u32, MockSubscription>,
    pending: VecDeque<Notification>,
    endpoints: Vec<Endpoint>,
    security_mode: SecurityMode,
    last_identity: Option<IdentityToken>,
    connect_failure: Option<String>,
}

// =============================================================================
// MockServer
// =============================================================================

/// Scripted in-memory server. Clones share state.
#[derive(Clone)]
pub struct MockServer {
    inner: Arc<MockTransport>,
}

struct MockTransport {
    url: String,
    state: Mutex<MockState>,
    connected: AtomicBool,
    hang_discovery: AtomicBool,
    fail_deletes: AtomicBool,
    connect_delay_ms: AtomicU64,
    write_delay_ms: AtomicU64,
    next_subscription_id: AtomicU32,
    next_item_id: AtomicU32,
    reads: AtomicU64,
    writes: AtomicU64,
    browses: AtomicU64,
    calls: AtomicU64,
    connects: AtomicU64,
    polls: AtomicU64,
}

impl MockServer {
    /// Creates a server with an empty address space at [`MOCK_URL`].
    pub fn new() -> Self {
        Self::with_url(MOCK_URL)
    }

    /// Creates a server with an empty address space at `url`.
    pub fn with_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let state = MockState {
            endpoints: vec![
                Endpoint::unsecured(url.clone()),
                Endpoint {
                    url: url.clone(),
                    security_policy_uri: SecurityPolicy::Basic256Sha256.uri().to_string(),
                    security_mode: SecurityMode::SignAndEncrypt,
                    security_level: 3,
                },
            ],
            ..Default::default()
        };
        Self {
            inner: Arc::new(MockTransport {
                url,
                state: Mutex::new(state),
                connected: AtomicBool::new(false),
                hang_discovery: AtomicBool::new(false),
                fail_deletes: AtomicBool::new(false),
                connect_delay_ms: AtomicU64::new(0),
                write_delay_ms: AtomicU64::new(0),
                next_subscription_id: AtomicU32::new(1),
                next_item_id: AtomicU32::new(1),
                reads: AtomicU64::new(0),
                writes: AtomicU64::new(0),
                browses: AtomicU64::new(0),
                calls: AtomicU64::new(0),
                connects: AtomicU64::new(0),
                polls: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a server holding Root, Objects and Server.
    pub fn with_standard_nodes() -> Self {
        let server = Self::new();
        {
            let mut state = server.inner.state.lock();
            let root = NodeId::root_folder();
            let objects = NodeId::objects_folder();
            let server_id = NodeId::numeric(0, NodeId::SERVER);

            let mut root_node = MockNode::new(&root, NodeClass::Object, "Root");
            root_node
                .attributes
                .insert(AttributeId::EventNotifier, DataValue::new(1u8));
            state.nodes.insert(root.clone(), root_node);

            let mut objects_node = MockNode::new(&objects, NodeClass::Object, "Objects");
            objects_node
                .attributes
                .insert(AttributeId::EventNotifier, DataValue::new(0u8));
            state.nodes.insert(objects.clone(), objects_node);

            let mut server_node = MockNode::new(&server_id, NodeClass::Object, "Server");
            server_node
                .attributes
                .insert(AttributeId::EventNotifier, DataValue::new(1u8));
            state.nodes.insert(server_id.clone(), server_node);

            link(&mut state, &root, &objects);
            link(&mut state, &objects, &server_id);
        }
        server
    }

    /// Returns the server URL.
    pub fn url(&self) -> String {
        self.inner.url.clone()
    }

    /// Returns the transport view of this server.
    pub fn transport(&self) -> Arc<dyn UaTransport> {
        Arc::clone(&self.inner) as Arc<dyn UaTransport>
    }

    /// Returns a factory handing out this server's transport.
    pub fn factory(&self) -> Arc<dyn TransportFactory> {
        Arc::new(MockTransportFactory {
            server: self.clone(),
        })
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Adds a Variable under Objects.
    pub fn add_variable(&self, id: NodeId, name: &str, value: DataValue) -> NodeId {
        let mut state = self.inner.state.lock();
        let mut node = MockNode::new(&id, NodeClass::Variable, name);
        // Builtin data type ids start at 1 (Boolean).
        let data_type = value.value.kind().map_or(0, |kind| kind as u32 + 1);
        node.attributes.insert(AttributeId::Value, value);
        node.attributes
            .insert(AttributeId::DataType, DataValue::new(NodeId::numeric(0, data_type)));
        node.attributes.insert(AttributeId::ValueRank, DataValue::new(-1i32));
        node.attributes.insert(AttributeId::AccessLevel, DataValue::new(3u8));
        node.attributes.insert(AttributeId::UserAccessLevel, DataValue::new(3u8));
        node.attributes
            .insert(AttributeId::MinimumSamplingInterval, DataValue::new(100.0f64));
        node.attributes.insert(AttributeId::Historizing, DataValue::new(false));
        state.nodes.insert(id.clone(), node);
        link(&mut state, &NodeId::objects_folder(), &id);
        id
    }

    /// Adds an arbitrary node under `parent` with only common attributes.
    pub fn add_node(&self, parent: &NodeId, id: NodeId, class: NodeClass, name: &str) -> NodeId {
        let mut state = self.inner.state.lock();
        state.nodes.insert(id.clone(), MockNode::new(&id, class, name));
        link(&mut state, parent, &id);
        id
    }

    /// Sets one attribute of an existing node.
    pub fn set_attribute(&self, id: &NodeId, attribute: AttributeId, value: DataValue) {
        if let Some(node) = self.inner.state.lock().nodes.get_mut(id) {
            node.attributes.insert(attribute, value);
        }
    }

    /// Marks the session as established without a handshake.
    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns whether a session is established.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Makes the next connect attempt fail.
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.inner.state.lock().connect_failure = Some(reason.into());
    }

    /// Makes endpoint discovery never complete.
    pub fn hang_discovery(&self, hang: bool) {
        self.inner.hang_discovery.store(hang, Ordering::SeqCst);
    }

    /// Delays every connect handshake by `delay`.
    pub fn delay_connect(&self, delay: Duration) {
        self.inner
            .connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delays every attribute write by `delay`.
    pub fn delay_writes(&self, delay: Duration) {
        self.inner
            .write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Makes subscription deletion fail.
    pub fn fail_subscription_deletes(&self, fail: bool) {
        self.inner.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Queues a data change for every item monitoring `(node_id, attribute_id)`.
    ///
    /// Returns the number of notifications queued.
    pub fn push_data_change(&self, node_id: &NodeId, attribute_id: u32, value: DataValue) -> usize {
        self.push(node_id, attribute_id, MonitoredItemKind::DataChange, |client_handle| {
            Notification::DataChange {
                client_handle,
                value: value.clone(),
            }
        })
    }

    /// Queues an event for every event item on `node_id`.
    pub fn push_event(&self, node_id: &NodeId, fields: Vec<Variant>) -> usize {
        self.push(
            node_id,
            AttributeId::EventNotifier.value(),
            MonitoredItemKind::Event,
            |client_handle| Notification::Event {
                client_handle,
                fields: fields.clone(),
            },
        )
    }

    /// Queues a raw notification.
    pub fn push_notification(&self, notification: Notification) {
        self.inner.state.lock().pending.push_back(notification);
    }

    fn push(
        &self,
        node_id: &NodeId,
        attribute_id: u32,
        kind: MonitoredItemKind,
        make: impl Fn(u32) -> Notification,
    ) -> usize {
        let mut state = self.inner.state.lock();
        let mut handles: Vec<u32> = state
            .subscriptions
            .values()
            .flat_map(|s| s.items.values())
            .filter(|item| {
                &item.node_id == node_id && item.attribute_id == attribute_id && item.kind == kind
            })
            .map(|item| item.client_handle)
            .collect();
        handles.sort_unstable();
        for handle in &handles {
            state.pending.push_back(make(*handle));
        }
        handles.len()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Attribute reads served.
    pub fn read_count(&self) -> u64 {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Attribute writes served.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Browses served.
    pub fn browse_count(&self) -> u64 {
        self.inner.browses.load(Ordering::SeqCst)
    }

    /// Method calls served.
    pub fn call_count(&self) -> u64 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Successful connects.
    pub fn connect_count(&self) -> u64 {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Polls served.
    pub fn poll_count(&self) -> u64 {
        self.inner.polls.load(Ordering::SeqCst)
    }

    /// Live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.lock().subscriptions.len()
    }

    /// Monitored items across all subscriptions.
    pub fn monitored_item_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .subscriptions
            .values()
            .map(|s| s.items.len())
            .sum()
    }

    /// Parameters of a live subscription.
    pub fn subscription_parameters(&self, subscription_id: u32) -> Option<SubscriptionParameters> {
        self.inner
            .state
            .lock()
            .subscriptions
            .get(&subscription_id)
            .map(|s| s.parameters.clone())
    }

    /// Notifications not yet drained by a poll.
    pub fn pending_notifications(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Security mode applied before the last connect.
    pub fn security_mode(&self) -> SecurityMode {
        self.inner.state.lock().security_mode
    }

    /// Identity presented on the last connect.
    pub fn last_identity(&self) -> Option<IdentityToken> {
        self.inner.state.lock().last_identity.clone()
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

fn link(state: &mut MockState, parent: &NodeId, child: &NodeId) {
    let describe = |state: &MockState, id: &NodeId, is_forward: bool| {
        let node = state.nodes.get(id)?;
        let browse_name = node
            .attributes
            .get(&AttributeId::BrowseName)
            .and_then(|v| v.value.to::<QualifiedName>().ok())
            .unwrap_or_default();
        let display_name = node
            .attributes
            .get(&AttributeId::DisplayName)
            .and_then(|v| v.value.to::<LocalizedText>().ok())
            .unwrap_or_default();
        Some(ReferenceDescription {
            reference_type_id: NodeId::numeric(0, NodeId::HIERARCHICAL_REFERENCES),
            is_forward,
            node_id: id.clone(),
            browse_name,
            display_name,
            node_class: Some(node.class),
            type_definition: None,
        })
    };

    let forward = describe(state, child, true);
    let inverse = describe(state, parent, false);
    if let (Some(forward), Some(inverse)) = (forward, inverse) {
        if let Some(node) = state.nodes.get_mut(parent) {
            node.references.push(forward);
        }
        if let Some(node) = state.nodes.get_mut(child) {
            node.references.push(inverse);
        }
    }
}

// =============================================================================
// UaTransport
// =============================================================================

impl MockTransport {
    async fn scripted_delay(&self, millis: &AtomicU64) {
        let millis = millis.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn ensure_connected(&self) -> UaResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(UaError::not_connected())
        }
    }
}

#[async_trait]
impl UaTransport for MockTransport {
    async fn discover_endpoints(&self, url: &str) -> UaResult<Vec<Endpoint>> {
        if self.hang_discovery.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if url != self.url {
            return Err(UaError::connection(ConnectionError::discovery_failed(
                url,
                "host unreachable",
            )));
        }
        Ok(self.state.lock().endpoints.clone())
    }

    async fn set_security_mode(&self, mode: SecurityMode) -> UaResult<()> {
        self.state.lock().security_mode = mode;
        Ok(())
    }

    async fn connect(&self, request: &ConnectRequest) -> UaResult<()> {
        self.scripted_delay(&self.connect_delay_ms).await;
        let mut state = self.state.lock();
        if let Some(reason) = state.connect_failure.take() {
            return Err(UaError::connection(ConnectionError::handshake_failed(
                request.endpoint.url.clone(),
                reason,
            )));
        }
        if request.endpoint.url != self.url {
            return Err(UaError::connection(ConnectionError::refused(
                request.endpoint.url.clone(),
            )));
        }
        state.last_identity = Some(request.identity.clone());
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> UaResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read_attribute(&self, node_id: &NodeId, attribute: AttributeId) -> UaResult<DataValue> {
        self.ensure_connected()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        let value = match state.nodes.get(node_id) {
            None => DataValue::from_status(StatusCode::BAD_NODE_ID_UNKNOWN),
            Some(node) => node
                .attributes
                .get(&attribute)
                .cloned()
                .unwrap_or_else(|| DataValue::from_status(StatusCode::BAD_ATTRIBUTE_ID_INVALID)),
        };
        trace!(node_id = %node_id, attribute = %attribute, status = %value.status, "Mock read");
        Ok(value)
    }

    async fn write_attribute(
        &self,
        node_id: &NodeId,
        attribute: AttributeId,
        value: DataValue,
    ) -> UaResult<StatusCode> {
        self.ensure_connected()?;
        self.scripted_delay(&self.write_delay_ms).await;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        match state.nodes.get_mut(node_id) {
            None => Ok(StatusCode::BAD_NODE_ID_UNKNOWN),
            Some(_) if matches!(attribute, AttributeId::NodeId | AttributeId::NodeClass) => {
                Ok(StatusCode::BAD_NOT_WRITABLE)
            }
            Some(node) => {
                node.attributes.insert(attribute, value);
                Ok(StatusCode::GOOD)
            }
        }
    }

    async fn browse(
        &self,
        node_id: &NodeId,
        direction: BrowseDirection,
    ) -> UaResult<Vec<ReferenceDescription>> {
        self.ensure_connected()?;
        self.browses.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        let node = state.nodes.get(node_id).ok_or_else(|| {
            UaError::browse(crate::error::BrowseError::bad_status(
                node_id.to_string(),
                StatusCode::BAD_NODE_ID_UNKNOWN,
            ))
        })?;
        Ok(node
            .references
            .iter()
            .filter(|r| match direction {
                BrowseDirection::Forward => r.is_forward,
                BrowseDirection::Inverse => !r.is_forward,
                BrowseDirection::Both => true,
            })
            .cloned()
            .collect())
    }

    async fn call_method(
        &self,
        object_id: &NodeId,
        method_id: &NodeId,
        arguments: Vec<Variant>,
    ) -> UaResult<Vec<Variant>> {
        self.ensure_connected()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.state.lock().nodes.contains_key(object_id) {
            return Err(UaError::operation(OperationError::bad_status(
                object_id.to_string(),
                StatusCode::BAD_NODE_ID_UNKNOWN,
            )));
        }
        if method_id.as_numeric() == Some(ECHO_METHOD) {
            Ok(arguments)
        } else {
            Err(UaError::operation(OperationError::call_failed(
                object_id.to_string(),
                method_id.to_string(),
                StatusCode::BAD_METHOD_INVALID.to_string(),
            )))
        }
    }

    async fn create_subscription(&self, parameters: &SubscriptionParameters) -> UaResult<u32> {
        self.ensure_connected()?;
        let id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        self.state.lock().subscriptions.insert(
            id,
            MockSubscription {
                parameters: parameters.clone(),
                items: HashMap::new(),
            },
        );
        Ok(id)
    }

    async fn modify_subscription(
        &self,
        subscription_id: u32,
        parameters: &SubscriptionParameters,
    ) -> UaResult<()> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        let subscription = state
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or_else(|| UaError::subscription(SubscriptionError::not_found(subscription_id)))?;
        subscription.parameters = parameters.clone();
        Ok(())
    }

    async fn set_publishing_mode(&self, subscription_id: u32, enabled: bool) -> UaResult<()> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        let subscription = state
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or_else(|| UaError::subscription(SubscriptionError::not_found(subscription_id)))?;
        subscription.parameters.publishing_enabled = enabled;
        Ok(())
    }

    async fn delete_subscription(&self, subscription_id: u32) -> UaResult<()> {
        self.ensure_connected()?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(UaError::subscription(SubscriptionError::delete_failed(
                subscription_id,
                "scripted failure",
            )));
        }
        match self.state.lock().subscriptions.remove(&subscription_id) {
            Some(_) => Ok(()),
            None => Err(UaError::subscription(SubscriptionError::not_found(subscription_id))),
        }
    }

    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        request: &MonitoredItemRequest,
    ) -> UaResult<u32> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        if !state.nodes.contains_key(&request.node_id) {
            return Err(UaError::subscription(SubscriptionError::bad_status(
                request.node_id.to_string(),
                StatusCode::BAD_NODE_ID_UNKNOWN,
            )));
        }
        let subscription = state
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or_else(|| UaError::subscription(SubscriptionError::not_found(subscription_id)))?;
        let id = self.next_item_id.fetch_add(1, Ordering::SeqCst);
        subscription.items.insert(id, request.clone());
        Ok(id)
    }

    async fn delete_monitored_items(&self, subscription_id: u32, item_ids: &[u32]) -> UaResult<()> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        let subscription = state
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or_else(|| UaError::subscription(SubscriptionError::not_found(subscription_id)))?;
        for id in item_ids {
            subscription.items.remove(id);
        }
        Ok(())
    }

    async fn process_events(&self) -> UaResult<Vec<Notification>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if !self.connected.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }

        let mut state = self.state.lock();
        let publishing: HashMap<u32, bool> = state
            .subscriptions
            .values()
            .flat_map(|s| {
                let enabled = s.parameters.publishing_enabled;
                s.items.values().map(move |item| (item.client_handle, enabled))
            })
            .collect();

        // Notifications of paused subscriptions wait for publishing to resume.
        let (ready, held): (Vec<Notification>, Vec<Notification>) = state
            .pending
            .drain(..)
            .partition(|n| publishing.get(&n.client_handle()).copied().unwrap_or(true));
        state.pending.extend(held);
        Ok(ready)
    }
}

// =============================================================================
// MockTransportFactory
// =============================================================================

/// Factory returning the transport of one [`MockServer`].
pub struct MockTransportFactory {
    server: MockServer,
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, _config: &ClientConfig) -> UaResult<Arc<dyn UaTransport>> {
        Ok(self.server.transport())
    }
}
