// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Server-side subscriptions and their monitored items.
//!
//! A [`Subscription`] belongs to the connection that created it. Each
//! monitored item gets a client handle that routes its notifications, on the
//! connection's poll task, into the node cache and out to listeners.
//! Dropping a subscription tears the server-side resource down in the
//! background; failures are logged only.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::client::connection::Connection;
use crate::client::poll::Route;
use crate::client::sink::SubscriptionEvent;
use crate::config::{MonitoringParameters, SubscriptionParameters};
use crate::error::{SubscriptionError, UaError, UaResult};
use crate::node::Node;
use crate::transport::{MonitoredItemKind, MonitoredItemRequest};
use crate::types::AttributeId;

// =============================================================================
// MonitoredItem
// =============================================================================

/// One watched target within a subscription.
#[derive(Debug, Clone)]
pub struct MonitoredItem {
    id: u32,
    client_handle: u32,
    node: Node,
    attribute_id: u32,
    kind: MonitoredItemKind,
    parameters: MonitoringParameters,
}

impl MonitoredItem {
    /// Server-assigned item id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Client handle carried by this item's notifications.
    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    /// The watched node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Raw attribute id; `EventNotifier` for event items.
    pub fn attribute_id(&self) -> u32 {
        self.attribute_id
    }

    /// Data change or event.
    pub fn kind(&self) -> MonitoredItemKind {
        self.kind
    }

    /// Delivery parameters.
    pub fn parameters(&self) -> &MonitoringParameters {
        &self.parameters
    }
}

impl PartialEq for MonitoredItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.client_handle == other.client_handle
    }
}

impl Eq for MonitoredItem {}

// =============================================================================
// Subscription
// =============================================================================

/// A live server-side subscription.
pub struct Subscription {
    id: u32,
    connection: Weak<Connection>,
    parameters: Mutex<SubscriptionParameters>,
    monitoring: MonitoringParameters,
    items: Mutex<Vec<MonitoredItem>>,
    events: broadcast::Sender<SubscriptionEvent>,
    deleted: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        id: u32,
        connection: Weak<Connection>,
        parameters: SubscriptionParameters,
        monitoring: MonitoringParameters,
        channel_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            id,
            connection,
            parameters: Mutex::new(parameters),
            monitoring,
            items: Mutex::new(Vec::new()),
            events,
            deleted: AtomicBool::new(false),
        }
    }

    /// Server-assigned subscription id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Current parameters.
    pub fn parameters(&self) -> SubscriptionParameters {
        self.parameters.lock().clone()
    }

    /// Returns whether publishing is enabled.
    pub fn is_publishing_enabled(&self) -> bool {
        self.parameters.lock().publishing_enabled
    }

    /// Returns the current monitored items.
    pub fn monitored_items(&self) -> Vec<MonitoredItem> {
        self.items.lock().clone()
    }

    /// Receives every notification delivered to this subscription from now on.
    pub fn listen(&self) -> broadcast::Receiver<SubscriptionEvent> {
        self.events.subscribe()
    }

    fn connection(&self) -> UaResult<std::sync::Arc<Connection>> {
        if self.deleted.load(Ordering::Acquire) {
            return Err(UaError::subscription(SubscriptionError::not_found(self.id)));
        }
        match self.connection.upgrade() {
            Some(conn) if conn.is_connected() => Ok(conn),
            Some(conn) if conn.state().is_closed() => Err(UaError::closed()),
            Some(_) => Err(UaError::not_connected()),
            None => Err(UaError::closed()),
        }
    }

    // =========================================================================
    // Reconfiguration
    // =========================================================================

    /// Enables or disables publishing. Takes effect on the next poll.
    pub async fn set_publishing_mode(&self, enabled: bool) -> UaResult<()> {
        let conn = self.connection()?;
        conn.transport().set_publishing_mode(self.id, enabled).await?;
        self.parameters.lock().publishing_enabled = enabled;
        debug!(subscription_id = self.id, enabled, "Publishing mode changed");
        Ok(())
    }

    /// Replaces the subscription parameters.
    pub async fn set_parameters(&self, parameters: SubscriptionParameters) -> UaResult<()> {
        parameters.validate()?;
        let conn = self.connection()?;
        conn.transport().modify_subscription(self.id, &parameters).await?;

        let enabled_changed = self.is_publishing_enabled() != parameters.publishing_enabled;
        if enabled_changed {
            conn.transport()
                .set_publishing_mode(self.id, parameters.publishing_enabled)
                .await?;
        }

        info!(
            subscription_id = self.id,
            interval = ?parameters.publishing_interval,
            "Subscription modified"
        );
        *self.parameters.lock() = parameters;
        Ok(())
    }

    // =========================================================================
    // Monitored items
    // =========================================================================

    /// Monitors `attribute_id` of `node` with the default monitoring parameters.
    ///
    /// Each notification overwrites the node's cache slot and is then
    /// forwarded to listeners. Unknown attribute ids are accepted and only
    /// forwarded.
    pub async fn subscribe_data_changed(&self, node: &Node, attribute_id: u32) -> UaResult<MonitoredItem> {
        self.subscribe_data_changed_with(node, attribute_id, self.monitoring.clone())
            .await
    }

    /// Like [`subscribe_data_changed`](Self::subscribe_data_changed) with
    /// explicit parameters.
    pub async fn subscribe_data_changed_with(
        &self,
        node: &Node,
        attribute_id: u32,
        parameters: MonitoringParameters,
    ) -> UaResult<MonitoredItem> {
        self.add_item(node, attribute_id, MonitoredItemKind::DataChange, parameters)
            .await
    }

    /// Monitors events raised by `node`. Event fields are forwarded, never cached.
    pub async fn subscribe_event(&self, node: &Node) -> UaResult<MonitoredItem> {
        self.add_item(
            node,
            AttributeId::EventNotifier.value(),
            MonitoredItemKind::Event,
            self.monitoring.clone(),
        )
        .await
    }

    async fn add_item(
        &self,
        node: &Node,
        attribute_id: u32,
        kind: MonitoredItemKind,
        parameters: MonitoringParameters,
    ) -> UaResult<MonitoredItem> {
        parameters.validate()?;
        let conn = self.connection()?;
        if node.connection_id() != conn.id() {
            return Err(UaError::subscription(SubscriptionError::monitored_item_failed(
                node.node_id().to_string(),
                format!(
                    "node belongs to connection {}, subscription to {}",
                    node.connection_id(),
                    conn.id()
                ),
            )));
        }

        let client_handle = conn.allocate_client_handle();
        conn.register_route(
            client_handle,
            Route {
                subscription_id: self.id,
                node: node.clone(),
                attribute_id,
                kind,
                events: self.events.clone(),
            },
        );

        let request = MonitoredItemRequest {
            client_handle,
            node_id: node.node_id().clone(),
            attribute_id,
            parameters: parameters.clone(),
            kind,
        };

        let id = match conn.transport().create_monitored_item(self.id, &request).await {
            Ok(id) => id,
            Err(e) => {
                conn.remove_routes(&[client_handle]);
                return Err(e);
            }
        };

        debug!(
            connection_id = conn.id(),
            subscription_id = self.id,
            node_id = %node.node_id(),
            attribute_id,
            client_handle,
            ?kind,
            "Monitored item created"
        );

        let item = MonitoredItem {
            id,
            client_handle,
            node: node.clone(),
            attribute_id,
            kind,
            parameters,
        };
        self.items.lock().push(item.clone());
        Ok(item)
    }

    /// Stops monitoring `item`.
    pub async fn unsubscribe(&self, item: &MonitoredItem) -> UaResult<()> {
        let conn = self.connection()?;
        let known = self.items.lock().iter().any(|i| i == item);
        if !known {
            return Err(UaError::subscription(SubscriptionError::monitored_item_failed(
                item.node.node_id().to_string(),
                format!("item {} is not part of subscription {}", item.id, self.id),
            )));
        }

        conn.remove_routes(&[item.client_handle]);
        self.items.lock().retain(|i| i != item);
        conn.transport()
            .delete_monitored_items(self.id, &[item.id])
            .await
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Deletes the server-side subscription and stops routing its items.
    pub async fn delete(self) -> UaResult<()> {
        let conn = self.connection()?;
        self.deleted.store(true, Ordering::Release);
        let handles = self.take_client_handles();
        conn.remove_routes(&handles);
        conn.transport().delete_subscription(self.id).await?;
        info!(connection_id = conn.id(), subscription_id = self.id, "Subscription deleted");
        Ok(())
    }

    fn take_client_handles(&self) -> Vec<u32> {
        self.items
            .lock()
            .drain(..)
            .map(|item| item.client_handle)
            .collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.deleted.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(conn) = self.connection.upgrade() else {
            return;
        };

        let handles = self.take_client_handles();
        conn.remove_routes(&handles);
        if !conn.is_connected() {
            return;
        }

        let subscription_id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = conn.transport().delete_subscription(subscription_id).await {
                        e.log("subscription teardown");
                    }
                });
            }
            Err(_) => warn!(
                subscription_id,
                "No runtime available, server-side subscription left to expire"
            ),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("items", &self.items.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::client::connection::ConnectionSettings;
    use crate::client::sink::TracingSink;
    use crate::config::ClientConfig;
    use crate::endpoint::Endpoint;
    use crate::mock::MockServer;
    use crate::types::{LocalizedText, NodeId};
    use crate::variant::{DataValue, Variant};

    async fn connected(server: &MockServer) -> Arc<Connection> {
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
        let conn = Connection::new(7, config, server.transport(), settings, Arc::new(TracingSink));
        conn.connect().await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_listen_receives_data_change() {
        let server = MockServer::with_standard_nodes();
        let conn = connected(&server).await;
        let root = conn.root_node().await.unwrap();

        let subscription = conn.create_empty_subscription(Default::default()).await.unwrap();
        let mut events = subscription.listen();
        let item = subscription
            .subscribe_data_changed(&root, AttributeId::DisplayName.value())
            .await
            .unwrap();
        assert_eq!(item.kind(), MonitoredItemKind::DataChange);

        server.push_data_change(
            &NodeId::root_folder(),
            AttributeId::DisplayName.value(),
            DataValue::new(LocalizedText::from("Pushed")),
        );
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            SubscriptionEvent::DataChanged(change) => {
                assert_eq!(change.connection_id, 7);
                assert_eq!(change.subscription_id, subscription.id());
                assert_eq!(change.node.node_id(), &NodeId::root_folder());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_event_items_are_not_cached() {
        let server = MockServer::with_standard_nodes();
        let conn = connected(&server).await;
        let root = conn.root_node().await.unwrap();
        let subscription = conn.create_empty_subscription(Default::default()).await.unwrap();
        let mut events = subscription.listen();
        subscription.subscribe_event(&root).await.unwrap();

        server.push_event(&NodeId::root_folder(), vec![Variant::from("Alarm"), Variant::UInt16(500)]);
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, SubscriptionEvent::Event(ref e) if e.fields.len() == 2));
        assert!(!root.is_cached(AttributeId::EventNotifier));
    }

    #[tokio::test]
    async fn test_unsubscribe_and_reconfigure() {
        let server = MockServer::with_standard_nodes();
        let conn = connected(&server).await;
        let root = conn.root_node().await.unwrap();
        let subscription = conn
            .create_subscription(&root, &[AttributeId::DisplayName.value(), AttributeId::Description.value()])
            .await
            .unwrap();
        assert_eq!(subscription.monitored_items().len(), 2);

        let first = subscription.monitored_items()[0].clone();
        subscription.unsubscribe(&first).await.unwrap();
        assert_eq!(subscription.monitored_items().len(), 1);
        assert!(subscription.unsubscribe(&first).await.is_err());

        subscription.set_publishing_mode(false).await.unwrap();
        assert!(!subscription.is_publishing_enabled());

        let params = SubscriptionParameters::with_interval(Duration::from_secs(1));
        subscription.set_parameters(params.clone()).await.unwrap();
        assert_eq!(subscription.parameters(), params);

        let mut invalid = params;
        invalid.lifetime_count = 1;
        assert!(subscription.set_parameters(invalid).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_tears_down_server_side() {
        let server = MockServer::with_standard_nodes();
        let conn = connected(&server).await;
        let root = conn.root_node().await.unwrap();
        let subscription = conn
            .create_subscription(&root, &[AttributeId::DisplayName.value()])
            .await
            .unwrap();
        assert_eq!(server.subscription_count(), 1);

        drop(subscription);
        for _ in 0..50 {
            if server.subscription_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.subscription_count(), 0);
        assert!(conn.routes().read().is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_is_reported_not_panicking() {
        let server = MockServer::with_standard_nodes();
        let conn = connected(&server).await;
        let subscription = conn.create_empty_subscription(Default::default()).await.unwrap();
        server.fail_subscription_deletes(true);
        assert!(subscription.delete().await.is_err());

        let dropped = conn.create_empty_subscription(Default::default()).await.unwrap();
        drop(dropped);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
