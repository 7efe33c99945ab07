// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Outward signals of the client core.
//!
//! Presentation code observes connections through an [`EventSink`]. The core
//! emits lifecycle events (connected, disconnected, connect failures,
//! discovered endpoints) and subscription events (attribute changes and raw
//! event fields). Sinks never receive mutable access to node caches.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::node::Node;
use crate::variant::{DataValue, Variant};

// =============================================================================
// ClientEvent
// =============================================================================

/// A signal emitted by a connection or builder.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Endpoint discovery finished; empty when the URL was unreachable.
    EndpointsDiscovered {
        /// The discovery URL.
        url: String,
        /// Discovered endpoints.
        endpoints: Vec<Endpoint>,
    },

    /// The session is established and the poll loop is running.
    Connected {
        /// Connection id.
        connection_id: u64,
        /// Endpoint URL.
        endpoint_url: String,
    },

    /// A connect attempt failed.
    ConnectFailed {
        /// Connection id.
        connection_id: u64,
        /// Error description.
        reason: String,
    },

    /// The connection was closed.
    Disconnected {
        /// Connection id.
        connection_id: u64,
    },

    /// A monitored attribute changed.
    DataChanged(DataChangeEvent),

    /// A monitored notifier raised an event.
    EventNotified(EventNotification),
}

impl ClientEvent {
    /// Returns the connection this event belongs to, if any.
    pub fn connection_id(&self) -> Option<u64> {
        match self {
            Self::EndpointsDiscovered { .. } => None,
            Self::Connected { connection_id, .. }
            | Self::ConnectFailed { connection_id, .. }
            | Self::Disconnected { connection_id } => Some(*connection_id),
            Self::DataChanged(e) => Some(e.connection_id),
            Self::EventNotified(e) => Some(e.connection_id),
        }
    }
}

/// An attribute change delivered by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChangeEvent {
    /// Connection id.
    pub connection_id: u64,
    /// Server subscription id.
    pub subscription_id: u32,
    /// Changed node; its cache already holds `value`.
    pub node: Node,
    /// Raw attribute id.
    pub attribute_id: u32,
    /// New value.
    pub value: DataValue,
}

/// Event fields delivered by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct EventNotification {
    /// Connection id.
    pub connection_id: u64,
    /// Server subscription id.
    pub subscription_id: u32,
    /// Notifier node.
    pub node: Node,
    /// Selected event fields, in selection order.
    pub fields: Vec<Variant>,
}

/// Event delivered on a subscription's broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// An attribute changed.
    DataChanged(DataChangeEvent),
    /// An event was raised.
    Event(EventNotification),
}

impl From<SubscriptionEvent> for ClientEvent {
    fn from(event: SubscriptionEvent) -> Self {
        match event {
            SubscriptionEvent::DataChanged(e) => Self::DataChanged(e),
            SubscriptionEvent::Event(e) => Self::EventNotified(e),
        }
    }
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndpointsDiscovered { url, endpoints } => {
                write!(f, "{} endpoint(s) discovered at {url}", endpoints.len())
            }
            Self::Connected {
                connection_id,
                endpoint_url,
            } => write!(f, "connection {connection_id} connected to {endpoint_url}"),
            Self::ConnectFailed {
                connection_id,
                reason,
            } => write!(f, "connection {connection_id} failed: {reason}"),
            Self::Disconnected { connection_id } => {
                write!(f, "connection {connection_id} disconnected")
            }
            Self::DataChanged(e) => write!(
                f,
                "{} attribute {} = {}",
                e.node.node_id(), e.attribute_id, e.value.value
            ),
            Self::EventNotified(e) => {
                write!(f, "{} event with {} field(s)", e.node.node_id(), e.fields.len())
            }
        }
    }
}

// =============================================================================
// EventSink Trait
// =============================================================================

/// Receiver of [`ClientEvent`]s.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Handles one event. Must not block for long; it runs on the poll task.
    async fn on_event(&self, event: ClientEvent);
}

/// Sink that forwards events into an mpsc channel.
///
/// Never waits for the receiver: when the channel is full the event is
/// dropped and a warning is logged.
pub struct ChannelSink {
    sender: mpsc::Sender<ClientEvent>,
}

impl ChannelSink {
    /// Creates a sink around an existing sender.
    pub fn new(sender: mpsc::Sender<ClientEvent>) -> Self {
        Self { sender }
    }

    /// Creates a sink and its receiver.
    pub fn with_channel(capacity: usize) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn on_event(&self, event: ClientEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => warn!(
                connection_id = ?event.connection_id(),
                event = %event,
                "Event channel full, event dropped"
            ),
            // A dropped receiver only means nobody is listening.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Sink that fans events out to any number of receivers.
pub struct BroadcastSink {
    sender: broadcast::Sender<ClientEvent>,
}

impl BroadcastSink {
    /// Creates a broadcast sink.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    async fn on_event(&self, event: ClientEvent) {
        let _ = self.sender.send(event);
    }
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn on_event(&self, event: ClientEvent) {
        match &event {
            ClientEvent::ConnectFailed { .. } => warn!(event = %event, "Client event"),
            ClientEvent::DataChanged(_) | ClientEvent::EventNotified(_) => {
                debug!(event = %event, "Client event")
            }
            _ => info!(event = %event, "Client event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::client::stats::ConnectionStats;
    use crate::mock::MockServer;
    use crate::node::SessionContext;
    use crate::types::{NodeClass, NodeId};

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::with_channel(4);
        sink.on_event(ClientEvent::Disconnected { connection_id: 3 }).await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.connection_id(), Some(3));
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::with_channel(1);
        sink.on_event(ClientEvent::Disconnected { connection_id: 1 }).await;
        sink.on_event(ClientEvent::Disconnected { connection_id: 2 }).await;

        assert_eq!(rx.recv().await.unwrap().connection_id(), Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_sink_without_receivers() {
        let sink = BroadcastSink::new(4);
        sink.on_event(ClientEvent::Disconnected { connection_id: 1 }).await;

        let mut rx = sink.subscribe();
        sink.on_event(ClientEvent::Connected {
            connection_id: 1,
            endpoint_url: "opc.tcp://localhost:4840".into(),
        })
        .await;
        assert!(matches!(rx.recv().await.unwrap(), ClientEvent::Connected { .. }));
    }

    #[test]
    fn test_display() {
        let ctx = SessionContext {
            connection_id: 1,
            transport: MockServer::new().transport(),
            stats: Arc::new(ConnectionStats::new()),
        };
        let event = ClientEvent::DataChanged(DataChangeEvent {
            connection_id: 1,
            subscription_id: 1,
            node: Node::new(NodeId::root_folder(), NodeClass::Object, ctx),
            attribute_id: 4,
            value: DataValue::new("Root"),
        });
        assert_eq!(event.to_string(), "i=84 attribute 4 = Root");
    }
}
