// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol session abstraction.
//!
//! The client core never speaks the wire protocol itself. Everything it needs
//! from a session goes through [`UaTransport`], so the same connection, node
//! and subscription logic runs against a real server (`real-transport`
//! feature) or the scripted in-memory server used in tests.
//!
//! # Thread Safety
//!
//! Transports are shared between the caller, the node handles and the
//! connection's poll task, so every method takes `&self` and implementations
//! use interior mutability.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ClientConfig, MonitoringParameters, SubscriptionParameters};
use crate::endpoint::Endpoint;
use crate::error::UaResult;
use crate::types::{AttributeId, BrowseDirection, NodeId, ReferenceDescription, SecurityMode, StatusCode};
use crate::variant::{DataValue, Variant};

// =============================================================================
// Connect request
// =============================================================================

/// User identity presented during session activation.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum IdentityToken {
    /// No user identity.
    #[default]
    Anonymous,
    /// Username and password.
    UserName {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
}

impl IdentityToken {
    /// Returns `true` for anonymous identities.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::UserName { username, .. } => f
                .debug_struct("UserName")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Client certificate and private key, as raw DER or PEM bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    /// Certificate bytes.
    pub certificate: Vec<u8>,
    /// Private key bytes.
    pub private_key: Vec<u8>,
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("certificate", &format_args!("<{} bytes>", self.certificate.len()))
            .field("private_key", &"***")
            .finish()
    }
}

/// Everything a transport needs to open a session.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// The chosen endpoint.
    pub endpoint: Endpoint,
    /// User identity.
    pub identity: IdentityToken,
    /// Optional client certificate.
    pub certificate: Option<ClientCertificate>,
    /// Trusted server certificates.
    pub trust_list: Vec<Vec<u8>>,
    /// Revoked certificates.
    pub revoked_list: Vec<Vec<u8>>,
}

// =============================================================================
// Monitored items and notifications
// =============================================================================

/// What a monitored item reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitoredItemKind {
    /// Changes of one attribute.
    DataChange,
    /// Events raised by a notifier node.
    Event,
}

/// Parameters for creating one monitored item.
#[derive(Debug, Clone)]
pub struct MonitoredItemRequest {
    /// Handle chosen by the client; echoed back in notifications.
    pub client_handle: u32,
    /// Monitored node.
    pub node_id: NodeId,
    /// Raw attribute id; unknown ids are passed through.
    pub attribute_id: u32,
    /// Delivery parameters.
    pub parameters: MonitoringParameters,
    /// Data change or event item.
    pub kind: MonitoredItemKind,
}

/// A notification drained from the session during a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A monitored attribute changed.
    DataChange {
        /// Client handle of the monitored item.
        client_handle: u32,
        /// New value.
        value: DataValue,
    },
    /// An event was raised.
    Event {
        /// Client handle of the monitored item.
        client_handle: u32,
        /// Selected event fields.
        fields: Vec<Variant>,
    },
}

impl Notification {
    /// Returns the client handle this notification is addressed to.
    pub fn client_handle(&self) -> u32 {
        match self {
            Self::DataChange { client_handle, .. } | Self::Event { client_handle, .. } => {
                *client_handle
            }
        }
    }
}

// =============================================================================
// UaTransport Trait
// =============================================================================

/// One protocol session, as seen by the client core.
#[async_trait]
pub trait UaTransport: Send + Sync {
    // =========================================================================
    // Discovery and session lifecycle
    // =========================================================================

    /// Lists the endpoints offered at `url`.
    async fn discover_endpoints(&self, url: &str) -> UaResult<Vec<Endpoint>>;

    /// Applies the message security mode for the next connect.
    async fn set_security_mode(&self, mode: SecurityMode) -> UaResult<()>;

    /// Performs the handshake and activates a session.
    async fn connect(&self, request: &ConnectRequest) -> UaResult<()>;

    /// Closes the session.
    async fn disconnect(&self) -> UaResult<()>;

    /// Returns `true` while a session is active.
    fn is_connected(&self) -> bool;

    // =========================================================================
    // Attribute services
    // =========================================================================

    /// Reads one attribute.
    ///
    /// A bad status for the attribute is returned inside the `DataValue`;
    /// `Err` is reserved for request-level failures.
    async fn read_attribute(&self, node_id: &NodeId, attribute: AttributeId) -> UaResult<DataValue>;

    /// Writes one attribute and returns the per-attribute status.
    async fn write_attribute(
        &self,
        node_id: &NodeId,
        attribute: AttributeId,
        value: DataValue,
    ) -> UaResult<StatusCode>;

    /// Follows hierarchical references from `node_id`.
    async fn browse(
        &self,
        node_id: &NodeId,
        direction: BrowseDirection,
    ) -> UaResult<Vec<ReferenceDescription>>;

    /// Invokes `method_id` on `object_id`.
    async fn call_method(
        &self,
        object_id: &NodeId,
        method_id: &NodeId,
        arguments: Vec<Variant>,
    ) -> UaResult<Vec<Variant>>;

    // =========================================================================
    // Subscription services
    // =========================================================================

    /// Creates a server-side subscription and returns its id.
    async fn create_subscription(&self, parameters: &SubscriptionParameters) -> UaResult<u32>;

    /// Changes the parameters of a subscription.
    async fn modify_subscription(
        &self,
        subscription_id: u32,
        parameters: &SubscriptionParameters,
    ) -> UaResult<()>;

    /// Enables or disables publishing.
    async fn set_publishing_mode(&self, subscription_id: u32, enabled: bool) -> UaResult<()>;

    /// Deletes a subscription.
    async fn delete_subscription(&self, subscription_id: u32) -> UaResult<()>;

    /// Creates one monitored item and returns its server id.
    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        request: &MonitoredItemRequest,
    ) -> UaResult<u32>;

    /// Deletes monitored items.
    async fn delete_monitored_items(&self, subscription_id: u32, item_ids: &[u32]) -> UaResult<()>;

    // =========================================================================
    // Event processing
    // =========================================================================

    /// Drives pending protocol work and drains queued notifications in
    /// arrival order. Called once per poll tick.
    async fn process_events(&self) -> UaResult<Vec<Notification>>;
}

/// Creates a fresh transport per connection or discovery.
pub trait TransportFactory: Send + Sync {
    /// Creates a transport configured from `config`.
    fn create(&self, config: &ClientConfig) -> UaResult<Arc<dyn UaTransport>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_debug_hides_password() {
        let identity = IdentityToken::UserName {
            username: "operator".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{identity:?}");
        assert!(rendered.contains("operator"));
        assert!(!rendered.contains("hunter2"));
        assert!(!identity.is_anonymous());
    }

    #[test]
    fn test_notification_client_handle() {
        let change = Notification::DataChange {
            client_handle: 7,
            value: DataValue::new(1u32),
        };
        let event = Notification::Event {
            client_handle: 9,
            fields: vec![],
        };
        assert_eq!(change.client_handle(), 7);
        assert_eq!(event.client_handle(), 9);
    }
}
