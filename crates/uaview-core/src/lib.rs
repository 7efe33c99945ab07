// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core of the uaview OPC UA client.
//!
//! This crate models connections to OPC UA servers, typed handles to nodes
//! of their address space with lazily filled attribute caches, and
//! subscriptions that keep those caches current from server notifications.
//! The wire protocol sits behind the [`UaTransport`] trait; enable the
//! `real-transport` feature to bind it to the `opcua` crate.
//!
//! # Error Handling
//!
//! ```text
//! UaError
//! ├── Connection    - Endpoint, handshake and lifecycle failures
//! ├── Security      - Authentication and certificate errors
//! ├── Browse        - Node lookup and browsing failures
//! ├── Operation     - Read, write and call failures
//! ├── Subscription  - Subscription and monitored item errors
//! ├── Conversion    - Variant type mismatches
//! ├── Configuration - Invalid settings
//! └── Timeout       - Bounded operations that ran out of time
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uaview_core::{AttributeId, ClientConfig, ConnectionManager, TracingSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::new(ClientConfig::default(), Arc::new(OpcUaTransportFactory));
//!     let connection = manager
//!         .builder()
//!         .url("opc.tcp://localhost:4840")
//!         .sink(Arc::new(TracingSink))
//!         .find_endpoints()
//!         .await
//!         .select_endpoint(0)
//!         .build()?;
//!     connection.connect().await?;
//!
//!     let root = connection.root_node().await.ok_or("no root")?;
//!     let subscription = connection
//!         .create_subscription(&root, &[AttributeId::DisplayName.value()])
//!         .await?;
//!     println!("{} item(s) monitored", subscription.monitored_items().len());
//!
//!     manager.close_all_connections().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod node;
pub mod transport;
pub mod types;
pub mod variant;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

#[cfg(feature = "real-transport")]
pub mod real_transport;

pub use client::{
    BroadcastSink, ChannelSink, ClientEvent, Connection, ConnectionBuilder, ConnectionManager,
    ConnectionState, DataChangeEvent, EventNotification, EventSink, MonitoredItem,
    StatsSnapshot, Subscription, SubscriptionEvent, TracingSink,
};
pub use config::{ClientConfig, ClientConfigBuilder, MonitoringParameters, SubscriptionParameters};
pub use credentials::{
    CredentialStore, Credentials, FileCredentialStore, IdentityProfile, MemoryCredentialStore,
};
pub use endpoint::Endpoint;
pub use error::{
    BrowseError, ConfigurationError, ConnectionError, ConversionError, ErrorCode, ErrorSeverity,
    OperationError, SecurityError, SubscriptionError, TimeoutError, UaError, UaResult,
};
pub use node::{AttributeValue, Node};
pub use transport::{
    ClientCertificate, ConnectRequest, IdentityToken, MonitoredItemKind, MonitoredItemRequest,
    Notification, TransportFactory, UaTransport,
};
pub use types::{
    AttributeId, BrowseDirection, LocalizedText, MonitoringMode, NodeClass, NodeId,
    NodeIdentifier, QualifiedName, ReferenceDescription, SecurityMode, SecurityPolicy, StatusCode,
};
pub use variant::{DataValue, FromVariant, Variant, VariantArray, VariantKind};

#[cfg(feature = "real-transport")]
pub use real_transport::OpcUaTransportFactory;
