// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! [`UaTransport`] over the `opcua` crate.
//!
//! The `opcua` client API is blocking, so every session call runs on the
//! blocking thread pool. Subscription callbacks push into a shared queue that
//! [`UaTransport::process_events`] drains after polling the session, which
//! keeps notification delivery on the connection's poll task.
//!
//! Client handles chosen by the core are passed to the server unchanged and
//! come back on every data change and event.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::*;
use opcua::client::prelude::{IdentityToken as UaIdentityToken, MonitoredItem as UaMonitoredItem};
use opcua::sync::RwLock as OpcUaRwLock;
use opcua::types as ua;

use crate::config::{ClientConfig, SubscriptionParameters};
use crate::endpoint::Endpoint;
use crate::error::{
    BrowseError, ConnectionError, ConversionError, OperationError, SecurityError,
    SubscriptionError, UaError, UaResult,
};
use crate::transport::{
    ClientCertificate, ConnectRequest, IdentityToken, MonitoredItemKind, MonitoredItemRequest,
    Notification, TransportFactory, UaTransport,
};
use crate::types::{
    AttributeId, BrowseDirection, LocalizedText, MonitoringMode, NodeClass, NodeId,
    NodeIdentifier, QualifiedName, ReferenceDescription, SecurityMode, StatusCode,
};
use crate::variant::{DataValue, Variant, VariantArray};

type SharedSession = Arc<OpcUaRwLock<Session>>;
type NotificationQueue = Arc<Mutex<VecDeque<Notification>>>;

// =============================================================================
// OpcUaTransport
// =============================================================================

/// Transport backed by an `opcua` client session.
pub struct OpcUaTransport {
    config: ClientConfig,
    security_mode: Mutex<SecurityMode>,
    session: RwLock<Option<SharedSession>>,
    notifications: NotificationQueue,
}

impl OpcUaTransport {
    /// Creates a disconnected transport.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            security_mode: Mutex::new(SecurityMode::None),
            session: RwLock::new(None),
            notifications: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn build_client(&self, url: &str) -> UaResult<opcua::client::prelude::Client> {
        let mut builder = ClientBuilder::new()
            .application_name(self.config.application_name.as_str())
            .application_uri(self.config.effective_application_uri().as_str())
            .session_retry_limit(self.config.session_retry_limit)
            .session_timeout(self.config.session_timeout.as_millis() as u32)
            .create_sample_keypair(self.config.pki_dir.is_some())
            .trust_server_certs(self.config.trust_server_certs);

        if let Some(ref product_uri) = self.config.product_uri {
            builder = builder.product_uri(product_uri.as_str());
        }
        if let Some(ref pki_dir) = self.config.pki_dir {
            builder = builder.pki_dir(pki_dir.as_str());
        }
        if let Some(ref session_name) = self.config.session_name {
            builder = builder.session_name(session_name.as_str());
        }

        builder.client().ok_or_else(|| {
            UaError::connection(ConnectionError::invalid_endpoint(
                url,
                "client configuration rejected",
            ))
        })
    }

    fn session(&self) -> UaResult<SharedSession> {
        self.session.read().clone().ok_or_else(UaError::not_connected)
    }

    /// Runs `f` against the session on the blocking pool.
    async fn with_session<T, F>(&self, f: F) -> UaResult<Result<T, ua::StatusCode>>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> Result<T, ua::StatusCode> + Send + 'static,
    {
        let session = self.session()?;
        tokio::task::spawn_blocking(move || {
            let session = session.read();
            f(&session)
        })
        .await
        .map_err(|e| UaError::connection(ConnectionError::handshake_failed("session", e.to_string())))
    }

    /// Writes certificate material where the `opcua` PKI layout expects it.
    fn install_pki(pki_dir: &Path, request: &ConnectRequest) -> std::io::Result<()> {
        if let Some(ClientCertificate {
            certificate,
            private_key,
        }) = &request.certificate
        {
            let own = pki_dir.join("own");
            let private = pki_dir.join("private");
            std::fs::create_dir_all(&own)?;
            std::fs::create_dir_all(&private)?;
            std::fs::write(own.join("cert.der"), certificate)?;
            std::fs::write(private.join("private.pem"), private_key)?;
        }

        for (dir, list) in [
            (pki_dir.join("trusted").join("certs"), &request.trust_list),
            (pki_dir.join("rejected").join("certs"), &request.revoked_list),
        ] {
            if list.is_empty() {
                continue;
            }
            std::fs::create_dir_all(&dir)?;
            for (index, der) in list.iter().enumerate() {
                std::fs::write(dir.join(format!("uaview-{index}.der")), der)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UaTransport for OpcUaTransport {
    async fn discover_endpoints(&self, url: &str) -> UaResult<Vec<Endpoint>> {
        let client = self.build_client(url)?;
        let owned_url = url.to_string();

        let result = tokio::task::spawn_blocking(move || client.get_server_endpoints_from_url(owned_url))
            .await
            .map_err(|e| UaError::connection(ConnectionError::discovery_failed(url, e.to_string())))?;

        let endpoints = result.map_err(|status| {
            UaError::connection(ConnectionError::discovery_failed(url, status.to_string()))
        })?;

        Ok(endpoints
            .iter()
            .map(|e| Endpoint {
                url: e.endpoint_url.as_ref().to_string(),
                security_policy_uri: e.security_policy_uri.as_ref().to_string(),
                security_mode: SecurityMode::from_value(e.security_mode as u32),
                security_level: e.security_level,
            })
            .collect())
    }

    async fn set_security_mode(&self, mode: SecurityMode) -> UaResult<()> {
        if mode == SecurityMode::Invalid {
            return Err(UaError::security(SecurityError::mode_not_supported(mode.to_string())));
        }
        *self.security_mode.lock() = mode;
        Ok(())
    }

    async fn connect(&self, request: &ConnectRequest) -> UaResult<()> {
        let url = request.endpoint.url.clone();
        info!(endpoint = %request.endpoint, "Opening OPC UA session");

        match (&self.config.pki_dir, request.certificate.is_some() || !request.trust_list.is_empty()) {
            (Some(pki_dir), true) => {
                let pki_dir = PathBuf::from(pki_dir);
                let request = request.clone();
                tokio::task::spawn_blocking(move || Self::install_pki(&pki_dir, &request))
                    .await
                    .map_err(|e| UaError::security(SecurityError::certificate(e.to_string())))?
                    .map_err(|e| UaError::security(SecurityError::certificate(e.to_string())))?;
            }
            (None, true) => warn!("No PKI directory configured; certificate material ignored"),
            _ => {}
        }

        let mut client = self.build_client(&url)?;
        let mode = match *self.security_mode.lock() {
            SecurityMode::None => ua::MessageSecurityMode::None,
            SecurityMode::Sign => ua::MessageSecurityMode::Sign,
            SecurityMode::SignAndEncrypt => ua::MessageSecurityMode::SignAndEncrypt,
            SecurityMode::Invalid => ua::MessageSecurityMode::Invalid,
        };
        let identity = match &request.identity {
            IdentityToken::Anonymous => UaIdentityToken::Anonymous,
            IdentityToken::UserName { username, password } => {
                UaIdentityToken::UserName(username.clone(), password.clone())
            }
        };
        let policy_uri = request.endpoint.security_policy_uri.clone();
        let user_token_policy = if request.identity.is_anonymous() {
            ua::UserTokenPolicy::anonymous()
        } else {
            ua::UserTokenPolicy {
                policy_id: ua::UAString::from("username"),
                token_type: ua::UserTokenType::UserName,
                issued_token_type: ua::UAString::null(),
                issuer_endpoint_url: ua::UAString::null(),
                security_policy_uri: ua::UAString::null(),
            }
        };

        let session = tokio::task::spawn_blocking(move || {
            let endpoint: ua::EndpointDescription =
                (url.as_str(), policy_uri.as_str(), mode, user_token_policy).into();
            client.connect_to_endpoint(endpoint, identity)
        })
        .await
        .map_err(|e| {
            UaError::connection(ConnectionError::handshake_failed(
                request.endpoint.url.clone(),
                e.to_string(),
            ))
        })?
        .map_err(|status| match status {
            ua::StatusCode::BadUserAccessDenied | ua::StatusCode::BadIdentityTokenRejected => {
                UaError::security(SecurityError::authentication_failed(status.to_string()))
            }
            ua::StatusCode::BadCertificateInvalid | ua::StatusCode::BadCertificateUntrusted => {
                UaError::security(SecurityError::certificate(status.to_string()))
            }
            _ => UaError::connection(ConnectionError::handshake_failed(
                request.endpoint.url.clone(),
                status.to_string(),
            )),
        })?;

        *self.session.write() = Some(session);
        info!(endpoint = %request.endpoint.url, "OPC UA session open");
        Ok(())
    }

    async fn disconnect(&self) -> UaResult<()> {
        let session = self.session.write().take();
        self.notifications.lock().clear();
        if let Some(session) = session {
            tokio::task::spawn_blocking(move || session.read().disconnect())
                .await
                .map_err(|e| {
                    UaError::connection(ConnectionError::handshake_failed("disconnect", e.to_string()))
                })?;
            info!("OPC UA session closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session
            .read()
            .as_ref()
            .is_some_and(|session| session.read().is_connected())
    }

    async fn read_attribute(&self, node_id: &NodeId, attribute: AttributeId) -> UaResult<DataValue> {
        let read_value_id = ua::ReadValueId {
            node_id: to_ua_node_id(node_id),
            attribute_id: attribute.value(),
            index_range: ua::UAString::null(),
            data_encoding: ua::QualifiedName::null(),
        };
        trace!(node_id = %node_id, attribute = %attribute, "Reading attribute");

        let results = self
            .with_session(move |s| s.read(&[read_value_id], ua::TimestampsToReturn::Both, 0.0))
            .await?
            .map_err(|status| UaError::read_failed(node_id.to_string(), status.to_string()))?;

        Ok(results
            .first()
            .map(from_ua_data_value)
            .unwrap_or_else(|| DataValue::from_status(StatusCode::BAD_UNEXPECTED_ERROR)))
    }

    async fn write_attribute(
        &self,
        node_id: &NodeId,
        attribute: AttributeId,
        value: DataValue,
    ) -> UaResult<StatusCode> {
        let write_value = ua::WriteValue {
            node_id: to_ua_node_id(node_id),
            attribute_id: attribute.value(),
            index_range: ua::UAString::null(),
            value: ua::DataValue::new_now(to_ua_variant(&value.value)?),
        };
        trace!(node_id = %node_id, attribute = %attribute, "Writing attribute");

        let results = self
            .with_session(move |s| s.write(&[write_value]))
            .await?
            .map_err(|status| UaError::write_failed(node_id.to_string(), status.to_string()))?;

        Ok(results
            .first()
            .map(|status| StatusCode(status.bits()))
            .unwrap_or(StatusCode::BAD_UNEXPECTED_ERROR))
    }

    async fn browse(
        &self,
        node_id: &NodeId,
        direction: BrowseDirection,
    ) -> UaResult<Vec<ReferenceDescription>> {
        let description = ua::BrowseDescription {
            node_id: to_ua_node_id(node_id),
            browse_direction: match direction {
                BrowseDirection::Forward => ua::BrowseDirection::Forward,
                BrowseDirection::Inverse => ua::BrowseDirection::Inverse,
                BrowseDirection::Both => ua::BrowseDirection::Both,
            },
            reference_type_id: ua::ReferenceTypeId::HierarchicalReferences.into(),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: ua::BrowseDescriptionResultMask::all().bits(),
        };
        trace!(node_id = %node_id, ?direction, "Browsing");

        let results = self
            .with_session(move |s| s.browse(&[description]))
            .await?
            .map_err(|status| UaError::browse(BrowseError::failed(node_id.to_string(), status.to_string())))?
            .unwrap_or_default();

        let Some(result) = results.into_iter().next() else {
            return Ok(Vec::new());
        };
        if result.status_code.is_bad() {
            return Err(UaError::browse(BrowseError::bad_status(
                node_id.to_string(),
                StatusCode(result.status_code.bits()),
            )));
        }

        Ok(result
            .references
            .unwrap_or_default()
            .iter()
            .map(|r| ReferenceDescription {
                reference_type_id: from_ua_node_id(&r.reference_type_id),
                is_forward: r.is_forward,
                node_id: from_ua_node_id(&r.node_id.node_id),
                browse_name: QualifiedName::new(r.browse_name.namespace_index, r.browse_name.name.as_ref()),
                display_name: LocalizedText::new(r.display_name.locale.as_ref(), r.display_name.text.as_ref()),
                node_class: NodeClass::from_value(r.node_class as u32),
                type_definition: Some(from_ua_node_id(&r.type_definition.node_id))
                    .filter(|id| !id.is_null()),
            })
            .collect())
    }

    async fn call_method(
        &self,
        object_id: &NodeId,
        method_id: &NodeId,
        arguments: Vec<Variant>,
    ) -> UaResult<Vec<Variant>> {
        let input_arguments = arguments
            .iter()
            .map(to_ua_variant)
            .collect::<UaResult<Vec<_>>>()?;
        let request = ua::CallMethodRequest {
            object_id: to_ua_node_id(object_id),
            method_id: to_ua_node_id(method_id),
            input_arguments: Some(input_arguments),
        };
        debug!(object_id = %object_id, method_id = %method_id, "Calling method");

        let call_failed = |message: String| {
            UaError::operation(OperationError::call_failed(
                object_id.to_string(),
                method_id.to_string(),
                message,
            ))
        };

        let result = self
            .with_session(move |s| s.call(request))
            .await?
            .map_err(|status| call_failed(status.to_string()))?;
        if result.status_code.is_bad() {
            return Err(call_failed(result.status_code.to_string()));
        }

        Ok(result
            .output_arguments
            .unwrap_or_default()
            .iter()
            .map(from_ua_variant)
            .collect())
    }

    async fn create_subscription(&self, parameters: &SubscriptionParameters) -> UaResult<u32> {
        let p = parameters.clone();
        let collector = NotificationCollector {
            queue: Arc::clone(&self.notifications),
        };

        let id = self
            .with_session(move |s| {
                s.create_subscription(
                    p.publishing_interval.as_secs_f64() * 1000.0,
                    p.lifetime_count,
                    p.max_keep_alive_count,
                    p.max_notifications_per_publish,
                    p.priority,
                    p.publishing_enabled,
                    collector,
                )
            })
            .await?
            .map_err(|status| UaError::subscription(SubscriptionError::creation_failed(status.to_string())))?;

        debug!(subscription_id = id, "Server subscription created");
        Ok(id)
    }

    async fn modify_subscription(
        &self,
        subscription_id: u32,
        parameters: &SubscriptionParameters,
    ) -> UaResult<()> {
        let p = parameters.clone();
        self.with_session(move |s| {
            s.modify_subscription(
                subscription_id,
                p.publishing_interval.as_secs_f64() * 1000.0,
                p.lifetime_count,
                p.max_keep_alive_count,
                p.max_notifications_per_publish,
                p.priority,
            )
        })
        .await?
        .map_err(|status| {
            UaError::subscription(SubscriptionError::modify_failed(subscription_id, status.to_string()))
        })
    }

    async fn set_publishing_mode(&self, subscription_id: u32, enabled: bool) -> UaResult<()> {
        let results = self
            .with_session(move |s| s.set_publishing_mode(&[subscription_id], enabled))
            .await?
            .map_err(|status| {
                UaError::subscription(SubscriptionError::modify_failed(subscription_id, status.to_string()))
            })?;
        match results.first() {
            Some(status) if status.is_bad() => Err(UaError::subscription(
                SubscriptionError::modify_failed(subscription_id, status.to_string()),
            )),
            _ => Ok(()),
        }
    }

    async fn delete_subscription(&self, subscription_id: u32) -> UaResult<()> {
        let status = self
            .with_session(move |s| s.delete_subscription(subscription_id))
            .await?
            .map_err(|status| {
                UaError::subscription(SubscriptionError::delete_failed(subscription_id, status.to_string()))
            })?;
        if status.is_bad() {
            return Err(UaError::subscription(SubscriptionError::delete_failed(
                subscription_id,
                status.to_string(),
            )));
        }
        Ok(())
    }

    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        request: &MonitoredItemRequest,
    ) -> UaResult<u32> {
        let filter = match request.kind {
            MonitoredItemKind::DataChange => ua::ExtensionObject::null(),
            MonitoredItemKind::Event => event_filter(),
        };
        let create = ua::MonitoredItemCreateRequest {
            item_to_monitor: ua::ReadValueId {
                node_id: to_ua_node_id(&request.node_id),
                attribute_id: request.attribute_id,
                index_range: ua::UAString::null(),
                data_encoding: ua::QualifiedName::null(),
            },
            monitoring_mode: match request.parameters.mode {
                MonitoringMode::Disabled => ua::MonitoringMode::Disabled,
                MonitoringMode::Sampling => ua::MonitoringMode::Sampling,
                MonitoringMode::Reporting => ua::MonitoringMode::Reporting,
            },
            requested_parameters: ua::MonitoringParameters {
                client_handle: request.client_handle,
                sampling_interval: request.parameters.sampling_interval.as_secs_f64() * 1000.0,
                filter,
                queue_size: request.parameters.queue_size,
                discard_oldest: request.parameters.discard_oldest,
            },
        };

        let node_id = request.node_id.to_string();
        let results = self
            .with_session(move |s| {
                s.create_monitored_items(subscription_id, ua::TimestampsToReturn::Both, &[create])
            })
            .await?
            .map_err(|status| {
                UaError::subscription(SubscriptionError::monitored_item_failed(node_id.clone(), status.to_string()))
            })?;

        let result = results.first().ok_or_else(|| {
            UaError::subscription(SubscriptionError::monitored_item_failed(
                request.node_id.to_string(),
                "empty response",
            ))
        })?;
        if result.status_code.is_bad() {
            return Err(UaError::subscription(SubscriptionError::bad_status(
                request.node_id.to_string(),
                StatusCode(result.status_code.bits()),
            )));
        }
        Ok(result.monitored_item_id)
    }

    async fn delete_monitored_items(&self, subscription_id: u32, item_ids: &[u32]) -> UaResult<()> {
        if item_ids.is_empty() {
            return Ok(());
        }
        let ids = item_ids.to_vec();
        self.with_session(move |s| s.delete_monitored_items(subscription_id, &ids))
            .await?
            .map_err(|status| {
                UaError::subscription(SubscriptionError::monitored_item_failed(
                    format!("subscription {subscription_id}"),
                    status.to_string(),
                ))
            })?;
        Ok(())
    }

    async fn process_events(&self) -> UaResult<Vec<Notification>> {
        let Some(session) = self.session.read().clone() else {
            return Ok(self.drain_notifications());
        };
        let runtime = tokio::runtime::Handle::current();
        let polled = tokio::task::spawn_blocking(move || {
            runtime.block_on(async move { session.write().poll().await })
        })
        .await
        .map_err(|e| UaError::connection(ConnectionError::handshake_failed("poll", e.to_string())))?;
        if polled.is_err() {
            return Err(UaError::connection(ConnectionError::NotConnected));
        }
        Ok(self.drain_notifications())
    }
}

impl OpcUaTransport {
    fn drain_notifications(&self) -> Vec<Notification> {
        self.notifications.lock().drain(..).collect()
    }
}

// =============================================================================
// Notification collection
// =============================================================================

/// Subscription callback that queues notifications for the next poll.
struct NotificationCollector {
    queue: NotificationQueue,
}

impl OnSubscriptionNotification for NotificationCollector {
    fn on_data_change(&mut self, items: &[&UaMonitoredItem]) {
        let mut queue = self.queue.lock();
        for item in items {
            queue.push_back(data_change_notification(item.client_handle(), item.last_value()));
        }
    }

    fn on_event(&mut self, events: &ua::EventNotificationList) {
        let mut queue = self.queue.lock();
        for event in events.events.iter().flatten() {
            queue.push_back(event_notification(event));
        }
    }
}

fn data_change_notification(client_handle: u32, value: &ua::DataValue) -> Notification {
    Notification::DataChange {
        client_handle,
        value: from_ua_data_value(value),
    }
}

fn event_notification(event: &ua::EventFieldList) -> Notification {
    Notification::Event {
        client_handle: event.client_handle,
        fields: event
            .event_fields
            .iter()
            .flatten()
            .map(from_ua_variant)
            .collect(),
    }
}

/// Selects the common BaseEventType fields.
fn event_filter() -> ua::ExtensionObject {
    let select = |name: &str| ua::SimpleAttributeOperand {
        type_definition_id: ua::ObjectTypeId::BaseEventType.into(),
        browse_path: Some(vec![ua::QualifiedName::new(0, name)]),
        attribute_id: AttributeId::Value.value(),
        index_range: ua::UAString::null(),
    };
    let filter = ua::EventFilter {
        select_clauses: Some(
            ["EventId", "EventType", "SourceName", "Time", "Message", "Severity"]
                .into_iter()
                .map(select)
                .collect(),
        ),
        where_clause: ua::ContentFilter { elements: None },
    };
    ua::ExtensionObject::from_encodable(ua::ObjectId::EventFilter_Encoding_DefaultBinary, &filter)
}

// =============================================================================
// Conversions
// =============================================================================

fn to_ua_node_id(node_id: &NodeId) -> ua::NodeId {
    let ns = node_id.namespace_index;
    match &node_id.identifier {
        NodeIdentifier::Numeric(v) => ua::NodeId::new(ns, *v),
        NodeIdentifier::String(v) => ua::NodeId::new(ns, v.clone()),
        NodeIdentifier::Guid(v) => ua::NodeId::new(ns, ua::Guid::from(*v)),
        NodeIdentifier::Opaque(v) => ua::NodeId::new(ns, ua::ByteString::from(v.as_slice())),
    }
}

fn from_ua_node_id(node_id: &ua::NodeId) -> NodeId {
    let ns = node_id.namespace;
    match &node_id.identifier {
        ua::Identifier::Numeric(v) => NodeId::numeric(ns, *v),
        ua::Identifier::String(v) => NodeId::string(ns, v.as_ref()),
        ua::Identifier::Guid(v) => NodeId::guid(ns, uuid::Uuid::from_bytes(*v.as_bytes())),
        ua::Identifier::ByteString(v) => NodeId::opaque(ns, v.value.clone().unwrap_or_default()),
    }
}

fn to_chrono(dt: &ua::DateTime) -> chrono::DateTime<chrono::Utc> {
    dt.as_chrono()
}

fn from_ua_data_value(value: &ua::DataValue) -> DataValue {
    DataValue {
        value: value.value.as_ref().map(from_ua_variant).unwrap_or_default(),
        status: value
            .status
            .as_ref()
            .map(|s| StatusCode(s.bits()))
            .unwrap_or(StatusCode::GOOD),
        source_timestamp: value.source_timestamp.as_ref().map(to_chrono),
        source_picoseconds: value.source_picoseconds.unwrap_or(0),
        server_timestamp: value.server_timestamp.as_ref().map(to_chrono),
        server_picoseconds: value.server_picoseconds.unwrap_or(0),
    }
}

fn from_ua_variant(variant: &ua::Variant) -> Variant {
    use ua::Variant as V;

    match variant {
        V::Empty => Variant::Empty,
        V::Boolean(v) => Variant::Boolean(*v),
        V::SByte(v) => Variant::SByte(*v),
        V::Byte(v) => Variant::Byte(*v),
        V::Int16(v) => Variant::Int16(*v),
        V::UInt16(v) => Variant::UInt16(*v),
        V::Int32(v) => Variant::Int32(*v),
        V::UInt32(v) => Variant::UInt32(*v),
        V::Int64(v) => Variant::Int64(*v),
        V::UInt64(v) => Variant::UInt64(*v),
        V::Float(v) => Variant::Float(*v),
        V::Double(v) => Variant::Double(*v),
        V::String(v) => Variant::String(v.as_ref().to_string()),
        V::DateTime(v) => Variant::DateTime(to_chrono(v)),
        V::Guid(v) => Variant::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
        V::StatusCode(v) => Variant::StatusCode(StatusCode(v.bits())),
        V::ByteString(v) => Variant::ByteString(v.value.clone().unwrap_or_default()),
        V::NodeId(v) => Variant::NodeId(from_ua_node_id(v)),
        V::QualifiedName(v) => Variant::QualifiedName(QualifiedName::new(v.namespace_index, v.name.as_ref())),
        V::LocalizedText(v) => Variant::LocalizedText(LocalizedText::new(v.locale.as_ref(), v.text.as_ref())),
        V::Array(array) => {
            let values: Vec<Variant> = array.values.iter().map(from_ua_variant).collect();
            match VariantArray::from_values(values) {
                Ok(array) => Variant::Array(array),
                Err(_) => Variant::Complex(format!("{variant:?}")),
            }
        }
        other => Variant::Complex(format!("{other:?}")),
    }
}

fn to_ua_variant(value: &Variant) -> UaResult<ua::Variant> {
    use ua::Variant as V;

    Ok(match value {
        Variant::Empty => V::Empty,
        Variant::Boolean(v) => V::Boolean(*v),
        Variant::SByte(v) => V::SByte(*v),
        Variant::Byte(v) => V::Byte(*v),
        Variant::Int16(v) => V::Int16(*v),
        Variant::UInt16(v) => V::UInt16(*v),
        Variant::Int32(v) => V::Int32(*v),
        Variant::UInt32(v) => V::UInt32(*v),
        Variant::Int64(v) => V::Int64(*v),
        Variant::UInt64(v) => V::UInt64(*v),
        Variant::Float(v) => V::Float(*v),
        Variant::Double(v) => V::Double(*v),
        Variant::String(v) => V::String(ua::UAString::from(v.as_str())),
        Variant::DateTime(v) => V::DateTime(Box::new(ua::DateTime::from(*v))),
        Variant::Guid(v) => V::Guid(Box::new(ua::Guid::from(*v))),
        Variant::StatusCode(v) => V::StatusCode(ua::StatusCode::from_bits_truncate(v.0)),
        Variant::ByteString(v) => V::ByteString(ua::ByteString::from(v.as_slice())),
        Variant::NodeId(v) => V::NodeId(Box::new(to_ua_node_id(v))),
        Variant::QualifiedName(v) => {
            V::QualifiedName(Box::new(ua::QualifiedName::new(v.namespace_index, v.name.as_str())))
        }
        Variant::LocalizedText(v) => {
            V::LocalizedText(Box::new(ua::LocalizedText::new(v.locale.as_str(), v.text.as_str())))
        }
        Variant::Array(array) => {
            let values = array
                .values()
                .iter()
                .map(to_ua_variant)
                .collect::<UaResult<Vec<_>>>()?;
            let type_id = values
                .first()
                .map(|v| v.type_id())
                .unwrap_or(ua::VariantTypeId::Empty);
            let array = ua::Array::new(type_id, values).map_err(|status| {
                UaError::conversion(ConversionError::type_mismatch("homogeneous array", status.to_string()))
            })?;
            V::Array(Box::new(array))
        }
        Variant::Complex(text) => {
            return Err(UaError::conversion(ConversionError::type_mismatch(
                "encodable value",
                format!("complex value {text}"),
            )))
        }
    })
}

// =============================================================================
// Factory
// =============================================================================

/// Creates one [`OpcUaTransport`] per connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpcUaTransportFactory;

impl TransportFactory for OpcUaTransportFactory {
    fn create(&self, config: &ClientConfig) -> UaResult<Arc<dyn UaTransport>> {
        Ok(Arc::new(OpcUaTransport::new(config.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_conversion() {
        for node in [
            NodeId::numeric(2, 1001),
            NodeId::string(2, "Line1.Speed"),
            NodeId::guid(1, uuid::Uuid::new_v4()),
            NodeId::opaque(3, vec![1, 2, 3]),
        ] {
            assert_eq!(from_ua_node_id(&to_ua_node_id(&node)), node);
        }
    }

    #[test]
    fn test_variant_conversion() {
        for value in [
            Variant::Boolean(true),
            Variant::Double(3.5),
            Variant::from("Hello"),
            Variant::LocalizedText(LocalizedText::new("en", "Root")),
            Variant::from(vec![1u32, 2, 3]),
        ] {
            assert_eq!(from_ua_variant(&to_ua_variant(&value).unwrap()), value);
        }
        assert!(to_ua_variant(&Variant::Complex("x".into())).is_err());
    }

    #[tokio::test]
    async fn test_collected_notifications_drain_in_order() {
        let transport = OpcUaTransport::new(ClientConfig::default());
        let mut collector = NotificationCollector {
            queue: Arc::clone(&transport.notifications),
        };
        transport
            .notifications
            .lock()
            .push_back(data_change_notification(3, &ua::DataValue::value_only(2.5f64)));
        collector.on_event(&ua::EventNotificationList {
            events: Some(vec![ua::EventFieldList {
                client_handle: 7,
                event_fields: Some(vec![ua::Variant::from("Overheat")]),
            }]),
        });

        let drained = transport.process_events().await.unwrap();
        assert_eq!(drained.len(), 2);
        match &drained[0] {
            Notification::DataChange { client_handle, value } => {
                assert_eq!(*client_handle, 3);
                assert_eq!(value.value, Variant::Double(2.5));
            }
            other => panic!("expected DataChange, got {other:?}"),
        }
        match &drained[1] {
            Notification::Event { client_handle, fields } => {
                assert_eq!(*client_handle, 7);
                assert_eq!(fields, &vec![Variant::from("Overheat")]);
            }
            other => panic!("expected Event, got {other:?}"),
        }
        assert!(transport.process_events().await.unwrap().is_empty());
    }

    #[test]
    fn test_transport_starts_disconnected() {
        let transport = OpcUaTransport::new(ClientConfig::default());
        assert!(!transport.is_connected());
    }
}
