// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Single-use connection builder.
//!
//! Every step takes the builder by value. Endpoint discovery moves it from
//! [`Unresolved`] to [`Resolved`], so it can run at most once and the URL is
//! frozen afterwards. [`ConnectionBuilder::build`] consumes the builder and
//! hands its fields to the [`ConnectionManager`].
//!
//! # Example
//!
//! ```rust,ignore
//! let builder = manager
//!     .builder()
//!     .url("opc.tcp://plc.local:4840")
//!     .sink(Arc::new(TracingSink))
//!     .find_endpoints()
//!     .await;
//! let connection = builder.select_most_secure().build()?;
//! connection.connect_and_run();
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::connection::{Connection, ConnectionSettings};
use crate::client::manager::ConnectionManager;
use crate::client::sink::{ClientEvent, EventSink};
use crate::credentials::{CredentialStore, Credentials};
use crate::endpoint::{self, Endpoint};
use crate::error::{ConfigurationError, TimeoutError, UaError, UaResult};
use crate::transport::{ClientCertificate, UaTransport};
use crate::types::SecurityMode;

// =============================================================================
// Typestate
// =============================================================================

/// Endpoint discovery has not run.
#[derive(Debug, Default)]
pub struct Unresolved;

/// Endpoint discovery has run.
#[derive(Debug, Default)]
pub struct Resolved {
    endpoints: Vec<Endpoint>,
}

// =============================================================================
// ConnectionBuilder
// =============================================================================

/// Accumulates everything needed to open one connection.
pub struct ConnectionBuilder<S = Unresolved> {
    manager: ConnectionManager,
    state: S,
    url: Option<String>,
    endpoint: Option<Endpoint>,
    credentials: Option<Credentials>,
    certificate: Option<ClientCertificate>,
    trust_list: Vec<Vec<u8>>,
    revoked_list: Vec<Vec<u8>>,
    sink: Option<Arc<dyn EventSink>>,
    transport: Option<Arc<dyn UaTransport>>,
}

impl ConnectionBuilder<Unresolved> {
    pub(crate) fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            state: Unresolved,
            url: None,
            endpoint: None,
            credentials: None,
            certificate: None,
            trust_list: Vec::new(),
            revoked_list: Vec::new(),
            sink: None,
            transport: None,
        }
    }

    /// Sets the discovery URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Queries the URL for its endpoints.
    ///
    /// Never fails: an unset, malformed or unreachable URL, or a server
    /// that does not answer within the discovery timeout, yields an empty
    /// list. The outcome is also sent to the sink as `EndpointsDiscovered`.
    pub async fn find_endpoints(mut self) -> ConnectionBuilder<Resolved> {
        let url = self.url.clone().unwrap_or_default();
        let endpoints = match self.discover(&url).await {
            Ok(endpoints) => {
                info!(url = %url, count = endpoints.len(), "Endpoints discovered");
                endpoints
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Endpoint discovery failed");
                Vec::new()
            }
        };

        if let Some(sink) = &self.sink {
            sink.on_event(ClientEvent::EndpointsDiscovered {
                url,
                endpoints: endpoints.clone(),
            })
            .await;
        }

        self.with_state(Resolved { endpoints })
    }

    async fn discover(&mut self, url: &str) -> UaResult<Vec<Endpoint>> {
        if url.is_empty() {
            return Err(UaError::missing_field("url"));
        }
        endpoint::validate_url(url)?;

        let transport = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => {
                let transport = self.manager.create_transport()?;
                self.transport = Some(Arc::clone(&transport));
                transport
            }
        };

        let timeout = self.manager.config().discovery_timeout;
        debug!(url, ?timeout, "Discovering endpoints");
        match tokio::time::timeout(timeout, transport.discover_endpoints(url)).await {
            Ok(result) => result,
            Err(_) => Err(UaError::timeout(TimeoutError::new("find_endpoints", timeout))),
        }
    }
}

impl ConnectionBuilder<Resolved> {
    /// Endpoints found by discovery.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.state.endpoints
    }

    /// Chooses the discovered endpoint at `index`.
    ///
    /// An out-of-range index leaves the endpoint unset, so `build` fails.
    pub fn select_endpoint(mut self, index: usize) -> Self {
        match self.state.endpoints.get(index) {
            Some(endpoint) => self.endpoint = Some(endpoint.clone()),
            None => warn!(
                index,
                available = self.state.endpoints.len(),
                "No discovered endpoint at index"
            ),
        }
        self
    }

    /// Chooses the first discovered endpoint with `mode`.
    pub fn select_security_mode(mut self, mode: SecurityMode) -> Self {
        if let Some(endpoint) = self.state.endpoints.iter().find(|e| e.security_mode == mode) {
            self.endpoint = Some(endpoint.clone());
        } else {
            warn!(mode = %mode, "No discovered endpoint with security mode");
        }
        self
    }

    /// Chooses the discovered endpoint with the highest security level.
    pub fn select_most_secure(mut self) -> Self {
        if let Some(endpoint) = self.state.endpoints.iter().max_by_key(|e| e.security_level) {
            self.endpoint = Some(endpoint.clone());
        }
        self
    }
}

impl<S> ConnectionBuilder<S> {
    fn with_state<T>(self, state: T) -> ConnectionBuilder<T> {
        ConnectionBuilder {
            manager: self.manager,
            state,
            url: self.url,
            endpoint: self.endpoint,
            credentials: self.credentials,
            certificate: self.certificate,
            trust_list: self.trust_list,
            revoked_list: self.revoked_list,
            sink: self.sink,
            transport: self.transport,
        }
    }

    /// Sets the endpoint to connect to.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets username and password. Both must be non-empty to be used.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the client certificate.
    pub fn certificate(mut self, certificate: ClientCertificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Sets trusted server certificates.
    pub fn trust_list(mut self, list: Vec<Vec<u8>>) -> Self {
        self.trust_list = list;
        self
    }

    /// Sets revoked certificates.
    pub fn revoked_list(mut self, list: Vec<Vec<u8>>) -> Self {
        self.revoked_list = list;
        self
    }

    /// Sets the event sink. Required by [`build`](Self::build).
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Copies credentials and certificate material stored under `id`.
    ///
    /// Parts the profile does not carry keep their current values.
    pub async fn credentials_from(mut self, store: &dyn CredentialStore, id: &str) -> UaResult<Self> {
        let profile = store.load(id).await?.ok_or_else(|| {
            UaError::configuration(ConfigurationError::invalid_value(
                "credentials",
                format!("no profile '{id}' in {} store", store.name()),
            ))
        })?;

        if profile.credentials.is_some() {
            self.credentials = profile.credentials;
        }
        if profile.certificate.is_some() {
            self.certificate = profile.certificate;
        }
        if !profile.trust_list.is_empty() {
            self.trust_list = profile.trust_list;
        }
        if !profile.revoked_list.is_empty() {
            self.revoked_list = profile.revoked_list;
        }
        Ok(self)
    }

    /// Consumes the builder and registers a new connection.
    ///
    /// Fails without producing a connection when no endpoint or no sink
    /// was set.
    pub fn build(self) -> UaResult<Arc<Connection>> {
        let manager = self.manager.clone();
        manager.create_connection(self)
    }

    /// Moves the accumulated fields out, checking the required ones.
    pub(crate) fn into_parts(
        self,
    ) -> UaResult<(ConnectionSettings, Arc<dyn EventSink>, Option<Arc<dyn UaTransport>>)> {
        let endpoint = self.endpoint.ok_or_else(|| UaError::missing_field("endpoint"))?;
        let sink = self.sink.ok_or_else(|| UaError::missing_field("sink"))?;
        endpoint::validate_url(&endpoint.url)?;

        let settings = ConnectionSettings {
            endpoint,
            credentials: self.credentials,
            certificate: self.certificate,
            trust_list: self.trust_list,
            revoked_list: self.revoked_list,
        };
        Ok((settings, sink, self.transport))
    }
}

impl<S: fmt::Debug> fmt::Debug for ConnectionBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("state", &self.state)
            .field("url", &self.url)
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("has_certificate", &self.certificate.is_some())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::sink::{ChannelSink, TracingSink};
    use crate::config::ClientConfig;
    use crate::credentials::{IdentityProfile, MemoryCredentialStore};
    use crate::mock::MockServer;
    use crate::transport::IdentityToken;

    fn manager(server: &MockServer) -> ConnectionManager {
        let config = ClientConfig::builder()
            .discovery_timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        ConnectionManager::new(config, server.factory())
    }

    #[tokio::test]
    async fn test_build_requires_endpoint() {
        let server = MockServer::with_standard_nodes();
        let manager = manager(&server);
        let result = manager
            .builder()
            .url(server.url())
            .credentials("operator", "secret")
            .sink(Arc::new(TracingSink))
            .build();
        assert!(result.is_err());
        assert!(manager.connection_ids().is_empty());
    }

    #[tokio::test]
    async fn test_build_requires_sink() {
        let server = MockServer::with_standard_nodes();
        let manager = manager(&server);
        let result = manager.builder().endpoint(Endpoint::unsecured(server.url())).build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_find_endpoints_and_select() {
        let server = MockServer::with_standard_nodes();
        let (sink, mut rx) = ChannelSink::with_channel(8);
        let builder = manager(&server)
            .builder()
            .url(server.url())
            .sink(Arc::new(sink))
            .find_endpoints()
            .await;
        assert_eq!(builder.endpoints().len(), 2);
        assert!(matches!(
            rx.recv().await,
            Some(ClientEvent::EndpointsDiscovered { ref endpoints, .. }) if endpoints.len() == 2
        ));

        let connection = builder.select_most_secure().build().unwrap();
        assert_eq!(connection.endpoint().security_mode, SecurityMode::SignAndEncrypt);
    }

    #[tokio::test]
    async fn test_find_endpoints_unreachable_is_empty() {
        let server = MockServer::with_standard_nodes();
        let builder = manager(&server)
            .builder()
            .url("opc.tcp://unreachable.invalid:4840")
            .find_endpoints()
            .await;
        assert!(builder.endpoints().is_empty());
        assert!(builder.select_endpoint(0).sink(Arc::new(TracingSink)).build().is_err());
    }

    #[tokio::test]
    async fn test_find_endpoints_times_out() {
        let server = MockServer::with_standard_nodes();
        server.hang_discovery(true);
        let builder = tokio::time::timeout(
            Duration::from_secs(5),
            manager(&server).builder().url(server.url()).find_endpoints(),
        )
        .await
        .unwrap();
        assert!(builder.endpoints().is_empty());
    }

    #[tokio::test]
    async fn test_credentials_from_store() {
        let server = MockServer::with_standard_nodes();
        let store = MemoryCredentialStore::new();
        store
            .save("line1", IdentityProfile::with_credentials("operator", "secret"))
            .await
            .unwrap();

        let connection = manager(&server)
            .builder()
            .endpoint(Endpoint::unsecured(server.url()))
            .sink(Arc::new(TracingSink))
            .credentials_from(&store, "line1")
            .await
            .unwrap()
            .build()
            .unwrap();
        connection.connect().await.unwrap();
        assert!(matches!(
            server.last_identity(),
            Some(IdentityToken::UserName { ref username, .. }) if username == "operator"
        ));

        let missing = manager(&server).builder().credentials_from(&store, "nope").await;
        assert!(missing.is_err());
    }
}
