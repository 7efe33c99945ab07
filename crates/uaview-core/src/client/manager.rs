// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registry of live connections.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::client::builder::ConnectionBuilder;
use crate::client::connection::Connection;
use crate::config::ClientConfig;
use crate::error::UaResult;
use crate::transport::{TransportFactory, UaTransport};

// =============================================================================
// Connection Manager
// =============================================================================

/// Owns every connection created through it.
///
/// Ids start at 1, increase by one per created connection and are never
/// reused, even after a connection is closed. The manager is a cheap handle;
/// clones share one registry. Pass it to whoever needs to look connections
/// up.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: ClientConfig,
    factory: Arc<dyn TransportFactory>,
    connections: DashMap<u64, Arc<Connection>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    /// Creates a manager whose connections use transports from `factory`.
    pub fn new(config: ClientConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                factory,
                connections: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the client configuration shared by all connections.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Starts a new connection builder.
    pub fn builder(&self) -> ConnectionBuilder {
        ConnectionBuilder::new(self.clone())
    }

    pub(crate) fn create_transport(&self) -> UaResult<Arc<dyn UaTransport>> {
        self.inner.factory.create(&self.inner.config)
    }

    /// Consumes `builder` and registers the connection it describes.
    ///
    /// No id is consumed when the builder is incomplete.
    pub fn create_connection<S>(&self, builder: ConnectionBuilder<S>) -> UaResult<Arc<Connection>> {
        let (settings, sink, transport) = builder.into_parts()?;
        let transport = match transport {
            Some(transport) => transport,
            None => self.create_transport()?,
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let connection = Connection::new(id, self.inner.config.clone(), transport, settings, sink);
        self.inner.connections.insert(id, Arc::clone(&connection));

        tracing::info!(
            connection_id = id,
            endpoint = %connection.endpoint(),
            "Connection created"
        );

        Ok(connection)
    }

    /// Returns the connection with `id`, if it is still registered.
    pub fn get_connection(&self, id: u64) -> Option<Arc<Connection>> {
        self.inner.connections.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Returns the ids of registered connections in ascending order.
    pub fn connection_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.inner.connections.iter().map(|r| *r.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the number of registered connections.
    pub fn len(&self) -> usize {
        self.inner.connections.len()
    }

    /// Returns `true` when no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.connections.is_empty()
    }

    /// Closes and unregisters connection `id`.
    ///
    /// Returns `false` for unknown ids; that is not an error.
    pub async fn close_connection(&self, id: u64) -> bool {
        let Some((_, connection)) = self.inner.connections.remove(&id) else {
            tracing::debug!(connection_id = id, "Close requested for unknown connection");
            return false;
        };
        connection.close().await;
        true
    }

    /// Closes and unregisters every connection.
    pub async fn close_all_connections(&self) {
        let ids = self.connection_ids();
        for id in &ids {
            self.close_connection(*id).await;
        }
        tracing::info!(count = ids.len(), "All connections closed");
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connection_ids())
            .field("next_id", &self.inner.next_id.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::connection::ConnectionState;
    use crate::client::sink::TracingSink;
    use crate::endpoint::Endpoint;
    use crate::mock::MockServer;

    fn build(manager: &ConnectionManager, server: &MockServer) -> Arc<Connection> {
        manager
            .builder()
            .endpoint(Endpoint::unsecured(server.url()))
            .sink(Arc::new(TracingSink))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_ids_are_monotonic_and_never_reused() {
        let server = MockServer::with_standard_nodes();
        let manager = ConnectionManager::new(ClientConfig::default(), server.factory());

        let ids: Vec<u64> = (0..3).map(|_| build(&manager, &server).id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert!(manager.close_connection(2).await);
        assert_eq!(manager.connection_ids(), vec![1, 3]);
        assert_eq!(build(&manager, &server).id(), 4);
    }

    #[tokio::test]
    async fn test_failed_build_consumes_no_id() {
        let server = MockServer::with_standard_nodes();
        let manager = ConnectionManager::new(ClientConfig::default(), server.factory());
        assert!(manager.builder().sink(Arc::new(TracingSink)).build().is_err());
        assert_eq!(build(&manager, &server).id(), 1);
    }

    #[tokio::test]
    async fn test_lookup_and_close_all() {
        let server = MockServer::with_standard_nodes();
        let manager = ConnectionManager::new(ClientConfig::default(), server.factory());
        let first = build(&manager, &server);
        build(&manager, &server);

        assert!(manager.get_connection(1).is_some());
        assert!(manager.get_connection(99).is_none());
        assert!(!manager.close_connection(99).await);

        manager.close_all_connections().await;
        assert!(manager.is_empty());
        assert_eq!(first.state(), ConnectionState::Closed);
        assert!(!manager.close_connection(1).await);
    }
}
