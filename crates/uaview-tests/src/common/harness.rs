// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! A manager, one connected connection and the receiver of its events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uaview_core::mock::MockServer;
use uaview_core::{ChannelSink, ClientEvent, Connection, ConnectionManager, Endpoint};

use super::fixtures::ConfigFixtures;
use super::init_test_logging;

/// A connected client against a scripted server.
pub struct TestClient {
    /// The scripted server.
    pub server: MockServer,
    /// Registry owning the connection.
    pub manager: ConnectionManager,
    /// The connection under test.
    pub connection: Arc<Connection>,
    /// Events emitted by the connection.
    pub events: mpsc::Receiver<ClientEvent>,
}

impl TestClient {
    /// Builds a connection to `server` without connecting it.
    pub fn build(server: MockServer) -> Self {
        init_test_logging();
        let manager = ConnectionManager::new(ConfigFixtures::fast(), server.factory());
        let (sink, events) = ChannelSink::with_channel(256);
        let connection = manager
            .builder()
            .endpoint(Endpoint::unsecured(server.url()))
            .sink(Arc::new(sink))
            .build()
            .expect("endpoint and sink are set");
        Self {
            server,
            manager,
            connection,
            events,
        }
    }

    /// Builds and connects, consuming the `Connected` event.
    pub async fn connect(server: MockServer) -> Self {
        let mut client = Self::build(server);
        client.connection.connect().await.expect("mock connect succeeds");
        match client.next_event(Duration::from_secs(1)).await {
            Some(ClientEvent::Connected { .. }) => {}
            other => panic!("expected Connected, got {other:?}"),
        }
        client
    }

    /// Waits up to `timeout` for the next event.
    pub async fn next_event(&mut self, timeout: Duration) -> Option<ClientEvent> {
        tokio::time::timeout(timeout, self.events.recv())
            .await
            .ok()
            .flatten()
    }

    /// Collects every event that arrives within `window`.
    pub async fn collect_events(&mut self, window: Duration) -> Vec<ClientEvent> {
        let deadline = tokio::time::Instant::now() + window;
        let mut events = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.events.recv()).await {
            events.push(event);
        }
        events
    }
}
