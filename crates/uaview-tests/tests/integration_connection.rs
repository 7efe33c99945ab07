// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connection lifecycle integration tests.
//!
//! - Builder: discovery outcomes and required fields
//! - Manager: id allocation and registry
//! - State machine: Idle, Connecting, Connected, Closed

use std::sync::Arc;
use std::time::Duration;

use uaview_core::mock::MockServer;
use uaview_core::{
    ChannelSink, ClientEvent, ConnectionManager, ConnectionState, Endpoint, SecurityMode,
    TracingSink,
};
use uaview_tests::common::init_test_logging;
use uaview_tests::prelude::*;

// =============================================================================
// Builder
// =============================================================================

#[tokio::test]
async fn test_build_without_endpoint_fails() {
    init_test_logging();
    let server = ServerFixtures::standard();
    let manager = ConnectionManager::new(ConfigFixtures::fast(), server.factory());

    let result = manager
        .builder()
        .url(server.url())
        .credentials("operator", "secret")
        .sink(Arc::new(TracingSink))
        .build();

    assert!(result.is_err());
    assert!(manager.is_empty());
}

#[tokio::test]
async fn test_find_endpoints_then_select() {
    init_test_logging();
    let server = ServerFixtures::standard();
    let manager = ConnectionManager::new(ConfigFixtures::fast(), server.factory());
    let (sink, mut events) = ChannelSink::with_channel(16);

    let builder = manager
        .builder()
        .url(server.url())
        .sink(Arc::new(sink))
        .find_endpoints()
        .await;
    assert_eq!(builder.endpoints().len(), 2);

    match events.recv().await {
        Some(ClientEvent::EndpointsDiscovered { url, endpoints }) => {
            assert_eq!(url, server.url());
            assert_eq!(endpoints.len(), 2);
        }
        other => panic!("expected EndpointsDiscovered, got {other:?}"),
    }

    let connection = builder.select_most_secure().build().unwrap();
    assert_eq!(connection.endpoint().security_mode, SecurityMode::SignAndEncrypt);
    connection.connect().await.unwrap();
    assert_eq!(server.security_mode(), SecurityMode::SignAndEncrypt);
}

#[tokio::test]
async fn test_find_endpoints_unreachable_url_is_empty() {
    init_test_logging();
    let server = ServerFixtures::standard();
    let manager = ConnectionManager::new(ConfigFixtures::fast(), server.factory());

    let builder = assert_completes(
        Duration::from_secs(2),
        manager
            .builder()
            .url("opc.tcp://unreachable.invalid:4840")
            .find_endpoints(),
    )
    .await;

    assert!(builder.endpoints().is_empty());
    assert!(builder.build().is_err());
}

#[tokio::test]
async fn test_find_endpoints_gives_up_on_silent_server() {
    init_test_logging();
    let server = ServerFixtures::standard();
    server.hang_discovery(true);
    let manager = ConnectionManager::new(ConfigFixtures::fast(), server.factory());

    let builder = assert_completes(
        Duration::from_secs(2),
        manager.builder().url(server.url()).find_endpoints(),
    )
    .await;

    assert!(builder.endpoints().is_empty());
}

// =============================================================================
// Manager
// =============================================================================

#[tokio::test]
async fn test_ids_are_never_reused() {
    init_test_logging();
    let server = ServerFixtures::standard();
    let manager = ConnectionManager::new(ConfigFixtures::fast(), server.factory());
    let build = || {
        manager
            .builder()
            .endpoint(Endpoint::unsecured(server.url()))
            .sink(Arc::new(TracingSink))
            .build()
            .unwrap()
    };

    let ids: Vec<u64> = (0..3).map(|_| build().id()).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    assert!(manager.close_connection(2).await);
    assert!(manager.get_connection(2).is_none());
    assert_eq!(build().id(), 4);
    assert_eq!(manager.connection_ids(), vec![1, 3, 4]);
}

// =============================================================================
// State machine
// =============================================================================

#[tokio::test]
async fn test_connect_reports_connected() {
    let mut client = TestClient::build(ServerFixtures::standard());
    assert_eq!(client.connection.state(), ConnectionState::Idle);

    client.connection.connect().await.unwrap();
    assert_eq!(client.connection.state(), ConnectionState::Connected);

    match client.next_event(Duration::from_secs(1)).await {
        Some(ClientEvent::Connected {
            connection_id,
            endpoint_url,
        }) => {
            assert_eq!(connection_id, client.connection.id());
            assert_eq!(endpoint_url, client.server.url());
        }
        other => panic!("expected Connected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_twice_is_a_no_op() {
    let mut client = TestClient::connect(ServerFixtures::standard()).await;

    client.connection.connect().await.unwrap();

    assert_eq!(client.server.connect_count(), 1);
    assert!(client.next_event(Duration::from_millis(50)).await.is_none());
}

#[tokio::test]
async fn test_failed_connect_returns_to_idle_and_can_retry() {
    let mut client = TestClient::build(ServerFixtures::standard());
    client.server.fail_next_connect("certificate rejected");

    assert!(client.connection.connect().await.is_err());
    assert_eq!(client.connection.state(), ConnectionState::Idle);
    match client.next_event(Duration::from_secs(1)).await {
        Some(ClientEvent::ConnectFailed { reason, .. }) => {
            assert!(reason.contains("certificate rejected"));
        }
        other => panic!("expected ConnectFailed, got {other:?}"),
    }

    client.connection.connect().await.unwrap();
    assert_eq!(client.connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_connect_and_run_reports_in_background() {
    let mut client = TestClient::build(ServerFixtures::standard());

    let handle = client.connection.connect_and_run();
    assert!(matches!(
        client.next_event(Duration::from_secs(1)).await,
        Some(ClientEvent::Connected { .. })
    ));
    handle.await.unwrap().unwrap();
    assert!(client.connection.is_connected());
}

#[tokio::test]
async fn test_close_is_terminal() {
    let mut client = TestClient::connect(ServerFixtures::standard()).await;

    client.connection.close().await;
    assert_eq!(client.connection.state(), ConnectionState::Closed);
    assert!(!client.server.is_connected());
    assert!(matches!(
        client.next_event(Duration::from_secs(1)).await,
        Some(ClientEvent::Disconnected { .. })
    ));

    client.connection.close().await;
    assert!(client.next_event(Duration::from_millis(50)).await.is_none());

    assert!(client.connection.connect().await.is_err());
    assert!(client.connection.root_node().await.is_none());
    assert_eq!(client.server.connect_count(), 1);
}

#[tokio::test]
async fn test_close_of_idle_connection_skips_disconnect() {
    let server = MockServer::with_standard_nodes();
    server.set_connected(true);
    let client = TestClient::build(server);

    client.connection.close().await;

    assert!(client.connection.state().is_closed());
    assert!(client.server.is_connected());
}

#[tokio::test]
async fn test_poll_loop_ticks_while_connected() {
    let client = TestClient::connect(ServerFixtures::standard()).await;

    assert!(wait_until(Duration::from_secs(1), || client.server.poll_count() >= 3).await);
    assert!(client.connection.stats().poll_ticks >= 3);

    client.connection.close().await;
    let polls = client.server.poll_count();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.server.poll_count(), polls);
}
