// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription integration tests.
//!
//! - Data changes update the node cache and reach the sink
//! - Event notifications
//! - Publishing mode, unsubscribe and delete
//! - Nothing is delivered after close

use std::sync::Arc;
use std::time::Duration;

use uaview_core::{
    AttributeId, ChannelSink, ClientEvent, ConnectionManager, DataValue, Endpoint, LocalizedText,
    NodeId, SubscriptionEvent, TracingSink, Variant,
};
use uaview_tests::prelude::*;

const SETTLE: Duration = Duration::from_millis(100);

// =============================================================================
// Data changes
// =============================================================================

#[tokio::test]
async fn test_root_display_name_scenario() {
    let mut client = TestClient::connect(ServerFixtures::standard()).await;
    let root = client.connection.root_node().await.unwrap();
    let subscription = client
        .connection
        .create_subscription(&root, &[AttributeId::DisplayName.value()])
        .await
        .unwrap();
    assert_eq!(subscription.monitored_items().len(), 1);

    let queued = client.server.push_data_change(
        &NodeId::root_folder(),
        AttributeId::DisplayName.value(),
        DataValue::new(LocalizedText::from("Root")),
    );
    assert_eq!(queued, 1);

    let events = client.collect_events(SETTLE).await;
    assert_eq!(count_data_changes(&events), 1);
    match &events[0] {
        ClientEvent::DataChanged(change) => {
            assert_eq!(change.node.node_id(), &NodeId::root_folder());
            assert_eq!(change.attribute_id, AttributeId::DisplayName.value());
            assert_eq!(change.subscription_id, subscription.id());
        }
        other => panic!("expected DataChanged, got {other:?}"),
    }

    let reads = client.server.read_count();
    let name = root.display_name().await.unwrap().into_option().unwrap();
    assert_eq!(name.text, "Root");
    assert_eq!(client.server.read_count(), reads);
}

#[tokio::test]
async fn test_change_event_node_serves_refreshed_cache() {
    let mut client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    let _subscription = client
        .connection
        .create_subscription(&speed, &[AttributeId::Value.value()])
        .await
        .unwrap();

    client
        .server
        .push_data_change(&PlantNodes::speed(), AttributeId::Value.value(), DataValue::new(Variant::Double(61.5)));

    let events = client.collect_events(SETTLE).await;
    let change = events
        .iter()
        .find_map(|event| match event {
            ClientEvent::DataChanged(change) => Some(change.clone()),
            _ => None,
        })
        .expect("data change delivered");

    let reads = client.server.read_count();
    let value = change.node.value().await.unwrap().into_option().unwrap();
    assert_eq!(value.value, Variant::Double(61.5));
    assert_eq!(client.server.read_count(), reads);
}

#[tokio::test]
async fn test_notification_overrides_cached_value() {
    let mut client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    speed.value().await.unwrap();
    let _subscription = client
        .connection
        .create_subscription(&speed, &[AttributeId::Value.value()])
        .await
        .unwrap();

    client.server.push_data_change(
        &PlantNodes::speed(),
        AttributeId::Value.value(),
        DataValue::new(99.0f64),
    );
    client.next_event(Duration::from_secs(1)).await.unwrap();

    let reads = client.server.read_count();
    let value = speed.value().await.unwrap().into_option().unwrap();
    assert_eq!(value.value, Variant::Double(99.0));
    assert_eq!(client.server.read_count(), reads);
    assert_eq!(client.connection.stats().notifications, 1);
}

#[tokio::test]
async fn test_notification_during_write_is_not_overwritten() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    let _subscription = client
        .connection
        .create_subscription(&speed, &[AttributeId::Value.value()])
        .await
        .unwrap();

    client.server.delay_writes(Duration::from_millis(100));
    let writer = {
        let speed = speed.clone();
        tokio::spawn(async move { speed.set_value(1.0f64).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.server.push_data_change(
        &PlantNodes::speed(),
        AttributeId::Value.value(),
        DataValue::new(99.0f64),
    );
    assert!(wait_until(Duration::from_secs(1), || client.connection.stats().notifications == 1).await);

    writer.await.unwrap().unwrap();
    let cached = speed.value().await.unwrap().into_option().unwrap();
    assert_eq!(cached.value, Variant::Double(99.0));
}

#[tokio::test]
async fn test_notifications_arrive_in_order_on_listener() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    let subscription = client
        .connection
        .create_subscription(&speed, &[AttributeId::Value.value()])
        .await
        .unwrap();
    let mut listener = subscription.listen();

    for v in [1.0f64, 2.0, 3.0] {
        client.server.push_data_change(
            &PlantNodes::speed(),
            AttributeId::Value.value(),
            DataValue::new(v),
        );
    }

    let mut seen = Vec::new();
    for _ in 0..3 {
        match assert_completes(Duration::from_secs(1), listener.recv()).await {
            Ok(SubscriptionEvent::DataChanged(change)) => seen.push(change.value.value),
            other => panic!("expected DataChanged, got {other:?}"),
        }
    }
    assert_eq!(
        seen,
        vec![Variant::Double(1.0), Variant::Double(2.0), Variant::Double(3.0)]
    );
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_event_notification_is_forwarded() {
    let mut client = TestClient::connect(ServerFixtures::standard()).await;
    let server_node = client
        .connection
        .node(NodeId::numeric(0, NodeId::SERVER))
        .await
        .unwrap();
    let subscription = client
        .connection
        .create_empty_subscription(ConfigFixtures::fast().subscription)
        .await
        .unwrap();
    subscription.subscribe_event(&server_node).await.unwrap();

    let queued = client.server.push_event(
        server_node.node_id(),
        vec![Variant::from("Overheat"), Variant::UInt16(700)],
    );
    assert_eq!(queued, 1);

    match client.next_event(Duration::from_secs(1)).await {
        Some(ClientEvent::EventNotified(event)) => {
            assert_eq!(event.node.node_id(), server_node.node_id());
            assert_eq!(event.fields.len(), 2);
        }
        other => panic!("expected EventNotified, got {other:?}"),
    }
}

// =============================================================================
// Management
// =============================================================================

#[tokio::test]
async fn test_paused_subscription_holds_notifications() {
    let mut client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    let subscription = client
        .connection
        .create_subscription(&speed, &[AttributeId::Value.value()])
        .await
        .unwrap();

    subscription.set_publishing_mode(false).await.unwrap();
    assert!(!subscription.is_publishing_enabled());
    client.server.push_data_change(
        &PlantNodes::speed(),
        AttributeId::Value.value(),
        DataValue::new(5.0f64),
    );
    assert!(client.collect_events(SETTLE).await.is_empty());
    assert_eq!(client.server.pending_notifications(), 1);

    subscription.set_publishing_mode(true).await.unwrap();
    assert!(matches!(
        client.next_event(Duration::from_secs(1)).await,
        Some(ClientEvent::DataChanged(_))
    ));
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let mut client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    let subscription = client
        .connection
        .create_subscription(&speed, &[AttributeId::Value.value()])
        .await
        .unwrap();
    let item = subscription.monitored_items().remove(0);

    subscription.unsubscribe(&item).await.unwrap();

    assert!(subscription.monitored_items().is_empty());
    assert_eq!(client.server.monitored_item_count(), 0);
    assert_eq!(
        client.server.push_data_change(
            &PlantNodes::speed(),
            AttributeId::Value.value(),
            DataValue::new(1.0f64),
        ),
        0
    );
    assert!(client.collect_events(SETTLE).await.is_empty());
}

#[tokio::test]
async fn test_delete_removes_server_subscription() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    let subscription = client
        .connection
        .create_subscription(&speed, &[AttributeId::Value.value()])
        .await
        .unwrap();
    assert_eq!(client.server.subscription_count(), 1);

    subscription.delete().await.unwrap();

    assert_eq!(client.server.subscription_count(), 0);
}

#[tokio::test]
async fn test_delete_failure_is_reported() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    let subscription = client
        .connection
        .create_subscription(&speed, &[AttributeId::Value.value()])
        .await
        .unwrap();
    client.server.fail_subscription_deletes(true);

    assert!(subscription.delete().await.is_err());
}

#[tokio::test]
async fn test_node_of_other_connection_is_rejected() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let other = client
        .manager
        .builder()
        .endpoint(Endpoint::unsecured(client.server.url()))
        .sink(Arc::new(TracingSink))
        .build()
        .unwrap();
    other.connect().await.unwrap();
    let foreign = other.node(PlantNodes::speed()).await.unwrap();
    let subscription = client
        .connection
        .create_empty_subscription(ConfigFixtures::fast().subscription)
        .await
        .unwrap();

    assert!(subscription
        .subscribe_data_changed(&foreign, AttributeId::Value.value())
        .await
        .is_err());
    assert!(subscription.monitored_items().is_empty());
    assert_eq!(client.server.monitored_item_count(), 0);
}

#[tokio::test]
async fn test_dropped_subscription_stops_routing() {
    let mut client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    let subscription = client
        .connection
        .create_subscription(&speed, &[AttributeId::Value.value()])
        .await
        .unwrap();

    drop(subscription);
    client.server.push_data_change(
        &PlantNodes::speed(),
        AttributeId::Value.value(),
        DataValue::new(8.0f64),
    );

    assert!(client.collect_events(SETTLE).await.is_empty());
}

// =============================================================================
// Close
// =============================================================================

#[tokio::test]
async fn test_nothing_changes_after_close() {
    let mut client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    speed.value().await.unwrap();
    let subscription = client
        .connection
        .create_subscription(&speed, &[AttributeId::Value.value()])
        .await
        .unwrap();
    let mut listener = subscription.listen();

    client.connection.close().await;
    let events = client.collect_events(SETTLE).await;
    assert!(matches!(events.as_slice(), [ClientEvent::Disconnected { .. }]));

    // The server still knows the item; the closed connection must ignore it.
    client.server.set_connected(true);
    client.server.push_data_change(
        &PlantNodes::speed(),
        AttributeId::Value.value(),
        DataValue::new(-1.0f64),
    );
    tokio::time::sleep(SETTLE).await;

    let cached = speed.value().await.unwrap().into_option().unwrap();
    assert_eq!(cached.value, Variant::Double(12.5));
    assert!(client.collect_events(SETTLE).await.is_empty());
    assert!(listener.try_recv().is_err());
    assert_eq!(client.server.pending_notifications(), 1);
}

#[tokio::test]
async fn test_close_does_not_wait_on_full_channel() {
    let server = ServerFixtures::standard();
    let manager = ConnectionManager::new(ConfigFixtures::fast(), server.factory());
    // Room for Connected only; nobody drains the receiver.
    let (sink, _events) = ChannelSink::with_channel(1);
    let connection = manager
        .builder()
        .endpoint(Endpoint::unsecured(server.url()))
        .sink(Arc::new(sink))
        .build()
        .unwrap();
    connection.connect().await.unwrap();

    let root = connection.root_node().await.unwrap();
    let _subscription = connection
        .create_subscription(&root, &[AttributeId::DisplayName.value()])
        .await
        .unwrap();
    server.push_data_change(
        &NodeId::root_folder(),
        AttributeId::DisplayName.value(),
        DataValue::new(LocalizedText::from("Unseen")),
    );
    assert!(wait_until(Duration::from_secs(1), || connection.stats().notifications == 1).await);

    assert_completes(Duration::from_secs(2), connection.close()).await;
    assert!(!server.is_connected());
}
