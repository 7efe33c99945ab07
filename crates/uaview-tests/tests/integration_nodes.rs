// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node integration tests.
//!
//! - Classification and identity
//! - Lazy attribute cache
//! - Browsing and method calls

use std::collections::HashSet;

use uaview_core::{
    AttributeId, AttributeValue, LocalizedText, NodeClass, NodeId, UaError, Variant,
};
use uaview_tests::prelude::*;

// =============================================================================
// Identity
// =============================================================================

#[tokio::test]
async fn test_root_is_an_object() {
    let client = TestClient::connect(ServerFixtures::standard()).await;

    let root = client.connection.root_node().await.unwrap();

    assert_eq!(root.node_class(), NodeClass::Object);
    assert_eq!(root.node_id(), &NodeId::root_folder());
    assert_eq!(root.connection_id(), client.connection.id());
}

#[tokio::test]
async fn test_unknown_node_is_none() {
    let client = TestClient::connect(ServerFixtures::standard()).await;

    assert!(client
        .connection
        .node(NodeId::string(2, "Missing"))
        .await
        .is_none());
}

#[tokio::test]
async fn test_nodes_are_equal_by_id() {
    let client = TestClient::connect(ServerFixtures::plant()).await;

    let first = client.connection.node(PlantNodes::speed()).await.unwrap();
    let second = client.connection.node(PlantNodes::speed()).await.unwrap();
    let other = client.connection.node(PlantNodes::running()).await.unwrap();

    assert_eq!(first, second);
    assert_ne!(first, other);

    let set: HashSet<_> = [first, second, other].into_iter().collect();
    assert_eq!(set.len(), 2);
}

// =============================================================================
// Attribute cache
// =============================================================================

#[tokio::test]
async fn test_not_applicable_getter_makes_no_read() {
    let client = TestClient::connect(ServerFixtures::standard()).await;
    let root = client.connection.root_node().await.unwrap();
    let reads = client.server.read_count();

    assert_eq!(root.value().await.unwrap(), AttributeValue::NotApplicable);
    assert!(root.data_type().await.unwrap().is_not_applicable());
    assert!(root.executable().await.unwrap().is_not_applicable());

    assert_eq!(client.server.read_count(), reads);
}

#[tokio::test]
async fn test_getter_reads_once_then_serves_cache() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();
    let reads = client.server.read_count();

    let value = speed.value().await.unwrap().into_option().unwrap();
    assert_eq!(value.value, Variant::Double(12.5));
    assert_eq!(client.server.read_count(), reads + 1);

    speed.value().await.unwrap();
    assert_eq!(client.server.read_count(), reads + 1);
    assert!(speed.is_cached(AttributeId::Value));

    assert!(speed.invalidate(AttributeId::Value));
    speed.value().await.unwrap();
    assert_eq!(client.server.read_count(), reads + 2);
}

#[tokio::test]
async fn test_read_all_fills_every_applicable_attribute() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();

    speed.read_all().await.unwrap();
    let reads = client.server.read_count();

    assert_eq!(
        speed.display_name().await.unwrap().into_option(),
        Some(LocalizedText::from("Speed"))
    );
    assert_eq!(speed.value_rank().await.unwrap().into_option(), Some(-1));
    assert_eq!(speed.access_level().await.unwrap().into_option(), Some(3));
    assert_eq!(client.server.read_count(), reads);
}

#[tokio::test]
async fn test_missing_attribute_is_empty() {
    let client = TestClient::connect(ServerFixtures::standard()).await;
    let root = client.connection.root_node().await.unwrap();

    assert_eq!(root.description().await.unwrap(), AttributeValue::Empty);
}

#[tokio::test]
async fn test_write_updates_server_and_cache() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();

    speed.set_value(40.0f64).await.unwrap();
    let reads = client.server.read_count();

    let cached = speed.value().await.unwrap().into_option().unwrap();
    assert_eq!(cached.value, Variant::Double(40.0));
    assert_eq!(client.server.read_count(), reads);
    assert_eq!(client.server.write_count(), 1);
    assert_eq!(client.connection.stats().writes, 1);
}

#[tokio::test]
async fn test_write_to_not_applicable_attribute_fails() {
    let client = TestClient::connect(ServerFixtures::standard()).await;
    let root = client.connection.root_node().await.unwrap();

    let err = root.set_value(1i32).await.unwrap_err();

    assert!(matches!(err, UaError::Operation(_)));
    assert_eq!(client.server.write_count(), 0);
}

// =============================================================================
// Browsing
// =============================================================================

#[tokio::test]
async fn test_children_and_parent() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let root = client.connection.root_node().await.unwrap();

    let children = root.children().await.unwrap();
    assert_eq!(children.len(), 1);
    let objects = &children[0];
    assert_eq!(objects.node_id(), &NodeId::objects_folder());

    let names: Vec<NodeId> = objects
        .children()
        .await
        .unwrap()
        .iter()
        .map(|n| n.node_id().clone())
        .collect();
    assert!(names.contains(&PlantNodes::speed()));
    assert!(names.contains(&PlantNodes::line()));

    let parent = objects.parent().await.unwrap().unwrap();
    assert_eq!(parent, root);
    assert!(root.parent().await.unwrap().is_none());
}

#[tokio::test]
async fn test_references_are_browsed_once() {
    let client = TestClient::connect(ServerFixtures::standard()).await;
    let root = client.connection.root_node().await.unwrap();

    root.references().await.unwrap();
    root.children().await.unwrap();

    assert_eq!(client.server.browse_count(), 1);
}

// =============================================================================
// Methods
// =============================================================================

#[tokio::test]
async fn test_call_method_on_object() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let line = client.connection.node(PlantNodes::line()).await.unwrap();

    let outputs = line
        .call_method(&PlantNodes::echo(), vec![Variant::Int32(7)])
        .await
        .unwrap();

    assert_eq!(outputs, vec![Variant::Int32(7)]);
    assert_eq!(client.connection.stats().calls, 1);
}

#[tokio::test]
async fn test_call_method_on_variable_is_rejected() {
    let client = TestClient::connect(ServerFixtures::plant()).await;
    let speed = client.connection.node(PlantNodes::speed()).await.unwrap();

    assert!(speed.call_method(&PlantNodes::echo(), Vec::new()).await.is_err());
    assert_eq!(client.server.call_count(), 0);
}
