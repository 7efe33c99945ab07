// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration integration tests.
//!
//! Files on disk are loaded and the resulting client configuration drives
//! a connection against the scripted server.

use std::sync::Arc;
use std::time::Duration;

use uaview_config::{ConfigError, ConfigLoader, LogFormat, LogLevel};
use uaview_core::{ChannelSink, ClientEvent, ConnectionManager, Endpoint};
use uaview_tests::common::{init_test_logging, temp_test_dir};
use uaview_tests::prelude::*;

const YAML: &str = r#"
client:
  application_name: ${UAVIEW_IT_UNSET_NAME:Integration Viewer}
  poll_interval: 20ms
  discovery_timeout: 200ms
  subscription:
    publishing_interval: 100ms
logging:
  level: debug
  format: compact
"#;

#[test]
fn test_load_yaml_file_with_placeholder_default() {
    init_test_logging();
    let dir = temp_test_dir("uaview-config");
    let path = dir.path().join("uaview.yaml");
    std::fs::write(&path, YAML).unwrap();

    let config = ConfigLoader::new()
        .with_env_prefix("UAVIEW_IT_YAML")
        .load(&path)
        .unwrap();

    assert_eq!(config.client.application_name, "Integration Viewer");
    assert_eq!(config.client.poll_interval, Duration::from_millis(20));
    assert_eq!(
        config.client.subscription.publishing_interval,
        Duration::from_millis(100)
    );
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, LogFormat::Compact);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = temp_test_dir("uaview-config");
    let path = dir.path().join("uaview.toml");
    std::fs::write(&path, "[client]\npoll_interval = \"0s\"\n").unwrap();

    let err = ConfigLoader::new()
        .with_env_prefix("UAVIEW_IT_INVALID")
        .load(&path)
        .unwrap_err();

    assert!(matches!(err, ConfigError::Validation { .. }));
}

#[tokio::test]
async fn test_loaded_config_drives_connection() {
    init_test_logging();
    let dir = temp_test_dir("uaview-config");
    let path = dir.path().join("uaview.json");
    std::fs::write(
        &path,
        r#"{"client": {"application_name": "json viewer", "poll_interval": "15ms"}}"#,
    )
    .unwrap();
    let config = ConfigLoader::new()
        .with_env_prefix("UAVIEW_IT_JSON")
        .load(&path)
        .unwrap();

    let server = ServerFixtures::standard();
    let manager = ConnectionManager::new(config.client, server.factory());
    let (sink, mut events) = ChannelSink::with_channel(16);
    let connection = manager
        .builder()
        .endpoint(Endpoint::unsecured(server.url()))
        .sink(Arc::new(sink))
        .build()
        .unwrap();

    assert_eq!(connection.config().poll_interval, Duration::from_millis(15));
    connection.connect().await.unwrap();
    assert!(matches!(events.recv().await, Some(ClientEvent::Connected { .. })));
    assert!(wait_until(Duration::from_secs(1), || server.poll_count() >= 2).await);

    manager.close_all_connections().await;
    assert!(manager.is_empty());
}
