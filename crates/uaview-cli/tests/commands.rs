// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Commands run against the in-memory server.

use std::time::Duration;

use clap::Parser;
use uaview_cli::{commands, load_app_config, Cli};
use uaview_core::mock::MockServer;
use uaview_core::{ClientConfig, DataValue, NodeId};

fn config() -> ClientConfig {
    ClientConfig::builder()
        .poll_interval(Duration::from_millis(10))
        .discovery_timeout(Duration::from_millis(200))
        .build()
        .unwrap()
}

async fn run(server: &MockServer, args: &[&str]) -> Result<String, uaview_cli::CliError> {
    let cli = Cli::parse_from(args);
    let mut out = Vec::new();
    commands::execute(&cli, config(), server.factory(), &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn test_endpoints_lists_both_modes() {
    let server = MockServer::with_standard_nodes();
    let url = server.url();
    let output = run(&server, &["uaview", "endpoints", &url]).await.unwrap();
    assert!(output.contains("2 endpoint(s)"));
    assert!(output.contains("SignAndEncrypt"));
}

#[tokio::test]
async fn test_endpoints_unreachable_prints_empty_list() {
    let server = MockServer::with_standard_nodes();
    let output = run(&server, &["uaview", "-o", "json", "endpoints", "opc.tcp://nowhere:4840"])
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(json["endpoints"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_browse_prints_tree() {
    let server = MockServer::with_standard_nodes();
    let url = server.url();
    let output = run(&server, &["uaview", "browse", &url, "-d", "2"]).await.unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Root"));
    assert!(lines[1].starts_with("  Objects"));
    assert!(lines[2].starts_with("    Server"));
}

#[tokio::test]
async fn test_read_variable_as_json() {
    let server = MockServer::with_standard_nodes();
    server.add_variable(NodeId::string(2, "Speed"), "Speed", DataValue::new(42.5f64));
    let url = server.url();

    let output = run(&server, &["uaview", "-o", "json", "read", &url, "ns=2;s=Speed", "-s", "none"])
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(json["DisplayName"], "Speed");
    assert_eq!(json["NodeClass"], "Variable");
    assert!(json.get("Value").is_some());
}

#[tokio::test]
async fn test_read_unknown_node_fails() {
    let server = MockServer::with_standard_nodes();
    let url = server.url();
    let err = run(&server, &["uaview", "read", &url, "ns=2;s=Missing"]).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_watch_stops_after_count() {
    let server = MockServer::with_standard_nodes();
    let speed = server.add_variable(NodeId::string(2, "Speed"), "Speed", DataValue::new(1.0f64));
    let url = server.url();

    let pusher = {
        let server = server.clone();
        tokio::spawn(async move {
            while server.monitored_item_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            server.push_data_change(&speed, 13, DataValue::new(2.0f64));
            server.push_data_change(&speed, 13, DataValue::new(3.0f64));
        })
    };

    let output = run(
        &server,
        &["uaview", "watch", &url, "ns=2;s=Speed", "--count", "2", "--duration", "5s"],
    )
    .await
    .unwrap();
    pusher.await.unwrap();

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("ns=2;s=Speed = 2 [Good"));
    assert!(lines[1].contains("= 3 [Good"));
    assert_eq!(server.subscription_count(), 0);
}

#[test]
fn test_load_app_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("uaview.toml");
    std::fs::write(&path, "[client]\npoll_interval = \"250ms\"\n[logging]\nformat = \"compact\"\n").unwrap();

    let cli = Cli::parse_from(["uaview", "-c", path.to_str().unwrap(), "endpoints", "opc.tcp://x:1"]);
    let config = load_app_config(&cli).unwrap();
    assert_eq!(config.client.poll_interval, Duration::from_millis(250));
    assert_eq!(config.logging.format, uaview_config::LogFormat::Compact);
}
