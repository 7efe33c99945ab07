// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `watch` command.

use std::future::pending;
use std::io::Write;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uaview_core::{ConnectionManager, NodeId, SubscriptionEvent};

use super::{is_json, open_session, write_json};
use crate::cli::{OutputFormat, WatchArgs};
use crate::error::{CliError, CliResult};

/// Streams notifications for `args.node` until a stop condition is met.
pub async fn watch(
    manager: &ConnectionManager,
    args: &WatchArgs,
    format: OutputFormat,
    out: &mut (dyn Write + Send),
) -> CliResult<()> {
    let node_id: NodeId = args.node.parse()?;
    let connection = open_session(manager, &args.connect).await?;
    let node = connection
        .node(node_id)
        .await
        .ok_or_else(|| CliError::usage(format!("node {} not found", args.node)))?;

    let subscription = connection
        .create_empty_subscription(connection.config().subscription.clone())
        .await?;
    if args.events {
        subscription.subscribe_event(&node).await?;
    } else {
        subscription
            .subscribe_data_changed(&node, args.attribute.value())
            .await?;
    }
    let mut events = subscription.listen();
    info!(node_id = %node.node_id(), subscription_id = subscription.id(), "Watching");

    let deadline = async {
        match args.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut received = 0usize;
    loop {
        if args.count.is_some_and(|limit| received >= limit) {
            break;
        }
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    received += 1;
                    print_event(&event, format, out)?;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Output fell behind"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    if let Err(e) = subscription.delete().await {
        e.log("watch teardown");
    }
    Ok(())
}

fn print_event(
    event: &SubscriptionEvent,
    format: OutputFormat,
    out: &mut (dyn Write + Send),
) -> CliResult<()> {
    match event {
        SubscriptionEvent::DataChanged(change) if is_json(format) => write_json(
            out,
            &serde_json::json!({
                "node_id": change.node.node_id().to_string(),
                "attribute_id": change.attribute_id,
                "value": change.value,
            }),
        ),
        SubscriptionEvent::Event(event) if is_json(format) => write_json(
            out,
            &serde_json::json!({
                "node_id": event.node.node_id().to_string(),
                "fields": event.fields,
            }),
        ),
        SubscriptionEvent::DataChanged(change) => {
            let at = change
                .value
                .source_timestamp
                .or(change.value.server_timestamp)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            writeln!(out, "{at} {} = {} [{}]", change.node.node_id(), change.value.value, change.value.status)?;
            Ok(())
        }
        SubscriptionEvent::Event(event) => {
            let fields: Vec<String> = event.fields.iter().map(ToString::to_string).collect();
            writeln!(out, "{} event: {}", event.node.node_id(), fields.join(", "))?;
            Ok(())
        }
    }
}
