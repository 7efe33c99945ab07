// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use std::io::Write;

use uaview_core::{AttributeValue, ConnectionManager, NodeId};

use super::{is_json, open_session, write_json};
use crate::cli::{OutputFormat, ReadArgs};
use crate::error::{CliError, CliResult};

/// Prints the common attributes of `args.node`, plus its value for variables.
pub async fn read(
    manager: &ConnectionManager,
    args: &ReadArgs,
    format: OutputFormat,
    out: &mut (dyn Write + Send),
) -> CliResult<()> {
    let node_id: NodeId = args.node.parse()?;
    let connection = open_session(manager, &args.connect).await?;
    let node = connection
        .node(node_id)
        .await
        .ok_or_else(|| CliError::usage(format!("node {} not found", args.node)))?;

    node.read_all().await?;

    let mut rows: Vec<(&str, String)> = vec![
        ("NodeId", node.node_id().to_string()),
        ("NodeClass", node.node_class().to_string()),
    ];
    rows.push(("BrowseName", render(node.browse_name().await?)));
    rows.push(("DisplayName", render(node.display_name().await?)));
    rows.push(("Description", render(node.description().await?)));

    let value = node.value().await?;
    if !value.is_not_applicable() {
        rows.push(("DataType", render(node.data_type().await?)));
        rows.push(("ValueRank", render(node.value_rank().await?)));
        rows.push(("AccessLevel", render(node.access_level().await?)));
    }

    if is_json(format) {
        let mut object = serde_json::Map::new();
        for (name, text) in &rows {
            object.insert((*name).to_string(), serde_json::Value::String(text.clone()));
        }
        if let Some(data) = value.value() {
            object.insert(
                "Value".to_string(),
                serde_json::to_value(data).map_err(|e| CliError::Io(std::io::Error::other(e)))?,
            );
        }
        return write_json(out, &serde_json::Value::Object(object));
    }

    for (name, text) in rows {
        writeln!(out, "{name:<12} {text}")?;
    }
    if let Some(data) = value.value() {
        writeln!(out, "{:<12} {} [{}]", "Value", data.value, data.status)?;
    }
    Ok(())
}

fn render<T: std::fmt::Display>(value: AttributeValue<T>) -> String {
    match value {
        AttributeValue::Value(v) => v.to_string(),
        AttributeValue::Empty => "(empty)".to_string(),
        AttributeValue::NotApplicable => "(n/a)".to_string(),
    }
}
