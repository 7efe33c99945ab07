// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `browse` command.

use std::io::Write;

use uaview_core::{ConnectionManager, Node, NodeId};

use super::{is_json, open_session, write_json};
use crate::cli::{BrowseArgs, OutputFormat};
use crate::error::{CliError, CliResult};

/// Prints the hierarchy below `args.node`, `args.depth` levels deep.
pub async fn browse(
    manager: &ConnectionManager,
    args: &BrowseArgs,
    format: OutputFormat,
    out: &mut (dyn Write + Send),
) -> CliResult<()> {
    let node_id: NodeId = args.node.parse()?;
    let connection = open_session(manager, &args.connect).await?;
    let start = connection
        .node(node_id)
        .await
        .ok_or_else(|| CliError::usage(format!("node {} not found", args.node)))?;

    // Depth-first, children in server order.
    let mut rows = Vec::new();
    let mut stack: Vec<(Node, usize)> = vec![(start, 0)];
    while let Some((node, depth)) = stack.pop() {
        let name = label(&node).await?;
        rows.push((depth, node.node_id().to_string(), node.node_class(), name));

        if depth < args.depth {
            let children = node.children().await?;
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }
    }

    if is_json(format) {
        let nodes: Vec<serde_json::Value> = rows
            .iter()
            .map(|(depth, id, class, name)| {
                serde_json::json!({
                    "depth": depth,
                    "node_id": id,
                    "node_class": class.name(),
                    "display_name": name,
                })
            })
            .collect();
        return write_json(out, &serde_json::json!({ "nodes": nodes }));
    }

    for (depth, id, class, name) in rows {
        writeln!(out, "{}{name} ({class}, {id})", "  ".repeat(depth))?;
    }
    Ok(())
}

async fn label(node: &Node) -> CliResult<String> {
    Ok(node
        .display_name()
        .await?
        .into_option()
        .map(|text| text.text)
        .unwrap_or_else(|| node.node_id().to_string()))
}
