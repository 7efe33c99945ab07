// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `endpoints` command.

use std::io::Write;
use std::sync::Arc;

use uaview_core::{ConnectionManager, TracingSink};

use super::{is_json, write_json};
use crate::cli::{EndpointsArgs, OutputFormat};
use crate::error::CliResult;

/// Prints the endpoints offered at `args.url`.
///
/// An unreachable server prints an empty list rather than failing.
pub async fn endpoints(
    manager: &ConnectionManager,
    args: &EndpointsArgs,
    format: OutputFormat,
    out: &mut (dyn Write + Send),
) -> CliResult<()> {
    let builder = manager
        .builder()
        .url(args.url.as_str())
        .sink(Arc::new(TracingSink))
        .find_endpoints()
        .await;
    let endpoints = builder.endpoints();

    if is_json(format) {
        return write_json(out, &serde_json::json!({
            "url": args.url,
            "endpoints": endpoints,
        }));
    }

    if endpoints.is_empty() {
        writeln!(out, "No endpoints found at {}", args.url)?;
        return Ok(());
    }

    writeln!(out, "{} endpoint(s) at {}:", endpoints.len(), args.url)?;
    for (index, endpoint) in endpoints.iter().enumerate() {
        let policy = endpoint
            .security_policy()
            .map(|p| format!("{p:?}"))
            .unwrap_or_else(|| endpoint.security_policy_uri.clone());
        writeln!(
            out,
            "  [{index}] {}  mode={}  policy={}  level={}",
            endpoint.url, endpoint.security_mode, policy, endpoint.security_level
        )?;
    }
    Ok(())
}
