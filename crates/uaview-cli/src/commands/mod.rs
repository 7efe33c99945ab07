// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! Commands write their results to the given writer and log through
//! `tracing`, so the same code runs under the binary and under tests with
//! an in-memory server.

mod browse;
mod endpoints;
mod read;
mod watch;

pub use browse::browse;
pub use endpoints::endpoints;
pub use read::read;
pub use watch::watch;

use std::io::Write;
use std::sync::Arc;

use uaview_core::{ClientConfig, Connection, ConnectionManager, TracingSink, TransportFactory};

use crate::cli::{Cli, Commands, ConnectArgs, OutputFormat};
use crate::error::{CliError, CliResult};

/// Runs the parsed command against servers reached through `factory`.
pub async fn execute(
    cli: &Cli,
    config: ClientConfig,
    factory: Arc<dyn TransportFactory>,
    out: &mut (dyn Write + Send),
) -> CliResult<()> {
    let manager = ConnectionManager::new(config, factory);

    let result = match &cli.command {
        Commands::Endpoints(args) => endpoints(&manager, args, cli.output, out).await,
        Commands::Browse(args) => browse(&manager, args, cli.output, out).await,
        Commands::Read(args) => read(&manager, args, cli.output, out).await,
        Commands::Watch(args) => watch(&manager, args, cli.output, out).await,
    };

    manager.close_all_connections().await;
    result
}

/// Discovers endpoints at `args.url`, picks one and connects.
pub(crate) async fn open_session(
    manager: &ConnectionManager,
    args: &ConnectArgs,
) -> CliResult<Arc<Connection>> {
    let builder = manager
        .builder()
        .url(args.url.as_str())
        .sink(Arc::new(TracingSink))
        .find_endpoints()
        .await;

    if builder.endpoints().is_empty() {
        return Err(CliError::connection(format!(
            "no endpoints discovered at {}",
            args.url
        )));
    }

    let mut builder = match args.security {
        Some(mode) => builder.select_security_mode(mode),
        None => builder.select_most_secure(),
    };
    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        builder = builder.credentials(username.as_str(), password.as_str());
    }

    let connection = builder.build().map_err(|e| match args.security {
        Some(mode) => CliError::connection(format!("no endpoint with security mode {mode}")),
        None => CliError::Core(e),
    })?;
    connection.connect().await?;
    Ok(connection)
}

pub(crate) fn write_json(out: &mut (dyn Write + Send), value: &serde_json::Value) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    writeln!(out, "{text}")?;
    Ok(())
}

pub(crate) fn is_json(format: OutputFormat) -> bool {
    format == OutputFormat::Json
}
