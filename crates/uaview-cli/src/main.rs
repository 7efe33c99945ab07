// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! uaview - inspect OPC UA servers from the terminal.

use std::process::ExitCode;
use std::sync::Arc;

use uaview_cli::{commands, init_logging, load_app_config, Cli, CliError};
use uaview_core::OpcUaTransportFactory;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_app_config(&cli)?;
    let format = cli.log_format.unwrap_or(config.logging.format);
    init_logging(cli.effective_log_level(config.logging.level.as_str()), format)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let mut stdout = std::io::stdout();
        commands::execute(&cli, config.client, Arc::new(OpcUaTransportFactory), &mut stdout).await
    })
}
