// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uaview-cli
//!
//! Command-line front end of the uaview OPC UA client.
//!
//! - CLI argument parsing with clap
//! - Logging initialization
//! - Command implementations (endpoints, browse, read, watch)
//!
//! ## Usage
//!
//! ```bash
//! # List endpoints
//! uaview endpoints opc.tcp://localhost:4840
//!
//! # Browse two levels below Objects
//! uaview browse opc.tcp://localhost:4840 -n i=85 -d 2
//!
//! # Read a variable
//! uaview read opc.tcp://localhost:4840 "ns=2;s=Line1.Speed" -o json
//!
//! # Watch a value for 30 seconds
//! uaview watch opc.tcp://localhost:4840 "ns=2;s=Line1.Speed" --duration 30s
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

pub use cli::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};
pub use logging::{init_logging, parse_level};

use uaview_config::{AppConfig, ConfigLoader};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Loads the config file named on the command line, or defaults.
pub fn load_app_config(cli: &Cli) -> CliResult<AppConfig> {
    match &cli.config {
        Some(path) => Ok(ConfigLoader::new().load(path)?),
        None => Ok(AppConfig::default()),
    }
}
