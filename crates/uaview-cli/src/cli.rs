// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `endpoints`: List the endpoints a server offers
//! - `browse`: Print the node tree below a node
//! - `read`: Print the attributes of one node
//! - `watch`: Stream attribute changes or events of one node

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use uaview_config::LogFormat;
use uaview_core::{AttributeId, SecurityMode};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// uaview - inspect OPC UA servers from the terminal
#[derive(Parser, Debug)]
#[command(
    name = "uaview",
    author = "Sylvex <contact@sylvex.io>",
    version,
    about = "Browse, read and watch OPC UA servers",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (YAML, TOML or JSON)
    #[arg(short, long, env = "UAVIEW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact); overrides the config file
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for command results
    #[arg(short, long, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the endpoints a server offers
    Endpoints(EndpointsArgs),

    /// Print the node tree below a node
    Browse(BrowseArgs),

    /// Print the attributes of one node
    Read(ReadArgs),

    /// Stream attribute changes or events of one node
    ///
    /// Runs until the duration elapses or Ctrl+C is pressed.
    Watch(WatchArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `endpoints` command.
#[derive(Args, Debug, Clone)]
pub struct EndpointsArgs {
    /// Discovery URL, `opc.tcp://host:port`
    pub url: String,
}

/// Endpoint selection and identity shared by session commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// Server URL, `opc.tcp://host:port`
    pub url: String,

    /// Security mode of the endpoint to use; the most secure one when omitted
    #[arg(short, long)]
    pub security: Option<SecurityMode>,

    /// User name for user/password authentication
    #[arg(short, long, requires = "password")]
    pub username: Option<String>,

    /// Password for user/password authentication
    #[arg(short, long, env = "UAVIEW_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Arguments for the `browse` command.
#[derive(Args, Debug, Clone)]
pub struct BrowseArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Node to start from
    #[arg(short, long, default_value = "i=84")]
    pub node: String,

    /// Levels to descend
    #[arg(short, long, default_value = "1")]
    pub depth: usize,
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Node to read
    pub node: String,
}

/// Arguments for the `watch` command.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Node to watch
    pub node: String,

    /// Attribute to monitor, by name or number
    #[arg(short, long, default_value = "Value", value_parser = parse_attribute)]
    pub attribute: AttributeId,

    /// Subscribe to events raised by the node instead of an attribute
    #[arg(short, long, conflicts_with = "attribute")]
    pub events: bool,

    /// Stop after this long, e.g. `30s` or `5m`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Stop after this many notifications
    #[arg(long)]
    pub count: Option<usize>,
}

// =============================================================================
// Enums
// =============================================================================

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

/// Parses an attribute name (`Value`, `displayname`) or number (`13`).
pub fn parse_attribute(s: &str) -> Result<AttributeId, String> {
    if let Ok(value) = s.parse::<u32>() {
        return AttributeId::from_value(value).ok_or_else(|| format!("unknown attribute id {value}"));
    }
    AttributeId::ALL
        .iter()
        .copied()
        .find(|a| a.to_string().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown attribute '{s}'"))
}

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the log level after `--quiet` and `--verbose`.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(configured)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_command() {
        let cli = Cli::parse_from(["uaview", "endpoints", "opc.tcp://plc:4840"]);
        match cli.command {
            Commands::Endpoints(args) => assert_eq!(args.url, "opc.tcp://plc:4840"),
            other => panic!("Expected Endpoints command, got {other:?}"),
        }
    }

    #[test]
    fn test_browse_defaults() {
        let cli = Cli::parse_from(["uaview", "browse", "opc.tcp://plc:4840"]);
        let Commands::Browse(args) = cli.command else {
            panic!("Expected Browse command");
        };
        assert_eq!(args.node, "i=84");
        assert_eq!(args.depth, 1);
        assert!(args.connect.security.is_none());
    }

    #[test]
    fn test_watch_arguments() {
        let cli = Cli::parse_from([
            "uaview",
            "watch",
            "opc.tcp://plc:4840",
            "ns=2;s=Speed",
            "-a",
            "displayname",
            "--duration",
            "30s",
            "-s",
            "sign-and-encrypt",
        ]);
        let Commands::Watch(args) = cli.command else {
            panic!("Expected Watch command");
        };
        assert_eq!(args.attribute, AttributeId::DisplayName);
        assert_eq!(args.duration, Some(Duration::from_secs(30)));
        assert_eq!(args.connect.security, Some(SecurityMode::SignAndEncrypt));
    }

    #[test]
    fn test_username_requires_password() {
        let result = Cli::try_parse_from(["uaview", "read", "opc.tcp://plc:4840", "i=85", "-u", "op"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_attribute() {
        assert_eq!(parse_attribute("Value").unwrap(), AttributeId::Value);
        assert_eq!(parse_attribute("13").unwrap(), AttributeId::Value);
        assert!(parse_attribute("Colour").is_err());
    }

    #[test]
    fn test_log_level_flags() {
        let cli = Cli::parse_from(["uaview", "-q", "endpoints", "opc.tcp://plc:4840"]);
        assert_eq!(cli.effective_log_level("info"), "warn");

        let cli = Cli::parse_from(["uaview", "-l", "trace", "endpoints", "opc.tcp://plc:4840"]);
        assert_eq!(cli.effective_log_level("info"), "trace");

        let cli = Cli::parse_from(["uaview", "endpoints", "opc.tcp://plc:4840"]);
        assert_eq!(cli.effective_log_level("error"), "error");
    }
}
