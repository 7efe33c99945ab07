// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the uaview binary.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a CLI invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad command-line input.
    #[error("Usage error: {0}")]
    Usage(String),

    /// Logging could not be installed.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// No usable endpoint or session.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Output could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file error.
    #[error("Config error: {0}")]
    Config(#[from] uaview_config::ConfigError),

    /// Client error.
    #[error("Client error: {0}")]
    Core(#[from] uaview_core::UaError),
}

impl CliError {
    /// Creates a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Creates a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 64,
            Self::Config(_) => 1,
            Self::Initialization(_) => 2,
            Self::Connection(_) => 3,
            Self::Core(_) => 4,
            Self::Io(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            CliError::usage("x"),
            CliError::Initialization("x".into()),
            CliError::connection("x"),
            CliError::Core(uaview_core::UaError::not_connected()),
            CliError::Config(uaview_config::ConfigError::file_not_found("x")),
        ];
        let mut codes: Vec<i32> = errors.iter().map(CliError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
