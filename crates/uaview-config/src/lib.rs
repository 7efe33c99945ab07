// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uaview-config
//!
//! Configuration files for the uaview OPC UA client.
//!
//! ## Features
//!
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Placeholders**: `${VAR}` and `${VAR:default}` inside file contents
//! - **Environment Overrides**: `UAVIEW_*` variables win over file values
//!
//! ## Quick Start
//!
//! ```no_run
//! use uaview_config::loader::load_config;
//!
//! let config = load_config("uaview.yaml").unwrap();
//! println!("Application: {}", config.client.application_name);
//! ```
//!
//! ## Example File
//!
//! ```yaml
//! client:
//!   application_name: "${UAVIEW_APP:Line 3 Viewer}"
//!   poll_interval: 500ms
//!   discovery_timeout: 5s
//!   subscription:
//!     publishing_interval: 1s
//!   monitoring:
//!     sampling_interval: 250ms
//! logging:
//!   level: info
//!   format: text
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{AppConfig, LogFormat, LogLevel, LoggingConfig};
