// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uaview Integration Tests
//!
//! Cross-module tests for the uaview client core, run against the scripted
//! in-memory server from `uaview_core::mock`.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Pre-built servers and configurations
//!   - `harness`: A connected client with an event receiver
//!   - `assertions`: Polling and event assertions
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p uaview-tests
//! cargo test -p uaview-tests --test integration_subscription
//! ```
//!
//! ## Test Suites
//!
//! - `integration_connection.rs`: builder, manager ids, state machine, close
//! - `integration_nodes.rs`: node classes, caching, browsing, method calls
//! - `integration_subscription.rs`: notification routing and cache updates
//! - `integration_config.rs`: configuration files feeding the manager
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use uaview_tests::common::{fixtures::ServerFixtures, harness::TestClient};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let client = TestClient::connect(ServerFixtures::plant()).await;
//!     let root = client.connection.root_node().await.unwrap();
//!     // ... test logic
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
}
