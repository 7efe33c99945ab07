// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Servers and configurations shared by the integration suites.

use std::time::Duration;

use uaview_core::mock::{MockServer, ECHO_METHOD};
use uaview_core::{ClientConfig, DataValue, NodeClass, NodeId, SubscriptionParameters};

// =============================================================================
// Configuration Fixtures
// =============================================================================

/// Client configurations.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Short poll and discovery intervals so tests settle quickly.
    pub fn fast() -> ClientConfig {
        ClientConfig::builder()
            .poll_interval(Duration::from_millis(10))
            .discovery_timeout(Duration::from_millis(200))
            .connect_timeout(Duration::from_secs(2))
            .subscription(SubscriptionParameters::with_interval(Duration::from_millis(50)))
            .build()
            .expect("fast config is valid")
    }
}

// =============================================================================
// Server Fixtures
// =============================================================================

/// Node ids planted by [`ServerFixtures::plant`].
pub struct PlantNodes;

impl PlantNodes {
    /// Double variable.
    pub fn speed() -> NodeId {
        NodeId::string(2, "Line1.Speed")
    }

    /// Boolean variable.
    pub fn running() -> NodeId {
        NodeId::string(2, "Line1.Running")
    }

    /// Object holding the method.
    pub fn line() -> NodeId {
        NodeId::string(2, "Line1")
    }

    /// Echo method under [`PlantNodes::line`].
    pub fn echo() -> NodeId {
        NodeId::numeric(0, ECHO_METHOD)
    }
}

/// Scripted servers.
pub struct ServerFixtures;

impl ServerFixtures {
    /// Root, Objects and Server only.
    pub fn standard() -> MockServer {
        MockServer::with_standard_nodes()
    }

    /// Standard nodes plus a small production line.
    pub fn plant() -> MockServer {
        let server = MockServer::with_standard_nodes();
        server.add_variable(PlantNodes::speed(), "Speed", DataValue::new(12.5f64));
        server.add_variable(PlantNodes::running(), "Running", DataValue::new(true));
        server.add_node(
            &NodeId::objects_folder(),
            PlantNodes::line(),
            NodeClass::Object,
            "Line1",
        );
        server.add_node(&PlantNodes::line(), PlantNodes::echo(), NodeClass::Method, "Echo");
        server
    }
}
