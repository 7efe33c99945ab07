// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connections, their lifecycle and their subscriptions.
//!
//! - [`ConnectionManager`]: registry handing out monotonic connection ids
//! - [`ConnectionBuilder`]: single-use builder with endpoint discovery
//! - [`Connection`]: one session, its state machine and poll loop
//! - [`Subscription`]: monitored items wired into node caches
//! - [`EventSink`]: outward lifecycle and change events

pub mod builder;
pub mod connection;
pub mod manager;
mod poll;
pub mod sink;
pub mod stats;
pub mod subscription;

pub use builder::{ConnectionBuilder, Resolved, Unresolved};
pub use connection::{Connection, ConnectionState};
pub use manager::ConnectionManager;
pub use sink::{
    BroadcastSink, ChannelSink, ClientEvent, DataChangeEvent, EventNotification, EventSink,
    SubscriptionEvent, TracingSink,
};
pub use stats::{ConnectionStats, StatsSnapshot};
pub use subscription::{MonitoredItem, Subscription};
