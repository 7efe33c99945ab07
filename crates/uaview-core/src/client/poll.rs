// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-connection poll loop.
//!
//! One task per connected session. Each tick it asks the transport to
//! process pending protocol work, then dispatches the drained notifications
//! in arrival order: cache update first, then the subscription's broadcast
//! channel, then the connection's sink. The task stops when the shutdown
//! watch flips to `true`, abandoning a tick that is still in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::client::sink::{DataChangeEvent, EventNotification, EventSink, SubscriptionEvent};
use crate::client::stats::ConnectionStats;
use crate::node::{ApplyOutcome, Node};
use crate::transport::{MonitoredItemKind, Notification, UaTransport};

// =============================================================================
// Routes
// =============================================================================

/// Where notifications for one client handle go.
#[derive(Clone)]
pub(crate) struct Route {
    pub(crate) subscription_id: u32,
    pub(crate) node: Node,
    pub(crate) attribute_id: u32,
    pub(crate) kind: MonitoredItemKind,
    pub(crate) events: broadcast::Sender<SubscriptionEvent>,
}

/// Client handle to route map of one connection.
pub(crate) type RouteTable = RwLock<HashMap<u32, Route>>;

// =============================================================================
// PollLoop
// =============================================================================

pub(crate) struct PollLoop {
    pub(crate) connection_id: u64,
    pub(crate) transport: Arc<dyn UaTransport>,
    pub(crate) routes: Arc<RouteTable>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) stats: Arc<ConnectionStats>,
    pub(crate) interval: Duration,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl PollLoop {
    /// Runs until shutdown is signalled.
    pub(crate) async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(connection_id = self.connection_id, interval = ?self.interval, "Poll loop started");

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.is_shutting_down() {
                        break;
                    }
                    // A stalled transport or sink must not keep close() waiting.
                    let mut shutdown = self.shutdown.clone();
                    tokio::select! {
                        biased;
                        _ = shutdown.wait_for(|stop| *stop) => {
                            debug!(connection_id = self.connection_id, "Tick abandoned on shutdown");
                            break;
                        }
                        _ = self.tick() => {}
                    }
                }
            }
        }

        debug!(connection_id = self.connection_id, "Poll loop stopped");
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn tick(&self) {
        self.stats.record_poll_tick();

        let notifications = match self.transport.process_events().await {
            Ok(notifications) => notifications,
            Err(e) => {
                self.stats.record_poll_error();
                e.log("poll");
                return;
            }
        };

        if !notifications.is_empty() {
            trace!(
                connection_id = self.connection_id,
                count = notifications.len(),
                "Dispatching notifications"
            );
        }

        for notification in notifications {
            // close() is waiting for us; deliver nothing more.
            if self.is_shutting_down() {
                return;
            }
            self.dispatch(notification).await;
        }
    }

    async fn dispatch(&self, notification: Notification) {
        let client_handle = notification.client_handle();
        let route = self.routes.read().get(&client_handle).cloned();
        let Some(route) = route else {
            trace!(
                connection_id = self.connection_id,
                client_handle,
                "Notification for unknown monitored item dropped"
            );
            return;
        };

        let event = match (notification, route.kind) {
            (Notification::DataChange { value, .. }, MonitoredItemKind::DataChange) => {
                match route.node.apply_update(route.attribute_id, &value) {
                    ApplyOutcome::Rejected(e) => warn!(
                        connection_id = self.connection_id,
                        node_id = %route.node.node_id(),
                        attribute_id = route.attribute_id,
                        error = %e,
                        "Notification value does not fit the attribute"
                    ),
                    outcome => trace!(
                        node_id = %route.node.node_id(),
                        attribute_id = route.attribute_id,
                        ?outcome,
                        "Cache updated"
                    ),
                }
                SubscriptionEvent::DataChanged(DataChangeEvent {
                    connection_id: self.connection_id,
                    subscription_id: route.subscription_id,
                    node: route.node.clone(),
                    attribute_id: route.attribute_id,
                    value,
                })
            }
            (Notification::Event { fields, .. }, MonitoredItemKind::Event) => {
                SubscriptionEvent::Event(EventNotification {
                    connection_id: self.connection_id,
                    subscription_id: route.subscription_id,
                    node: route.node.clone(),
                    fields,
                })
            }
            (_, kind) => {
                warn!(
                    connection_id = self.connection_id,
                    client_handle,
                    ?kind,
                    "Notification kind does not match monitored item"
                );
                return;
            }
        };

        self.stats.record_notification();
        let _ = route.events.send(event.clone());
        self.sink.on_event(event.into()).await;
    }
}
