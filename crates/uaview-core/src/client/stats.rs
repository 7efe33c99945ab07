// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-connection operation counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Counters for one connection, shared by its nodes and poll task.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    reads: AtomicU64,
    writes: AtomicU64,
    browses: AtomicU64,
    calls: AtomicU64,
    errors: AtomicU64,
    notifications: AtomicU64,
    poll_ticks: AtomicU64,
    poll_errors: AtomicU64,
    total_response_time_us: AtomicU64,
}

impl ConnectionStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed attribute read.
    pub fn record_read(&self, duration: Duration) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.add_response_time(duration);
    }

    /// Records a completed attribute write.
    pub fn record_write(&self, duration: Duration) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.add_response_time(duration);
    }

    /// Records a browse.
    pub fn record_browse(&self) {
        self.browses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a method call.
    pub fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed request.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a delivered notification.
    pub fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one poll loop iteration.
    pub fn record_poll_tick(&self) {
        self.poll_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed poll.
    pub fn record_poll_error(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn add_response_time(&self, duration: Duration) {
        self.total_response_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Returns the number of reads.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of delivered notifications.
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        let reads = self.reads();
        let writes = self.writes.load(Ordering::Relaxed);
        let total_ops = reads + writes;
        let average_response_time = if total_ops == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.total_response_time_us.load(Ordering::Relaxed) / total_ops)
        };

        StatsSnapshot {
            reads,
            writes,
            browses: self.browses.load(Ordering::Relaxed),
            calls: self.calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            notifications: self.notifications(),
            poll_ticks: self.poll_ticks.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            average_response_time,
        }
    }

    /// Resets all counters.
    pub fn reset(&self) {
        for counter in [
            &self.reads,
            &self.writes,
            &self.browses,
            &self.calls,
            &self.errors,
            &self.notifications,
            &self.poll_ticks,
            &self.poll_errors,
            &self.total_response_time_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Copy of [`ConnectionStats`] at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Attribute reads.
    pub reads: u64,
    /// Attribute writes.
    pub writes: u64,
    /// Browses.
    pub browses: u64,
    /// Method calls.
    pub calls: u64,
    /// Failed requests.
    pub errors: u64,
    /// Notifications delivered to caches and observers.
    pub notifications: u64,
    /// Poll loop iterations.
    pub poll_ticks: u64,
    /// Failed polls.
    pub poll_errors: u64,
    /// Mean read/write round trip.
    pub average_response_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let stats = ConnectionStats::new();
        stats.record_read(Duration::from_micros(300));
        stats.record_write(Duration::from_micros(100));
        stats.record_notification();
        stats.record_poll_tick();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.reads, 1);
        assert_eq!(snapshot.writes, 1);
        assert_eq!(snapshot.notifications, 1);
        assert_eq!(snapshot.average_response_time, Duration::from_micros(200));

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
