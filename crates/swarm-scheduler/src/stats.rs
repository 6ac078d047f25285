// SPDX-License-Identifier: MIT

//! Dispatch statistics snapshot (spec §4.4).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DispatchStats {
    pub total_dispatches: u64,
    pub successful_dispatches: u64,
    pub failed_dispatches: u64,
    pub last_dispatch_at: Option<DateTime<Utc>>,
    pub paused_agents: usize,
    pub started_at: Option<DateTime<Utc>>,
}

/// Interior-mutable counters the scheduler updates from its tick loop and
/// dispatch tasks; `snapshot()` reads a consistent-enough point-in-time view.
#[derive(Default)]
pub struct StatsRecorder {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    last_dispatch_at: Mutex<Option<DateTime<Utc>>>,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_started(&self, now: DateTime<Utc>) {
        *self.started_at.lock() = Some(now);
    }

    pub fn record_success(&self, now: DateTime<Utc>) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.successful.fetch_add(1, Ordering::Relaxed);
        *self.last_dispatch_at.lock() = Some(now);
    }

    pub fn record_failure(&self, now: DateTime<Utc>) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        *self.last_dispatch_at.lock() = Some(now);
    }

    pub fn snapshot(&self, paused_agents: usize) -> DispatchStats {
        DispatchStats {
            total_dispatches: self.total.load(Ordering::Relaxed),
            successful_dispatches: self.successful.load(Ordering::Relaxed),
            failed_dispatches: self.failed.load(Ordering::Relaxed),
            last_dispatch_at: *self.last_dispatch_at.lock(),
            paused_agents,
            started_at: *self.started_at.lock(),
        }
    }
}
