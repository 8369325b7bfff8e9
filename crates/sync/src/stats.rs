use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by the scanner, router and engine.
#[derive(Debug, Default)]
pub struct SyncStats {
    events_applied: AtomicU64,
    events_dropped: AtomicU64,
    write_failures: AtomicU64,
    rescans: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub events_applied: u64,
    pub events_dropped: u64,
    pub write_failures: u64,
    pub rescans: u64,
}

impl SyncStats {
    pub fn record_applied(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rescan(&self) {
        self.rescans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_applied: self.events_applied.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            rescans: self.rescans.load(Ordering::Relaxed),
        }
    }
}
