mod config;
mod engine;
mod error;
mod event;
mod router;
mod scanner;
mod stats;
mod watch;

#[cfg(test)]
mod test_support;

pub use config::{OwnerLookup, StoreArtifacts, SyncConfig};
pub use engine::{POLL_INTERVAL, RunSummary, RunningEngine, SyncEngine};
pub use error::SyncError;
pub use event::{ChangeEvent, dir_prefix};
pub use router::{ChangeEventRouter, EventOutcome};
pub use scanner::{ReconcileReport, ReconciliationScanner};
pub use stats::{StatsSnapshot, SyncStats};
pub use watch::{NotifyWatchSource, WatchMessage, WatchSource, translate};
