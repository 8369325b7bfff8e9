use std::{io, path::PathBuf};

use keeper_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("index store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to arm watcher on {path}: {reason}")]
    Arm { path: PathBuf, reason: String },
    #[error("notification stream terminated unexpectedly")]
    WatchStreamTerminated,
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("reconcile interrupted by shutdown")]
    Cancelled,
    #[error("sync worker thread panicked")]
    WorkerPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_names_the_thread() {
        let err = SyncError::Spawn {
            name: "keeper-sync",
            source: io::Error::from(io::ErrorKind::OutOfMemory),
        };

        assert!(err.to_string().starts_with("failed to spawn keeper-sync thread"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
