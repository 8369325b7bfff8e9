use std::{
    collections::{HashMap, HashSet},
    fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crossbeam::channel;
use keeper_fs::{FileRecord, MetadataProbe, walk_parallel};
use keeper_store::IndexStore;
use log::{debug, error, info};
use serde::Serialize;

use crate::{config::StoreArtifacts, error::SyncError, stats::SyncStats};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Files probed successfully during the walk.
    pub files_read: usize,
    /// Records inserted or replaced because they differed from the store.
    pub files_written: usize,
    /// Records deleted because their path is no longer observable.
    pub files_removed: usize,
    pub write_failures: usize,
}

impl ReconcileReport {
    pub fn mutations(&self) -> usize {
        self.files_written + self.files_removed
    }
}

/// One full pass that makes the store match the subtree on disk.
pub struct ReconciliationScanner {
    root: PathBuf,
    store: Arc<IndexStore>,
    probe: MetadataProbe,
    stats: Arc<SyncStats>,
    artifacts: StoreArtifacts,
    walker_threads: usize,
}

impl ReconciliationScanner {
    pub fn new(
        root: PathBuf,
        store: Arc<IndexStore>,
        probe: MetadataProbe,
        stats: Arc<SyncStats>,
    ) -> Self {
        Self {
            root,
            store,
            probe,
            stats,
            artifacts: StoreArtifacts::default(),
            walker_threads: 1,
        }
    }

    pub fn with_artifacts(mut self, artifacts: StoreArtifacts) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_walker_threads(mut self, threads: usize) -> Self {
        self.walker_threads = threads.max(1);
        self
    }

    /// Walk the root, upsert every observable file whose record changed, then
    /// delete stored paths the walk did not observe.
    ///
    /// Per-path failures are logged and counted. Only an unreadable root or an
    /// unreachable store fails the pass, since continuing would wipe the index.
    pub fn reconcile(&self) -> Result<ReconcileReport, SyncError> {
        self.reconcile_until(&AtomicBool::new(false))
    }

    /// Like `reconcile`, but gives up with `SyncError::Cancelled` once `cancel`
    /// is set. Rows written so far stay; nothing is removed.
    pub fn reconcile_until(&self, cancel: &AtomicBool) -> Result<ReconcileReport, SyncError> {
        fs::read_dir(&self.root).map_err(|source| SyncError::Walk {
            path: self.root.clone(),
            source,
        })?;

        let existing: HashMap<String, FileRecord> = self
            .store
            .all()?
            .into_iter()
            .map(|r| (r.path.clone(), r))
            .collect();

        let (file_tx, file_rx) = channel::unbounded::<Vec<PathBuf>>();

        let walker_handle = {
            let root = self.root.clone();
            let threads = self.walker_threads;
            let tx = file_tx.clone();

            thread::Builder::new()
                .name("keeper-walk".into())
                .spawn(move || walk_parallel(vec![root], tx, threads))
                .map_err(|source| SyncError::Spawn {
                    name: "keeper-walk",
                    source,
                })?
        };

        drop(file_tx);

        let mut report = ReconcileReport::default();
        let mut observed: HashSet<String> = HashSet::with_capacity(existing.len());

        let mut cancelled = false;

        while let Ok(batch) = file_rx.recv() {
            if cancel.load(Ordering::Acquire) {
                cancelled = true;
                break;
            }
            for path in batch {
                if self.artifacts.contains(&path) {
                    continue;
                }

                let record = match self.probe.probe(&path) {
                    Ok(record) => record,
                    Err(e) => {
                        debug!("[reconcile] skipped: {e}");
                        continue;
                    }
                };

                report.files_read += 1;
                observed.insert(record.path.clone());

                if existing.get(&record.path) == Some(&record) {
                    continue;
                }

                match self.store.upsert(&record) {
                    Ok(()) => report.files_written += 1,
                    Err(e) => {
                        error!("[reconcile] store write failed for {}: {e}", record.path);
                        self.stats.record_write_failure();
                        report.write_failures += 1;
                    }
                }
            }
        }

        if cancelled {
            // Walker threads stop once their next batch finds no receiver.
            drop(file_rx);
            let _ = walker_handle.join();
            info!(
                "[reconcile] {}: cancelled after {} files",
                self.root.display(),
                report.files_read
            );
            return Err(SyncError::Cancelled);
        }

        walker_handle
            .join()
            .map_err(|_| SyncError::WorkerPanicked)?
            .map_err(|source| SyncError::Walk {
                path: self.root.clone(),
                source,
            })?;

        let stored = self.store.all_paths()?;
        for stale in stored.difference(&observed) {
            match self.store.delete_exact(stale) {
                Ok(_) => report.files_removed += 1,
                Err(e) => {
                    error!("[reconcile] store delete failed for {stale}: {e}");
                    self.stats.record_write_failure();
                    report.write_failures += 1;
                }
            }
        }

        info!(
            "[reconcile] {}: read={}, written={}, removed={}, failures={}",
            self.root.display(),
            report.files_read,
            report.files_written,
            report.files_removed,
            report.write_failures,
        );

        Ok(report)
    }
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
