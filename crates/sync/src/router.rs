use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use keeper_fs::{MetadataProbe, ProbeError, collect_files};
use keeper_store::{IndexStore, StoreError};
use log::{debug, error, info, warn};

use crate::{
    config::StoreArtifacts,
    event::{ChangeEvent, dir_prefix},
    stats::SyncStats,
};

/// What applying one event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The store now reflects the event (possibly as a no-op).
    Applied,
    /// The entry could not be observed; nothing was written.
    Dropped,
    /// At least one store write failed.
    Failed,
}

/// Translates one change notification into store operations.
///
/// Holds no per-file state. Failures are contained to the event that caused
/// them: `apply` never panics and never returns an error.
pub struct ChangeEventRouter {
    store: Arc<IndexStore>,
    probe: MetadataProbe,
    stats: Arc<SyncStats>,
    artifacts: StoreArtifacts,
    root: Option<PathBuf>,
    walker_threads: usize,
}

impl ChangeEventRouter {
    pub fn new(store: Arc<IndexStore>, probe: MetadataProbe, stats: Arc<SyncStats>) -> Self {
        Self {
            store,
            probe,
            stats,
            artifacts: StoreArtifacts::default(),
            root: None,
            walker_threads: 1,
        }
    }

    /// Only index paths inside `root`.
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }

    /// Never index these paths.
    pub fn with_artifacts(mut self, artifacts: StoreArtifacts) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Threads used when a directory appears and its subtree must be indexed.
    pub fn with_walker_threads(mut self, threads: usize) -> Self {
        self.walker_threads = threads.max(1);
        self
    }

    pub fn apply(&self, event: &ChangeEvent) -> EventOutcome {
        let outcome = match event {
            ChangeEvent::Create { path } => self.on_create(path),
            ChangeEvent::Delete { path, is_dir } => self.on_delete(path, *is_dir),
            ChangeEvent::Modify { path } => self.on_modify(path),
            ChangeEvent::Move { from, to } => self.on_move(from, to),
        };

        match outcome {
            EventOutcome::Applied => self.stats.record_applied(),
            EventOutcome::Dropped => self.stats.record_dropped(),
            // Counted per write in `checked`.
            EventOutcome::Failed => {}
        }

        outcome
    }

    fn on_create(&self, path: &Path) -> EventOutcome {
        if !self.in_scope(path) {
            debug!("[create] {} is out of scope", path.display());
            return EventOutcome::Dropped;
        }

        match self.probe.probe(path) {
            Ok(record) => {
                info!("[created] {}", path.display());
                match self.checked("create", path, self.store.upsert(&record)) {
                    Some(()) => EventOutcome::Applied,
                    None => EventOutcome::Failed,
                }
            }
            Err(ProbeError::NotRegularFile { .. }) if is_real_dir(path) => self.index_subtree(path),
            Err(e) => {
                debug!("[create] dropped: {e}");
                EventOutcome::Dropped
            }
        }
    }

    fn on_delete(&self, path: &Path, is_dir: bool) -> EventOutcome {
        let removed = if is_dir {
            let Some(prefix) = dir_prefix(path) else {
                debug!("[delete] dropped non UTF-8 path {:?}", path);
                return EventOutcome::Dropped;
            };
            self.checked("delete", path, self.store.delete_prefix(&prefix))
        } else {
            let Some(key) = path.to_str() else {
                debug!("[delete] dropped non UTF-8 path {:?}", path);
                return EventOutcome::Dropped;
            };
            self.checked("delete", path, self.store.delete_exact(key))
        };

        match removed {
            Some(0) => {
                debug!("[delete] {} had no records", path.display());
                EventOutcome::Applied
            }
            Some(n) => {
                info!("[deleted] {} ({n} records)", path.display());
                EventOutcome::Applied
            }
            None => EventOutcome::Failed,
        }
    }

    /// Only ever updates an indexed record; a modify for an unknown path is
    /// dropped rather than inserted.
    fn on_modify(&self, path: &Path) -> EventOutcome {
        if !self.in_scope(path) {
            return EventOutcome::Dropped;
        }

        let record = match self.probe.probe(path) {
            Ok(record) => record,
            Err(e) => {
                debug!("[modify] dropped: {e}");
                return EventOutcome::Dropped;
            }
        };

        let updated = self.store.update_observed_size(&record.path, record.size_kb);
        match self.checked("modify", path, updated) {
            Some(0) => {
                debug!("[modify] {} is not indexed; ignored", path.display());
                EventOutcome::Dropped
            }
            Some(_) => {
                info!("[modified] {} ({} KiB)", path.display(), record.size_kb);
                EventOutcome::Applied
            }
            None => EventOutcome::Failed,
        }
    }

    /// Delete the old key, then index whatever is now at the new one. Each half
    /// stands alone, so a move across the subtree boundary degrades to a plain
    /// delete or a plain create.
    fn on_move(&self, from: &Path, to: &Path) -> EventOutcome {
        info!("[moved] {} -> {}", from.display(), to.display());

        let mut failed = false;

        if let Some(key) = from.to_str() {
            failed |= self
                .checked("move", from, self.store.delete_exact(key))
                .is_none();
        }

        if !self.in_scope(to) {
            debug!("[move] destination {} is out of scope", to.display());
            return if failed {
                EventOutcome::Failed
            } else {
                EventOutcome::Applied
            };
        }

        match self.probe.probe(to) {
            Ok(record) => {
                failed |= self
                    .checked("move", to, self.store.upsert(&record))
                    .is_none();
            }
            Err(ProbeError::NotRegularFile { .. }) if is_real_dir(to) => {
                if let Some(prefix) = dir_prefix(from) {
                    failed |= self
                        .checked("move", from, self.store.delete_prefix(&prefix))
                        .is_none();
                }
                failed |= self.index_subtree(to) == EventOutcome::Failed;
            }
            Err(e) => debug!("[move] destination dropped: {e}"),
        }

        if failed {
            EventOutcome::Failed
        } else {
            EventOutcome::Applied
        }
    }

    /// Index every file below a directory that just appeared.
    fn index_subtree(&self, dir: &Path) -> EventOutcome {
        let files = match collect_files(dir, self.walker_threads) {
            Ok(files) => files,
            Err(e) => {
                warn!("[create] cannot walk {}: {e}", dir.display());
                return EventOutcome::Dropped;
            }
        };

        let mut indexed = 0usize;
        let mut failed = false;

        for path in files {
            if !self.in_scope(&path) {
                continue;
            }
            match self.probe.probe(&path) {
                Ok(record) => match self.checked("create", &path, self.store.upsert(&record)) {
                    Some(()) => indexed += 1,
                    None => failed = true,
                },
                Err(e) => debug!("[create] skipped: {e}"),
            }
        }

        info!("[created] {} ({indexed} files)", dir.display());

        if failed {
            EventOutcome::Failed
        } else {
            EventOutcome::Applied
        }
    }

    /// Whether `path` may be indexed at all.
    fn in_scope(&self, path: &Path) -> bool {
        if self.artifacts.contains(path) {
            return false;
        }
        match &self.root {
            Some(root) => path.starts_with(root),
            None => true,
        }
    }

    /// Log and count a failed store write; `None` means it failed.
    fn checked<T>(&self, op: &str, path: &Path, result: Result<T, StoreError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                error!("[{op}] store write failed for {}: {e}", path.display());
                self.stats.record_write_failure();
                None
            }
        }
    }
}

/// A directory that is not reached through a symlink. The walker never
/// descends links, so neither does the router.
fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
