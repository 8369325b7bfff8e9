use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use keeper_fs::{FileRecord, MetadataProbe, NoopOwnerResolver};
use keeper_store::IndexStore;
use tempfile::TempDir;

use crate::{
    config::StoreArtifacts, router::ChangeEventRouter, scanner::ReconciliationScanner,
    stats::SyncStats,
};

/// A watched tree and a store kept in separate temp dirs.
pub struct Fixture {
    pub tree: TempDir,
    pub state: TempDir,
    pub root: PathBuf,
    pub store: Arc<IndexStore>,
    pub stats: Arc<SyncStats>,
}

impl Fixture {
    pub fn new() -> Self {
        let tree = tempfile::tempdir().expect("create tree dir");
        let state = tempfile::tempdir().expect("create state dir");
        let root = fs::canonicalize(tree.path()).expect("canonical root");
        let store = Arc::new(IndexStore::open(&state.path().join("index.db")).expect("open store"));

        Self {
            tree,
            state,
            root,
            store,
            stats: Arc::new(SyncStats::default()),
        }
    }

    pub fn probe() -> MetadataProbe {
        MetadataProbe::new(Arc::new(NoopOwnerResolver))
    }

    pub fn scanner(&self) -> ReconciliationScanner {
        ReconciliationScanner::new(
            self.root.clone(),
            Arc::clone(&self.store),
            Self::probe(),
            Arc::clone(&self.stats),
        )
        .with_walker_threads(2)
    }

    pub fn router(&self) -> ChangeEventRouter {
        ChangeEventRouter::new(Arc::clone(&self.store), Self::probe(), Arc::clone(&self.stats))
            .with_root(self.root.clone())
            .with_walker_threads(2)
    }

    pub fn router_with_artifacts(&self, artifacts: StoreArtifacts) -> ChangeEventRouter {
        self.router().with_artifacts(artifacts)
    }

    /// Absolute path of `rel` inside the watched tree.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn key(&self, rel: &str) -> String {
        self.path(rel).to_str().expect("utf-8 path").to_owned()
    }

    /// Write `kib` KiB to `rel`, creating parent directories.
    pub fn write_kb(&self, rel: &str, kib: usize) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parents");
        }
        fs::write(&path, vec![b'k'; kib * 1024]).expect("write file");
        path
    }

    pub fn keys(&self) -> Vec<String> {
        self.store
            .all()
            .expect("snapshot")
            .into_iter()
            .map(|r| r.path)
            .collect()
    }

    pub fn record(&self, rel: &str) -> Option<FileRecord> {
        self.store.get(&self.key(rel)).expect("get")
    }
}

/// Store contents with event history stripped.
pub fn history_free(store: &IndexStore) -> Vec<FileRecord> {
    store
        .all()
        .expect("snapshot")
        .iter()
        .map(FileRecord::without_observed_size)
        .collect()
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

pub fn rel<'a>(root: &Path, key: &'a str) -> &'a str {
    key.strip_prefix(root.to_str().expect("utf-8 root"))
        .and_then(|s| s.strip_prefix(std::path::MAIN_SEPARATOR))
        .unwrap_or(key)
}
