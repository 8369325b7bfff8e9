use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use keeper_fs::{MetadataProbe, NoopOwnerResolver, OwnerResolver, SystemOwnerResolver};
use keeper_runtime::{DEFAULT_PROBE_TIMEOUT_MS, STORE_SIDECAR_SUFFIXES};
use tempfile::NamedTempFile;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OwnerLookup {
    /// Platform account database.
    #[default]
    System,
    /// Every record gets the unknown owner.
    Disabled,
}

/// Everything the engine needs, fixed at construction.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub root: PathBuf,
    pub store_path: PathBuf,
    /// `None` probes inline with no deadline.
    pub probe_timeout: Option<Duration>,
    pub owner_lookup: OwnerLookup,
    pub walker_threads: usize,
}

impl SyncConfig {
    pub fn new(root: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            store_path: store_path.into(),
            probe_timeout: Some(Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS)),
            owner_lookup: OwnerLookup::default(),
            walker_threads: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }

    /// Check the root is a readable directory and the store location is
    /// writable. Returns the config with both paths made canonical, so that
    /// watcher and walker paths share one key space.
    pub fn validate(mut self) -> Result<Self, SyncError> {
        let meta = fs::metadata(&self.root).map_err(|e| {
            SyncError::Config(format!("watch root {} is not accessible: {e}", self.root.display()))
        })?;
        if !meta.is_dir() {
            return Err(SyncError::Config(format!(
                "watch root {} is not a directory",
                self.root.display()
            )));
        }
        fs::read_dir(&self.root).map_err(|e| {
            SyncError::Config(format!("watch root {} is not readable: {e}", self.root.display()))
        })?;
        self.root = fs::canonicalize(&self.root).map_err(|e| {
            SyncError::Config(format!("cannot resolve watch root {}: {e}", self.root.display()))
        })?;

        self.store_path = validate_store_path(&self.store_path)?;
        self.walker_threads = self.walker_threads.max(1);

        Ok(self)
    }

    pub fn build_probe(&self) -> MetadataProbe {
        let resolver: Arc<dyn OwnerResolver> = match self.owner_lookup {
            OwnerLookup::System => Arc::new(SystemOwnerResolver),
            OwnerLookup::Disabled => Arc::new(NoopOwnerResolver),
        };

        let probe = MetadataProbe::new(resolver);
        match self.probe_timeout {
            Some(timeout) => probe.with_timeout(timeout),
            None => probe,
        }
    }

    pub fn store_artifacts(&self) -> StoreArtifacts {
        StoreArtifacts::for_store(&self.store_path)
    }
}

fn validate_store_path(store_path: &Path) -> Result<PathBuf, SyncError> {
    let file_name = store_path.file_name().ok_or_else(|| {
        SyncError::Config(format!("store path {} has no file name", store_path.display()))
    })?;

    if store_path.is_dir() {
        return Err(SyncError::Config(format!(
            "store path {} is a directory",
            store_path.display()
        )));
    }

    let parent = match store_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    fs::create_dir_all(&parent).map_err(|e| {
        SyncError::Config(format!("cannot create store directory {}: {e}", parent.display()))
    })?;
    NamedTempFile::new_in(&parent).map_err(|e| {
        SyncError::Config(format!("store directory {} is not writable: {e}", parent.display()))
    })?;

    let parent = fs::canonicalize(&parent).map_err(|e| {
        SyncError::Config(format!("cannot resolve store directory {}: {e}", parent.display()))
    })?;

    Ok(parent.join(file_name))
}

/// The database file and its SQLite sidecars. When the store lives inside the
/// watched root these are never indexed, or every write would echo back as a
/// modify event.
#[derive(Debug, Clone, Default)]
pub struct StoreArtifacts {
    paths: Vec<PathBuf>,
}

impl StoreArtifacts {
    pub fn for_store(store_path: &Path) -> Self {
        let mut paths = vec![store_path.to_path_buf()];
        for suffix in STORE_SIDECAR_SUFFIXES {
            let mut sidecar = store_path.as_os_str().to_owned();
            sidecar.push(suffix);
            paths.push(PathBuf::from(sidecar));
        }
        Self { paths }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_canonicalizes_root_and_store() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let root = tmp.path().join("watched");
        fs::create_dir(&root).unwrap();

        let cfg = SyncConfig::new(root.join("."), tmp.path().join("state").join("index.db"))
            .validate()
            .expect("valid config");

        assert_eq!(cfg.root, fs::canonicalize(&root).unwrap());
        assert_eq!(
            cfg.store_path,
            fs::canonicalize(tmp.path()).unwrap().join("state").join("index.db")
        );
        assert!(tmp.path().join("state").is_dir());
    }

    #[test]
    fn validate_rejects_missing_root() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let err = SyncConfig::new(tmp.path().join("nope"), tmp.path().join("index.db"))
            .validate()
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)), "got {err:?}");
    }

    #[test]
    fn validate_rejects_file_as_root() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let file = tmp.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        let err = SyncConfig::new(&file, tmp.path().join("index.db"))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn validate_rejects_directory_as_store() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let err = SyncConfig::new(tmp.path(), tmp.path())
            .validate()
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn store_artifacts_cover_sqlite_sidecars() {
        let artifacts = StoreArtifacts::for_store(Path::new("/data/index.db"));

        for p in [
            "/data/index.db",
            "/data/index.db-wal",
            "/data/index.db-shm",
            "/data/index.db-journal",
        ] {
            assert!(artifacts.contains(Path::new(p)), "{p}");
        }
        assert!(!artifacts.contains(Path::new("/data/index.dbx")));
        assert!(!artifacts.contains(Path::new("/data/other.db")));
    }

    #[test]
    fn build_probe_honours_timeout_setting() {
        let mut cfg = SyncConfig::new("/", "/tmp/index.db");
        assert_eq!(
            cfg.build_probe().timeout(),
            Some(Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS))
        );

        cfg.probe_timeout = None;
        assert_eq!(cfg.build_probe().timeout(), None);
    }
}
