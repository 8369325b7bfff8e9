use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use log::{debug, warn};
use thiserror::Error;

use crate::{
    owner::OwnerResolver,
    record::{FileRecord, UNKNOWN_OWNER, format_mtime, size_in_kb, split_name},
};

/// Why a path could not be observed. Every variant means the entry is
/// currently not observable; callers drop the event rather than retry.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{path}: not found")]
    NotFound { path: PathBuf },
    #[error("{path}: {source}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}: not a regular file")]
    NotRegularFile { path: PathBuf },
    #[error("{path}: path is not valid UTF-8")]
    NonUtf8Path { path: PathBuf },
    #[error("{path}: probe timed out after {after:?}")]
    TimedOut { path: PathBuf, after: Duration },
}

impl ProbeError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            ProbeError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ProbeError::PermissionDenied {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ProbeError::NotFound { path }
            | ProbeError::PermissionDenied { path, .. }
            | ProbeError::NotRegularFile { path }
            | ProbeError::NonUtf8Path { path }
            | ProbeError::TimedOut { path, .. } => path,
        }
    }
}

/// Threads kept for deadline-bound probes. A probe stuck on a hung mount
/// holds one of them until it returns; once all are stuck, further probes
/// queue and time out instead of spawning more threads.
pub const PROBE_WORKERS: usize = 4;

type ProbeResult = Result<FileRecord, ProbeError>;

struct ProbeJob {
    path: PathBuf,
    reply: Sender<ProbeResult>,
}

/// Attribute lookup for a single path.
#[derive(Clone)]
pub struct MetadataProbe {
    resolver: Arc<dyn OwnerResolver>,
    deadline: Option<Deadline>,
}

/// The timeout plus the shared queue feeding the probe workers. Workers exit
/// when the last clone of the owning probe is dropped.
#[derive(Clone)]
struct Deadline {
    timeout: Duration,
    jobs: Option<Sender<ProbeJob>>,
}

impl MetadataProbe {
    pub fn new(resolver: Arc<dyn OwnerResolver>) -> Self {
        Self {
            resolver,
            deadline: None,
        }
    }

    /// Abandon probes that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let jobs = spawn_workers(&self.resolver, PROBE_WORKERS);
        self.deadline = Some(Deadline { timeout, jobs });
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.deadline.as_ref().map(|d| d.timeout)
    }

    pub fn probe(&self, path: &Path) -> Result<FileRecord, ProbeError> {
        match &self.deadline {
            None => probe_path(path, self.resolver.as_ref()),
            Some(Deadline {
                jobs: Some(jobs),
                timeout,
            }) => probe_on_worker(jobs, path, *timeout),
            // No worker could be started.
            Some(Deadline { jobs: None, .. }) => probe_path(path, self.resolver.as_ref()),
        }
    }
}

fn spawn_workers(resolver: &Arc<dyn OwnerResolver>, count: usize) -> Option<Sender<ProbeJob>> {
    let (jobs_tx, jobs_rx) = channel::unbounded::<ProbeJob>();
    let mut started = 0;

    for i in 0..count {
        let jobs = jobs_rx.clone();
        let resolver = Arc::clone(resolver);

        let spawned = thread::Builder::new()
            .name(format!("keeper-probe-{i}"))
            .spawn(move || {
                for job in jobs.iter() {
                    let _ = job.reply.send(probe_path(&job.path, resolver.as_ref()));
                }
            });

        match spawned {
            Ok(_) => started += 1,
            Err(e) => warn!("[probe] cannot start probe worker: {e}"),
        }
    }

    if started == 0 {
        warn!("[probe] no probe workers; probing without a deadline");
        return None;
    }
    Some(jobs_tx)
}

fn probe_on_worker(jobs: &Sender<ProbeJob>, path: &Path, timeout: Duration) -> ProbeResult {
    let (reply, rx) = channel::bounded(1);
    let job = ProbeJob {
        path: path.to_path_buf(),
        reply,
    };

    if jobs.send(job).is_err() {
        return Err(worker_gone(path));
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ProbeError::TimedOut {
            path: path.to_path_buf(),
            after: timeout,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(worker_gone(path)),
    }
}

fn worker_gone(path: &Path) -> ProbeError {
    ProbeError::PermissionDenied {
        path: path.to_path_buf(),
        source: io::Error::other("probe worker exited without a result"),
    }
}

/// Stat `path` and build its record. Symlinks are followed.
pub fn probe_path(path: &Path, resolver: &dyn OwnerResolver) -> Result<FileRecord, ProbeError> {
    let metadata = fs::metadata(path).map_err(|e| ProbeError::from_io(path, e))?;

    if !metadata.is_file() {
        return Err(ProbeError::NotRegularFile {
            path: path.to_path_buf(),
        });
    }

    let key = path.to_str().ok_or_else(|| ProbeError::NonUtf8Path {
        path: path.to_path_buf(),
    })?;

    let modified = metadata
        .modified()
        .map_err(|e| ProbeError::from_io(path, e))?;

    let owner = match resolver.resolve_owner(path, &metadata) {
        Ok(owner) => owner,
        Err(e) => {
            debug!("[probe] owner of {:?} unresolved: {e}", path);
            UNKNOWN_OWNER.to_owned()
        }
    };

    let (name, extension) = split_name(path);

    Ok(FileRecord {
        path: key.to_owned(),
        name,
        extension,
        size_kb: size_in_kb(metadata.len()),
        modified_at: format_mtime(modified),
        owner,
        observed_delta_size: 0,
    })
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
