use std::{
    fs::read_dir,
    io::Result,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use log::{debug, warn};

use crate::config::BATCH_SIZE;

/// Multi-threaded parallel walk using crossbeam.
///
/// Worker threads pull directories off a shared queue, push subdirectories
/// back onto it and send every non-directory entry they see to `file_tx` in
/// batches. Symlinks are reported as entries, never followed as directories.
/// Unreadable directories are logged and skipped. If the receiving end of
/// `file_tx` goes away, every worker stops at its next directory.
pub fn walk_parallel(
    roots: Vec<PathBuf>,
    file_tx: Sender<Vec<PathBuf>>,
    num_threads: usize,
) -> Result<()> {
    let (work_tx, work_rx) = channel::unbounded::<PathBuf>();

    // Directories queued or in progress; zero means the walk is complete.
    let pending = Arc::new(AtomicUsize::new(roots.len()));
    let aborted = Arc::new(AtomicBool::new(false));

    for root in roots {
        let _ = work_tx.send(root);
    }

    let num_threads = num_threads.max(1);
    debug!("[walk_parallel] starting with {} threads", num_threads);

    thread::scope(|s| {
        for _ in 0..num_threads {
            let work_rx = work_rx.clone();
            let work_tx = work_tx.clone();
            let file_tx = file_tx.clone();
            let pending = Arc::clone(&pending);
            let aborted = Arc::clone(&aborted);

            s.spawn(move || {
                worker_loop(work_rx, work_tx, file_tx, &pending, &aborted);
            });
        }
    });

    Ok(())
}

fn worker_loop(
    work_rx: channel::Receiver<PathBuf>,
    work_tx: channel::Sender<PathBuf>,
    file_tx: Sender<Vec<PathBuf>>,
    pending: &AtomicUsize,
    aborted: &AtomicBool,
) {
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    loop {
        if aborted.load(Ordering::Acquire) {
            return;
        }

        match work_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(dir) => {
                scan_dir(&dir, &work_tx, &mut batch, pending);

                if batch.len() >= BATCH_SIZE {
                    let to_send = std::mem::take(&mut batch);
                    if file_tx.send(to_send).is_err() {
                        debug!("[walk] consumer gone; stopping");
                        aborted.store(true, Ordering::Release);
                        return;
                    }
                }

                if pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if pending.load(Ordering::Acquire) == 0 {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                break;
            }
        }
    }

    if !batch.is_empty() {
        let _ = file_tx.send(batch);
    }
}

/// Queue subdirectories of `dir` and collect its other entries into `batch`.
fn scan_dir(
    dir: &Path,
    work_tx: &channel::Sender<PathBuf>,
    batch: &mut Vec<PathBuf>,
    pending: &AtomicUsize,
) {
    let rd = match read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!("[walk] read_dir({:?}) failed: {e}", dir);
            return;
        }
    };

    for entry_res in rd {
        let entry = match entry_res {
            Ok(e) => e,
            Err(e) => {
                warn!("[walk] error reading entry in {:?}: {e}", dir);
                continue;
            }
        };

        // file_type() does not follow symlinks, so a link to a directory
        // lands in the batch and the probe decides what it is.
        let is_dir = match entry.file_type() {
            Ok(ft) => ft.is_dir(),
            Err(e) => {
                warn!("[walk] file_type({:?}) failed: {e}", entry.path());
                continue;
            }
        };

        if is_dir {
            pending.fetch_add(1, Ordering::AcqRel);
            let _ = work_tx.send(entry.path());
        } else {
            batch.push(entry.path());
        }
    }
}

/// Walk `root` and return every non-directory path beneath it.
pub fn collect_files(root: &Path, num_threads: usize) -> Result<Vec<PathBuf>> {
    let (file_tx, file_rx) = channel::unbounded::<Vec<PathBuf>>();
    walk_parallel(vec![root.to_path_buf()], file_tx, num_threads)?;

    Ok(file_rx.try_iter().flatten().collect())
}

#[cfg(test)]
#[path = "walker_tests.rs"]
mod tests;
