use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use crossbeam::channel::Sender;
use log::debug;
use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{ModifyKind, RemoveKind, RenameMode},
};

use crate::{error::SyncError, event::ChangeEvent};

/// What the watch boundary delivers to the engine.
#[derive(Debug)]
pub enum WatchMessage {
    Change(ChangeEvent),
    /// The provider lost events; the index must be reconciled.
    Rescan,
    /// The provider reported an error; events may have been lost.
    Error(String),
}

/// Source of live change notifications for a subtree.
pub trait WatchSource: Send {
    /// Begin delivering notifications for `root` into `sink`. Nothing is sent
    /// before this is called.
    fn arm(&mut self, root: &Path, sink: Sender<WatchMessage>) -> Result<(), SyncError>;

    /// Stop delivery. Once this returns no further message is sent.
    fn disarm(&mut self);
}

/// `notify`-backed recursive watcher.
#[derive(Default)]
pub struct NotifyWatchSource {
    watcher: Option<RecommendedWatcher>,
    /// Open while armed. The handler sends while holding it, so closing it
    /// waits out any delivery in progress.
    gate: Arc<Mutex<bool>>,
}

impl NotifyWatchSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatchSource for NotifyWatchSource {
    fn arm(&mut self, root: &Path, sink: Sender<WatchMessage>) -> Result<(), SyncError> {
        self.disarm();

        let arm_error = |e: notify::Error| SyncError::Arm {
            path: root.to_path_buf(),
            reason: e.to_string(),
        };

        let gate = Arc::new(Mutex::new(true));
        let handler_gate = Arc::clone(&gate);
        let mut pairing = RenamePairing::default();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let open = handler_gate.lock().unwrap_or_else(PoisonError::into_inner);
            if !*open {
                return;
            }
            for msg in messages_for(res, &mut pairing) {
                if sink.send(msg).is_err() {
                    break;
                }
            }
        })
        .map_err(arm_error)?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(arm_error)?;

        self.gate = gate;
        self.watcher = Some(watcher);
        Ok(())
    }

    fn disarm(&mut self) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;
        if self.watcher.take().is_some() {
            debug!("[watch] disarmed");
        }
    }
}

impl Drop for NotifyWatchSource {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Remembers the tracker of the last `From` rename half. inotify follows a
/// `To` carrying that tracker with a `Both` naming both paths, so the `To`
/// adds nothing but a second walk of a renamed directory.
#[derive(Debug, Default)]
struct RenamePairing {
    pending_from: Option<usize>,
}

impl RenamePairing {
    fn restated_later(&mut self, event: &Event) -> bool {
        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.pending_from = event.tracker();
                false
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                event.tracker().is_some() && event.tracker() == self.pending_from
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if event.tracker() == self.pending_from {
                    self.pending_from = None;
                }
                false
            }
            _ => false,
        }
    }
}

fn messages_for(res: notify::Result<Event>, pairing: &mut RenamePairing) -> Vec<WatchMessage> {
    match res {
        Ok(event) => {
            let mut out = Vec::new();
            if event.need_rescan() {
                out.push(WatchMessage::Rescan);
            }
            if !pairing.restated_later(&event) {
                out.extend(translate(&event).into_iter().map(WatchMessage::Change));
            }
            out
        }
        Err(e) => vec![WatchMessage::Error(e.to_string())],
    }
}

/// Map one provider event onto router events.
pub fn translate(event: &Event) -> Vec<ChangeEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => paths
            .iter()
            .map(|p| ChangeEvent::Create { path: p.clone() })
            .collect(),
        EventKind::Remove(RemoveKind::File) => deletes(paths, false),
        EventKind::Remove(RemoveKind::Folder) => deletes(paths, true),
        EventKind::Remove(_) => paths
            .iter()
            .flat_map(|p| ChangeEvent::ambiguous_delete(p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match paths.as_slice() {
            [from, to, ..] => vec![ChangeEvent::Move {
                from: from.clone(),
                to: to.clone(),
            }],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => paths
            .iter()
            .flat_map(|p| ChangeEvent::ambiguous_delete(p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => paths
            .iter()
            .map(|p| ChangeEvent::Create { path: p.clone() })
            .collect(),
        // Rename halves the provider could not pair: whatever still exists
        // arrived, whatever is gone left.
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .iter()
            .flat_map(|p| {
                if fs::symlink_metadata(p).is_ok() {
                    vec![ChangeEvent::Create { path: p.clone() }]
                } else {
                    ChangeEvent::ambiguous_delete(p).to_vec()
                }
            })
            .collect(),
        EventKind::Modify(_) => paths
            .iter()
            .map(|p| ChangeEvent::Modify { path: p.clone() })
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn deletes(paths: &[PathBuf], is_dir: bool) -> Vec<ChangeEvent> {
    paths
        .iter()
        .map(|p| ChangeEvent::Delete {
            path: p.clone(),
            is_dir,
        })
        .collect()
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
