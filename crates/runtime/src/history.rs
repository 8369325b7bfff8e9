use std::{
    env,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::PROGRAM_NAME;

pub const HISTORY_VERSION: u8 = 1;

pub const HISTORY_DISABLED_ENV: &str = "KEEPER_HISTORY";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum HistoryEvent {
    Reconcile(ReconcileEvent),
    Session(SessionEvent),
}

impl HistoryEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HistoryEvent::Reconcile(e) => e.timestamp,
            HistoryEvent::Session(e) => e.timestamp,
        }
    }
}

/// One completed full reconciliation pass.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileEvent {
    pub version: u8,
    pub timestamp: DateTime<Utc>,
    pub root: String,
    pub files_read: usize,
    pub files_written: usize,
    pub files_removed: usize,
    pub write_failures: usize,
    pub duration_ms: u64,
}

impl ReconcileEvent {
    pub fn new(
        root: String,
        files_read: usize,
        files_written: usize,
        files_removed: usize,
        write_failures: usize,
        duration_ms: u64,
    ) -> Self {
        Self {
            version: HISTORY_VERSION,
            timestamp: Utc::now(),
            root,
            files_read,
            files_written,
            files_removed,
            write_failures,
            duration_ms,
        }
    }
}

/// How a watch session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SessionEnd {
    Stopped,
    StreamTerminated,
}

/// One watch session, recorded when it ends.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionEvent {
    pub version: u8,
    pub timestamp: DateTime<Utc>,
    pub root: String,
    pub events_applied: u64,
    pub events_dropped: u64,
    pub write_failures: u64,
    pub rescans: u64,
    pub end: SessionEnd,
    pub duration_ms: u64,
}

impl SessionEvent {
    pub fn new(
        root: String,
        events_applied: u64,
        events_dropped: u64,
        write_failures: u64,
        rescans: u64,
        end: SessionEnd,
        duration_ms: u64,
    ) -> Self {
        Self {
            version: HISTORY_VERSION,
            timestamp: Utc::now(),
            root,
            events_applied,
            events_dropped,
            write_failures,
            rescans,
            end,
            duration_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

pub fn state_dir() -> Option<PathBuf> {
    if let Ok(xdg_state) = env::var("XDG_STATE_HOME")
        && !xdg_state.is_empty()
    {
        return Some(PathBuf::from(xdg_state).join(PROGRAM_NAME));
    }

    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|p| p.join(PROGRAM_NAME))
}

pub fn history_log_path() -> Option<PathBuf> {
    state_dir().map(|d| d.join("history.log"))
}

fn history_disabled() -> bool {
    match env::var(HISTORY_DISABLED_ENV) {
        Ok(val) => val == "0" || val.eq_ignore_ascii_case("false"),
        Err(_) => false,
    }
}

impl HistoryStore {
    pub fn new() -> Option<Self> {
        if history_disabled() {
            return None;
        }

        let path = history_log_path()?;
        Some(Self { path })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best effort: failures are logged at debug and otherwise ignored.
    pub fn record(&self, event: HistoryEvent) {
        if let Err(e) = self.append_event(&event) {
            debug!("Failed to log history event: {}", e);
        }
    }

    fn append_event(&self, event: &HistoryEvent) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(event).map_err(io::Error::other)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // One write per line; O_APPEND keeps concurrent writers from interleaving
        // in the common case.
        file.write_all(line.as_bytes())?;

        Ok(())
    }

    pub fn iter_events(&self) -> impl Iterator<Item = HistoryEvent> {
        self.read_events().into_iter().flatten()
    }

    fn read_events(&self) -> Option<Vec<HistoryEvent>> {
        let file = File::open(&self.path).ok()?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for line in reader.lines() {
            match line {
                Ok(line) => match serde_json::from_str(&line) {
                    Ok(ev) => events.push(ev),
                    Err(e) => debug!("Skipping malformed history line: {e}"),
                },
                Err(e) => {
                    debug!("Error reading history log: {e}");
                    break;
                }
            }
        }
        Some(events)
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEvent> {
        let mut events: Vec<HistoryEvent> = self.iter_events().collect();
        events.reverse();
        events.truncate(limit);
        events
    }

    pub fn count(&self) -> usize {
        self.iter_events().count()
    }

    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
