use std::{path::Path, time::SystemTime};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Owner reported when the owning principal cannot be resolved.
pub const UNKNOWN_OWNER: &str = "Unknown";

/// Timestamp layout for `modified_at`: local time, second granularity.
pub const MTIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One indexed file, keyed by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    /// Final path segment without its last extension
    pub name: String,
    /// Last extension including the dot e.g., '.pdf', or empty
    pub extension: String,
    /// Size in whole KiB, floor-divided
    pub size_kb: u64,
    pub modified_at: String,
    pub owner: String,
    /// Size most recently reported by a modify notification. Reset to 0 on
    /// every full probe.
    pub observed_delta_size: u64,
}

impl FileRecord {
    /// Same record with `observed_delta_size` cleared, for comparisons that
    /// ignore event history.
    pub fn without_observed_size(&self) -> FileRecord {
        FileRecord {
            observed_delta_size: 0,
            ..self.clone()
        }
    }
}

/// Split the final path segment into `(name, extension)`.
///
/// A leading dot does not start an extension, so `.bashrc` has none.
pub fn split_name(path: &Path) -> (String, String) {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (name, extension)
}

pub fn size_in_kb(bytes: u64) -> u64 {
    bytes / 1024
}

pub fn format_mtime(mtime: SystemTime) -> String {
    DateTime::<Local>::from(mtime).format(MTIME_FORMAT).to_string()
}
