use std::path::PathBuf;

pub const PROGRAM_NAME: &str = "keeper";
pub const PROGRAM_LOG_LEVEL: &str = "KEEPER_LOG_LEVEL";
/// When set, log lines are appended to this file instead of stderr.
pub const PROGRAM_LOG_FILE: &str = "KEEPER_LOG_FILE";
pub const STORE_FILE_NAME: &str = "index.db";

/// Probes slower than this are abandoned and their event dropped.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Suffixes SQLite appends to the database path for its sidecar files.
pub const STORE_SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

pub fn xdg_or_home(xdg_var: &str, home_suffix: &str) -> PathBuf {
    match std::env::var_os(xdg_var) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(home_suffix),
    }
}

/// Default subtree to mirror when no root is given.
pub fn default_watch_root() -> PathBuf {
    #[cfg(unix)]
    {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
    #[cfg(windows)]
    {
        std::env::var_os("USERPROFILE")
            .map(PathBuf::from)
            .or_else(|| {
                let drive = std::env::var_os("HOMEDRIVE")?;
                let path = std::env::var_os("HOMEPATH")?;
                Some(PathBuf::from(drive).join(path))
            })
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
    #[cfg(not(any(unix, windows)))]
    {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

pub fn keeper_dir() -> PathBuf {
    xdg_or_home("XDG_DATA_HOME", ".local/share").join(PROGRAM_NAME)
}

/// Default location of the index database
pub fn default_store_path() -> PathBuf {
    keeper_dir().join(STORE_FILE_NAME)
}
