mod config;
pub mod history;
pub mod logging;

pub use config::{
    DEFAULT_PROBE_TIMEOUT_MS, PROGRAM_LOG_FILE, PROGRAM_LOG_LEVEL, PROGRAM_NAME,
    STORE_FILE_NAME, STORE_SIDECAR_SUFFIXES, default_store_path, default_watch_root, keeper_dir,
};

pub use logging::init;
