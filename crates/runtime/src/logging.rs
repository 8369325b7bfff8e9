use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Mutex, OnceLock, PoisonError},
};

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::{PROGRAM_LOG_FILE, PROGRAM_LOG_LEVEL};

pub enum LogTarget {
    Stderr,
    File(Mutex<File>),
}

impl LogTarget {
    /// Append to `path`, or fall back to stderr when it cannot be opened.
    pub fn file_or_stderr(path: &Path) -> Self {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            let _ = fs::create_dir_all(parent);
        }

        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => LogTarget::File(Mutex::new(file)),
            Err(e) => {
                eprintln!("cannot open log file {}: {e}; logging to stderr", path.display());
                LogTarget::Stderr
            }
        }
    }
}

pub struct Logger {
    level: Level,
    target: LogTarget,
}

impl Logger {
    pub fn new(level: Level, target: LogTarget) -> Self {
        Self { level, target }
    }
}

fn format_line(record: &Record<'_>) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    format!(
        "{} {} [{}] {}",
        timestamp,
        record.level(),
        record.target(),
        record.args()
    )
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let msg = format_line(record);

        match &self.target {
            LogTarget::Stderr => eprintln!("{msg}"),
            LogTarget::File(file) => {
                let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = writeln!(file, "{msg}");
            }
        }
    }

    fn flush(&self) {
        if let LogTarget::File(file) = &self.target {
            let _ = file.lock().unwrap_or_else(PoisonError::into_inner).flush();
        }
    }
}

fn get_level_from_env() -> Level {
    std::env::var(PROGRAM_LOG_LEVEL)
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .and_then(|filter| filter.to_level())
        .unwrap_or(Level::Warn)
}

fn get_target_from_env() -> LogTarget {
    match std::env::var_os(PROGRAM_LOG_FILE) {
        Some(path) if !path.is_empty() => LogTarget::file_or_stderr(Path::new(&path)),
        _ => LogTarget::Stderr,
    }
}

/// Install the process logger using `KEEPER_LOG_LEVEL` and `KEEPER_LOG_FILE`.
pub fn init() -> Result<(), SetLoggerError> {
    init_with(get_level_from_env(), get_target_from_env())
}

pub fn init_with(level: Level, target: LogTarget) -> Result<(), SetLoggerError> {
    static LOGGER: OnceLock<Logger> = OnceLock::new();

    // Only the first call installs; later calls must not move max_level away
    // from the level the installed logger filters on.
    let init_call = LOGGER.get().is_none();

    let logger = LOGGER.get_or_init(|| Logger::new(level, target));

    if init_call {
        log::set_logger(logger)?;
        log::set_max_level(logger.level.to_level_filter());
    }

    Ok(())
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
