use std::{
    process::ExitCode,
    sync::{Arc, atomic::AtomicBool},
};

use anyhow::{Context, Result};
use clap::Args;
use keeper_runtime::history::HistoryStore;
use keeper_sync::{NotifyWatchSource, SyncEngine, SyncError};
use log::{error, info};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};

use crate::commands::SyncArgs;

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub sync: SyncArgs,
}

pub fn run(args: WatchArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("[error] {e:#}");
            eprintln!("[watch] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: WatchArgs) -> Result<ExitCode> {
    let shutdown = Arc::new(AtomicBool::new(false));

    // The first signal sets the flag, which the engine checks between events
    // and between reconcile batches. A second one exits immediately.
    for sig in [SIGINT, SIGTERM] {
        flag::register_conditional_shutdown(sig, 130, Arc::clone(&shutdown))
            .with_context(|| format!("Failed to register shutdown handler for {sig}"))?;
        flag::register(sig, Arc::clone(&shutdown))
            .with_context(|| format!("Failed to register signal handler for {sig}"))?;
    }

    let mut engine = SyncEngine::new(args.sync.config(), NotifyWatchSource::new())
        .context("cannot start watch")?;
    if let Some(history) = HistoryStore::new() {
        engine = engine.with_history(history);
    }

    eprintln!(
        "[watch] {} -> {}",
        engine.config().root.display(),
        engine.config().store_path.display()
    );

    match engine.run(&shutdown) {
        Ok(summary) => {
            let s = summary.stats;
            info!("Watch stopped cleanly");
            eprintln!(
                "[watch] stopped: {} applied, {} dropped, {} write failures, {} rescans",
                s.events_applied, s.events_dropped, s.write_failures, s.rescans
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(SyncError::WatchStreamTerminated) => {
            eprintln!("[watch] notification stream lost twice; run `keeper scan` or restart");
            Ok(ExitCode::from(1))
        }
        Err(e) => Err(e.into()),
    }
}
