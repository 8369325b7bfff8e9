use std::{process::ExitCode, time::Instant};

use anyhow::{Context, Result};
use clap::Args;
use keeper_runtime::history::HistoryStore;
use keeper_sync::{NotifyWatchSource, SyncEngine};
use log::error;

use crate::commands::SyncArgs;

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub sync: SyncArgs,

    /// Print the report as a single JSON object
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ScanArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("[error] {e:#}");
            eprintln!("[scan] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: ScanArgs) -> Result<ExitCode> {
    // Never armed; only the reconcile half of the engine is used.
    let mut engine = SyncEngine::new(args.sync.config(), NotifyWatchSource::new())
        .context("cannot open index")?;
    if let Some(history) = HistoryStore::new() {
        engine = engine.with_history(history);
    }

    let started = Instant::now();
    let report = engine.reconcile()?;
    let elapsed = started.elapsed();

    if args.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        eprintln!("[scan] root:     {}", engine.config().root.display());
        eprintln!("[scan] read:     {}", report.files_read);
        eprintln!("[scan] written:  {}", report.files_written);
        eprintln!("[scan] removed:  {}", report.files_removed);
        eprintln!("[scan] failures: {}", report.write_failures);
        eprintln!("[scan] took:     {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    }

    // Partial success: the index is usable but some rows are stale.
    if report.write_failures > 0 {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
