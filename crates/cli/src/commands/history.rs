use std::process::ExitCode;

use clap::Args;
use keeper_runtime::history::{HistoryEvent, HistoryStore, SessionEnd};
use log::{error, info};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Number of entries to display
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,

    /// Clear all history
    #[arg(long)]
    pub clear: bool,
}

pub fn run(args: HistoryArgs) -> ExitCode {
    let store = match HistoryStore::new() {
        Some(s) => s,
        None => {
            info!("[info] History is currently disabled");
            return ExitCode::from(0);
        }
    };

    if args.clear {
        match store.clear() {
            Ok(_) => {
                println!("History cleared");
                return ExitCode::from(0);
            }
            Err(e) => {
                error!("[error] Failed to clear history: {}", e);
                return ExitCode::from(1);
            }
        }
    }

    let events = store.recent(args.limit);

    if events.is_empty() {
        println!("No history yet.");
        return ExitCode::from(0);
    }

    println!("{:<20}  {:<9}  {:>8}  DETAIL", "TIMESTAMP", "KIND", "TIME");
    println!("{}", "-".repeat(72));

    for event in &events {
        let ts = event.timestamp().format("%Y-%m-%d %H:%M:%S").to_string();
        let (kind, duration_ms, detail) = describe(event);

        println!("{:<20}  {:<9}  {:>6}ms  {}", ts, kind, duration_ms, detail);
    }

    let total = store.count();
    if total > args.limit {
        println!(
            "\n({} more entries, use --limit to show more)",
            total - args.limit
        );
    }

    ExitCode::from(0)
}

fn describe(event: &HistoryEvent) -> (&'static str, u64, String) {
    match event {
        HistoryEvent::Reconcile(e) => (
            "reconcile",
            e.duration_ms,
            format!(
                "{} read, {} written, {} removed, {} failed  {}",
                e.files_read, e.files_written, e.files_removed, e.write_failures, e.root
            ),
        ),
        HistoryEvent::Session(e) => {
            let end = match e.end {
                SessionEnd::Stopped => "stopped",
                SessionEnd::StreamTerminated => "stream lost",
            };
            (
                "watch",
                e.duration_ms,
                format!(
                    "{end}: {} applied, {} dropped, {} failed, {} rescans  {}",
                    e.events_applied, e.events_dropped, e.write_failures, e.rescans, e.root
                ),
            )
        }
    }
}
