use std::{fs, path::Path, process::ExitCode};

use anyhow::Result;
use clap::Args;
use keeper_runtime::STORE_SIDECAR_SUFFIXES;
use keeper_store::IndexStore;
use log::error;

use crate::commands::StoreArgs;

#[derive(Debug, Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

pub fn run(args: InfoArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("[error] {e:#}");
            eprintln!("[info] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: InfoArgs) -> Result<ExitCode> {
    let location = args.store.store_path();

    if !location.exists() {
        eprintln!("[info] no index found at {}", location.display());
        // Absence is a soft failure.
        return Ok(ExitCode::from(1));
    }

    let store = IndexStore::open_read_only(&location)?;
    let records = store.count()?;

    eprintln!("[info] location: {}", location.display());
    eprintln!("[info] records:  {}", records);
    eprintln!("[info] size:     {} bytes", on_disk_size(&location));

    Ok(ExitCode::SUCCESS)
}

/// Database plus any sidecar files SQLite keeps next to it.
fn on_disk_size(location: &Path) -> u64 {
    let mut total = fs::metadata(location).map(|m| m.len()).unwrap_or(0);
    for suffix in STORE_SIDECAR_SUFFIXES {
        let mut sidecar = location.as_os_str().to_owned();
        sidecar.push(suffix);
        total += fs::metadata(&sidecar).map(|m| m.len()).unwrap_or(0);
    }
    total
}
