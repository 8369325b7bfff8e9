pub mod history;
pub mod info;
pub mod list;
pub mod scan;
pub mod watch;

use std::{path::PathBuf, time::Duration};

use clap::{Args, Subcommand};
pub use history::HistoryArgs;
pub use info::InfoArgs;
use keeper_runtime::{DEFAULT_PROBE_TIMEOUT_MS, default_store_path, default_watch_root};
use keeper_sync::{OwnerLookup, SyncConfig};
pub use list::ListArgs;
pub use scan::ScanArgs;
pub use watch::WatchArgs;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile the index, then keep it in step with live changes until
    /// interrupted.
    ///
    /// Example:
    ///   keeper watch --root /srv/share
    ///   KEEPER_STORE=/var/lib/keeper/index.db keeper watch
    Watch(WatchArgs),

    /// Reconcile the index with the tree once and exit.
    ///
    /// Example:
    ///   keeper scan --json
    Scan(ScanArgs),

    /// Show where the index lives and how many records it holds.
    Info(InfoArgs),

    /// Print indexed records.
    ///
    /// Example:
    ///   keeper list -n 50
    ///   keeper list --json | jq .owner
    List(ListArgs),

    /// Show past reconciles and watch sessions.
    History(HistoryArgs),
}

/// Location of the index store.
#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Index database file [default: $XDG_DATA_HOME/keeper/index.db]
    #[arg(long, env = "KEEPER_STORE", value_name = "FILE")]
    pub store: Option<PathBuf>,
}

impl StoreArgs {
    pub fn store_path(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(default_store_path)
    }
}

/// Everything needed to build a sync engine.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Directory tree to index [default: $HOME]
    #[arg(long, env = "KEEPER_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Give up on a single file's metadata after this long; 0 waits forever
    #[arg(
        long,
        env = "KEEPER_PROBE_TIMEOUT_MS",
        value_name = "MS",
        default_value_t = DEFAULT_PROBE_TIMEOUT_MS
    )]
    pub probe_timeout_ms: u64,

    /// Skip owner lookup and record every owner as "Unknown"
    #[arg(long)]
    pub no_owner: bool,

    /// Walker threads [default: available parallelism]
    #[arg(long, short = 'j', value_name = "N")]
    pub threads: Option<usize>,
}

impl SyncArgs {
    pub fn config(&self) -> SyncConfig {
        let root = self.root.clone().unwrap_or_else(default_watch_root);
        let mut config = SyncConfig::new(root, self.store.store_path());

        config.probe_timeout =
            (self.probe_timeout_ms > 0).then(|| Duration::from_millis(self.probe_timeout_ms));
        if self.no_owner {
            config.owner_lookup = OwnerLookup::Disabled;
        }
        if let Some(threads) = self.threads {
            config.walker_threads = threads;
        }

        config
    }
}
