use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use keeper_runtime::history::{
    HistoryEvent, HistoryStore, ReconcileEvent, SessionEnd, SessionEvent,
};
use keeper_store::IndexStore;
use log::{error, info, warn};
use serde::Serialize;

use crate::{
    config::SyncConfig,
    error::SyncError,
    router::ChangeEventRouter,
    scanner::{ReconcileReport, ReconciliationScanner},
    stats::{StatsSnapshot, SyncStats},
    watch::{WatchMessage, WatchSource},
};

/// How often the event loop wakes to check for a stop request.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    /// The notification stream dropped once and the watch was re-armed.
    pub rearmed: bool,
}

/// Owns the store, the scanner, the router and the watch session.
///
/// Lifecycle: `new` validates config and opens the store; `run` (or `start`)
/// reconciles, arms the watch, then applies notifications one at a time until
/// a stop is requested or the stream fails for good.
pub struct SyncEngine<W: WatchSource> {
    config: SyncConfig,
    store: Arc<IndexStore>,
    stats: Arc<SyncStats>,
    scanner: ReconciliationScanner,
    router: ChangeEventRouter,
    source: W,
    history: Option<HistoryStore>,
}

impl<W: WatchSource> SyncEngine<W> {
    pub fn new(config: SyncConfig, source: W) -> Result<Self, SyncError> {
        let config = config.validate()?;
        let store = Arc::new(IndexStore::open(&config.store_path)?);

        let stats = Arc::new(SyncStats::default());
        let probe = config.build_probe();
        let artifacts = config.store_artifacts();

        let scanner = ReconciliationScanner::new(
            config.root.clone(),
            Arc::clone(&store),
            probe.clone(),
            Arc::clone(&stats),
        )
        .with_artifacts(artifacts.clone())
        .with_walker_threads(config.walker_threads);

        let router = ChangeEventRouter::new(Arc::clone(&store), probe, Arc::clone(&stats))
            .with_artifacts(artifacts)
            .with_root(config.root.clone())
            .with_walker_threads(config.walker_threads);

        Ok(Self {
            config,
            store,
            stats,
            scanner,
            router,
            source,
            history: None,
        })
    }

    /// Append a line per reconcile and per session to `history`.
    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn stats(&self) -> &Arc<SyncStats> {
        &self.stats
    }

    pub fn reconcile(&self) -> Result<ReconcileReport, SyncError> {
        self.reconcile_until(&AtomicBool::new(false))
    }

    fn reconcile_until(&self, cancel: &AtomicBool) -> Result<ReconcileReport, SyncError> {
        let started = Instant::now();
        let report = self.scanner.reconcile_until(cancel)?;

        if let Some(history) = &self.history {
            history.record(HistoryEvent::Reconcile(ReconcileEvent::new(
                self.config.root.display().to_string(),
                report.files_read,
                report.files_written,
                report.files_removed,
                report.write_failures,
                started.elapsed().as_millis() as u64,
            )));
        }

        Ok(report)
    }

    /// Reconcile, arm, and apply notifications on the calling thread until
    /// `shutdown` is set. Setting it during the initial reconcile returns
    /// before the watch is ever armed.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<RunSummary, SyncError> {
        let rx = match self.prepare(shutdown) {
            Ok(rx) => rx,
            Err(SyncError::Cancelled) => {
                info!(
                    "Shutdown requested during initial reconcile of {}",
                    self.config.root.display()
                );
                return Ok(RunSummary {
                    stats: self.stats.snapshot(),
                    rearmed: false,
                });
            }
            Err(e) => return Err(e),
        };
        self.event_loop(rx, shutdown)
    }

    /// Establish the baseline and arm the watch, then hand the event loop to
    /// a background thread. When this returns `Ok`, live events are accepted.
    pub fn start(mut self) -> Result<RunningEngine, SyncError>
    where
        W: 'static,
    {
        let rx = self.prepare(&AtomicBool::new(false))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);

        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("keeper-sync".into())
            .spawn(move || self.event_loop(rx, &flag))
            .map_err(|source| SyncError::Spawn {
                name: "keeper-sync",
                source,
            })?;

        Ok(RunningEngine {
            shutdown,
            handle,
            store,
            stats,
        })
    }

    fn prepare(&mut self, shutdown: &AtomicBool) -> Result<Receiver<WatchMessage>, SyncError> {
        self.reconcile_until(shutdown)?;
        self.arm()
    }

    fn arm(&mut self) -> Result<Receiver<WatchMessage>, SyncError> {
        let (tx, rx) = channel::unbounded();
        self.source.arm(&self.config.root, tx)?;
        info!("Monitoring started on {}", self.config.root.display());
        Ok(rx)
    }

    fn rescan(&self, shutdown: &AtomicBool) {
        self.stats.record_rescan();
        match self.reconcile_until(shutdown) {
            Ok(_) => {}
            Err(SyncError::Cancelled) => info!("Rescan interrupted by shutdown"),
            Err(e) => error!("Rescan of {} failed: {e}", self.config.root.display()),
        }
    }

    fn event_loop(
        &mut self,
        mut rx: Receiver<WatchMessage>,
        shutdown: &AtomicBool,
    ) -> Result<RunSummary, SyncError> {
        let started = Instant::now();
        let mut rearmed = false;

        let result = loop {
            // Checked between events only, so an event is never half applied.
            if shutdown.load(Ordering::Acquire) {
                info!("Shutdown requested; stopping watch on {}", self.config.root.display());
                break Ok(());
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(WatchMessage::Change(event)) => {
                    self.router.apply(&event);
                }
                Ok(WatchMessage::Rescan) => {
                    warn!("Watcher dropped notifications; reconciling");
                    self.rescan(shutdown);
                }
                Ok(WatchMessage::Error(msg)) => {
                    warn!("Watcher error: {msg}; reconciling");
                    self.rescan(shutdown);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if shutdown.load(Ordering::Acquire) {
                        break Ok(());
                    }

                    self.source.disarm();

                    if rearmed {
                        error!("Notification stream terminated again; giving up");
                        break Err(SyncError::WatchStreamTerminated);
                    }

                    warn!("Notification stream terminated; re-arming once");
                    rearmed = true;

                    match self.arm() {
                        Ok(new_rx) => {
                            rx = new_rx;
                            // Cover whatever happened while unarmed.
                            self.rescan(shutdown);
                        }
                        Err(e) => {
                            error!("Re-arming failed: {e}");
                            break Err(SyncError::WatchStreamTerminated);
                        }
                    }
                }
            }
        };

        self.source.disarm();

        let stats = self.stats.snapshot();
        info!(
            "Watch session ended: applied={}, dropped={}, write_failures={}, rescans={}",
            stats.events_applied, stats.events_dropped, stats.write_failures, stats.rescans,
        );

        if let Some(history) = &self.history {
            let end = match result {
                Ok(()) => SessionEnd::Stopped,
                Err(_) => SessionEnd::StreamTerminated,
            };
            history.record(HistoryEvent::Session(SessionEvent::new(
                self.config.root.display().to_string(),
                stats.events_applied,
                stats.events_dropped,
                stats.write_failures,
                stats.rescans,
                end,
                started.elapsed().as_millis() as u64,
            )));
        }

        result.map(|()| RunSummary { stats, rearmed })
    }
}

/// An engine whose event loop runs on its own thread.
pub struct RunningEngine {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<Result<RunSummary, SyncError>>,
    store: Arc<IndexStore>,
    stats: Arc<SyncStats>,
}

impl RunningEngine {
    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The loop exited on its own, e.g. after the stream terminated.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request shutdown, let the in-flight event finish, disarm the watch and
    /// return how the session went.
    pub fn stop(self) -> Result<RunSummary, SyncError> {
        self.shutdown.store(true, Ordering::Release);
        self.handle.join().map_err(|_| SyncError::WorkerPanicked)?
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
