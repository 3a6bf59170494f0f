use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dcvstat_core::catalog::ChartPreset;
use dcvstat_core::query::{PositionalWindow, ScanStats};
use dcvstat_store::Store;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Metrics charted together and windowed in one positional query.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshGroup {
    pub name: String,
    pub metrics: Vec<String>,
}

impl From<ChartPreset> for RefreshGroup {
    fn from(preset: ChartPreset) -> Self {
        Self {
            name: preset.name,
            metrics: preset.metrics,
        }
    }
}

pub struct RefreshConfig {
    /// `None` disables the timer; only manual triggers refresh.
    pub interval: Option<Duration>,
    pub window_size: usize,
    pub groups: Vec<RefreshGroup>,
    pub refresh_on_start: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Some(dcvstat_core::config::DEFAULT_REFRESH_INTERVAL),
            window_size: dcvstat_core::config::DEFAULT_ENTRIES,
            groups: ChartPreset::enabled().into_iter().map(Into::into).collect(),
            refresh_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Startup,
    Manual,
    Timer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupWindow {
    pub name: String,
    pub window: PositionalWindow,
}

/// Outcome of one refresh cycle.
///
/// `groups` always reflects what the store holds after the cycle, which on
/// failure is the last good snapshot.
#[derive(Debug, Clone)]
pub struct RefreshUpdate {
    pub seq: u64,
    pub trigger: RefreshTrigger,
    pub finished_at: DateTime<Utc>,
    pub result: Result<ScanStats, String>,
    pub groups: Vec<GroupWindow>,
}

impl RefreshUpdate {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Refresher;

impl Refresher {
    /// Starts the refresh task on the current tokio runtime.
    pub fn spawn(store: Store, cfg: RefreshConfig) -> RefreshHandle {
        let (manual_tx, manual_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (updates_tx, updates_rx) = watch::channel(None);

        if let Some(interval) = cfg.interval {
            info!(interval = ?interval, source = %store.source().display(), "auto refresh started");
        }

        let task = tokio::spawn(run_refresher(store, cfg, manual_rx, stop_rx, updates_tx));

        RefreshHandle {
            manual_tx,
            stop_tx,
            updates_rx,
            task: Some(task),
        }
    }
}

/// Control side of a running refresh task. Dropping it stops the task.
pub struct RefreshHandle {
    manual_tx: mpsc::Sender<()>,
    stop_tx: watch::Sender<bool>,
    updates_rx: watch::Receiver<Option<Arc<RefreshUpdate>>>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Requests a refresh. Requests made while one is already queued are
    /// folded into it. Returns false once the task has stopped.
    pub fn trigger(&self) -> bool {
        if *self.stop_tx.borrow() {
            return false;
        }
        match self.manual_tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    /// Signals the task to stop without waiting for it. Safe to call more
    /// than once.
    pub fn stop(&self) {
        self.stop_tx.send_if_modified(|stopped| {
            let changed = !*stopped;
            *stopped = true;
            changed
        });
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn latest(&self) -> Option<Arc<RefreshUpdate>> {
        self.updates_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<RefreshUpdate>>> {
        self.updates_rx.clone()
    }

    /// Stops the task and waits for it to exit.
    ///
    /// A reload still blocked on the file is abandoned rather than awaited;
    /// once this returns it can no longer change the store.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(error = ?err, "refresh task ended abnormally");
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_refresher(
    store: Store,
    cfg: RefreshConfig,
    mut manual_rx: mpsc::Receiver<()>,
    mut stop_rx: watch::Receiver<bool>,
    updates_tx: watch::Sender<Option<Arc<RefreshUpdate>>>,
) {
    let groups: Arc<[RefreshGroup]> = cfg.groups.into();
    let mut ticker = cfg.interval.map(|period| {
        let mut t = tokio::time::interval_at(Instant::now() + period, period);
        t.set_missed_tick_behavior(MissedTickBehavior::Delay);
        t
    });
    let mut seq = 0u64;
    let mut pending = cfg.refresh_on_start.then_some(RefreshTrigger::Startup);

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let trigger = match pending.take() {
            Some(trigger) => trigger,
            None => tokio::select! {
                _ = stop_rx.changed() => break,
                Some(()) = manual_rx.recv() => RefreshTrigger::Manual,
                _ = next_tick(&mut ticker) => RefreshTrigger::Timer,
            },
        };

        seq += 1;
        let cycle = refresh_once(store.clone(), groups.clone(), cfg.window_size, seq, trigger);
        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                // The blocking scan may outlive this task; it must not
                // publish once shutdown has returned.
                store.discard_in_flight();
                debug!(seq, "stopped during reload; result discarded");
                break;
            }
            update = cycle => {
                updates_tx.send_replace(Some(Arc::new(update)));
            }
        }
    }

    info!("refresh task stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn refresh_once(
    store: Store,
    groups: Arc<[RefreshGroup]>,
    window_size: usize,
    seq: u64,
    trigger: RefreshTrigger,
) -> RefreshUpdate {
    let reload_store = store.clone();
    let result = match tokio::task::spawn_blocking(move || reload_store.reload()).await {
        Ok(res) => res.map_err(|e| e.to_string()),
        Err(err) => Err(format!("reload task failed: {err}")),
    };

    match &result {
        Ok(stats) => debug!(
            seq,
            trigger = ?trigger,
            matched = stats.matched,
            malformed = stats.malformed(),
            "refresh complete"
        ),
        Err(err) => warn!(seq, trigger = ?trigger, error = %err, "refresh failed, keeping previous data"),
    }

    let groups = groups
        .iter()
        .map(|g| GroupWindow {
            name: g.name.clone(),
            window: store.window_many(g.metrics.as_slice(), window_size),
        })
        .collect();

    RefreshUpdate {
        seq,
        trigger,
        finished_at: Utc::now(),
        result,
        groups,
    }
}
