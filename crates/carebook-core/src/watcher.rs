//! Background reconciliation of a store with writes from other contexts.
//!
//! The watcher prefers push: when the backend has a change feed, every write
//! by another context to the store's key triggers a reconcile right away. A
//! fixed-interval poll runs regardless, covering backends without a feed and
//! signals that were dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::storage::StorageChange;
use crate::store::SharedStateStore;

/// Tuning for [`spawn_watcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    /// Interval of the freshness poll.
    ///
    /// Default: 500 ms.
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Counters describing what the watcher has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// Push signals from other contexts acted upon
    pub push_signals: u64,
    /// Poll ticks
    pub polls: u64,
    /// Reconciliations that found a change
    pub changes: u64,
}

#[derive(Default)]
struct Counters {
    push_signals: AtomicU64,
    polls: AtomicU64,
    changes: AtomicU64,
}

/// Handle to a running watcher.
///
/// `Clone` is cheap. Dropping every handle also stops the watcher.
#[derive(Clone)]
pub struct WatchHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    counters: Arc<Counters>,
}

impl WatchHandle {
    pub fn stats(&self) -> WatchStats {
        WatchStats {
            push_signals: self.counters.push_signals.load(Ordering::Relaxed),
            polls: self.counters.polls.load(Ordering::Relaxed),
            changes: self.counters.changes.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop the watcher and wait for it to exit.
    ///
    /// Calling `shutdown` more than once is safe.
    pub async fn shutdown(&self) {
        // The loop may already be gone; nothing to signal then.
        let _ = self.shutdown_tx.send(true);

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(error) = task.await {
                tracing::error!("Watcher task ended abnormally: {error}");
            }
        }
    }
}

/// Start reconciling `store` in the background.
///
/// Must be called from within a tokio runtime.
pub fn spawn_watcher(store: Arc<SharedStateStore>, config: WatchConfig) -> WatchHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let counters = Arc::new(Counters::default());
    let changes = store.storage().changes();

    tracing::debug!(
        key = store.storage_key(),
        push = changes.is_some(),
        poll_ms = u64::try_from(config.poll_interval.as_millis()).unwrap_or(u64::MAX),
        "Starting watcher"
    );

    let task = tokio::spawn(run_watch_loop(
        store,
        config,
        changes,
        shutdown_rx,
        Arc::clone(&counters),
    ));

    WatchHandle {
        shutdown_tx,
        task: Arc::new(Mutex::new(Some(task))),
        counters,
    }
}

async fn run_watch_loop(
    store: Arc<SharedStateStore>,
    config: WatchConfig,
    mut changes: Option<broadcast::Receiver<StorageChange>>,
    mut shutdown_rx: watch::Receiver<bool>,
    counters: Arc<Counters>,
) {
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = poll.tick() => {
                counters.polls.fetch_add(1, Ordering::Relaxed);
                reconcile(&store, &counters);
            }
            received = next_change(&mut changes) => match received {
                Ok(change) => {
                    if change.key == store.storage_key() && change.origin != store.context_id() {
                        counters.push_signals.fetch_add(1, Ordering::Relaxed);
                        reconcile(&store, &counters);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Watcher fell behind the change feed; reconciling");
                    reconcile(&store, &counters);
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Change feed closed; continuing with polling only");
                    changes = None;
                }
            },
        }
    }

    tracing::debug!(key = store.storage_key(), "Watcher stopped");
}

/// Next item on the change feed, or never when there is no feed.
async fn next_change(
    changes: &mut Option<broadcast::Receiver<StorageChange>>,
) -> Result<StorageChange, RecvError> {
    match changes {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

fn reconcile(store: &SharedStateStore, counters: &Counters) {
    if store.reconcile_from_external_signal() {
        counters.changes.fetch_add(1, Ordering::Relaxed);
    }
}
