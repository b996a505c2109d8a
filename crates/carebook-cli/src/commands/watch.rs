use std::sync::Arc;
use std::time::Duration;

use carebook_core::view::{AppointmentPartition, Partition};
use carebook_core::{spawn_watcher, SharedStateStore, ViewAdapter, WatchConfig};
use chrono::Local;

use crate::commands::common::format_partition_lines;
use crate::error::CliError;

const DAY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Print the appointment list now and every time it changes, until Ctrl-C.
pub async fn run_watch(store: Arc<SharedStateStore>, config: WatchConfig) -> Result<(), CliError> {
    let mut view = ViewAdapter::mount(Arc::clone(&store), AppointmentPartition);
    print_partition(&view.current());
    view.on_change(print_partition);

    let watcher = spawn_watcher(Arc::clone(&store), config);
    tracing::info!(key = store.storage_key(), "Watching for changes (Ctrl-C to stop)");

    let clock = store.clock();
    let mut today = clock.now().date_naive();
    let mut day_check = tokio::time::interval(DAY_CHECK_INTERVAL);

    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => break signal,
            _ = day_check.tick() => {
                let now = clock.now().date_naive();
                if now != today {
                    today = now;
                    view.refresh_clock();
                }
            }
        }
    };

    watcher.shutdown().await;
    view.unmount();

    let stats = watcher.stats();
    tracing::info!(
        polls = stats.polls,
        push_signals = stats.push_signals,
        changes = stats.changes,
        "Stopped watching"
    );

    result.map_err(CliError::Io)
}

fn print_partition(partition: &Partition) {
    println!();
    for line in format_partition_lines(partition, Local::now().date_naive()) {
        println!("{line}");
    }
}
