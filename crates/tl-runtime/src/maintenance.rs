//! # Maintenance Loop
//!
//! Runs the directory's maintenance pass on a timer until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tl_directory::{MaintenanceReport, TrixelDirectoryService};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Run maintenance every `period` until `shutdown` flips or its sender is
/// dropped. Returns the number of completed passes.
pub async fn run_maintenance_loop(
    service: Arc<TrixelDirectoryService>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut passes = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = service.run_maintenance();
                log_report(&report);
                passes += 1;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("[tl-runtime] Maintenance loop stopping after {} passes", passes);
                    break;
                }
            }
        }
    }
    passes
}

fn log_report(report: &MaintenanceReport) {
    if !report.newly_unreachable.is_empty() {
        info!("[tl-runtime] Unreachable: {:?}", report.newly_unreachable);
    }
    if !report.evicted.is_empty() || !report.drained.is_empty() {
        info!(
            "[tl-runtime] Evicted {:?}, drained {:?}",
            report.evicted, report.drained
        );
    }
    for (backend, reason) in &report.deferred {
        warn!("[tl-runtime] Handover of {} deferred: {}", backend, reason);
    }
    debug!(
        "[tl-runtime] Pass done: {} merges, {} roots bootstrapped",
        report.merged.len(),
        report.bootstrapped
    );
}
