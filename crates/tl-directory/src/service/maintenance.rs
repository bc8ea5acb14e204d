use tracing::{info, warn};

use crate::domain::{BackendId, DirectoryError, TrixelId};
use crate::service::TrixelDirectoryService;

/// What one maintenance pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Backends that went unreachable in this pass.
    pub newly_unreachable: Vec<BackendId>,
    /// Unreachable backends whose territory moved and that were removed.
    pub evicted: Vec<BackendId>,
    /// Draining backends that finished handing over and were removed.
    pub drained: Vec<BackendId>,
    /// Backends that could not be handed over yet, with the reason.
    pub deferred: Vec<(BackendId, DirectoryError)>,
    /// Parents whose sibling groups were merged.
    pub merged: Vec<TrixelId>,
    /// Roots delegated because they were uncovered.
    pub bootstrapped: usize,
}

impl TrixelDirectoryService {
    /// Run one maintenance pass: liveness sweep, eviction, merges and
    /// bootstrap of uncovered roots.
    ///
    /// Call from a timer task roughly once per heartbeat interval.
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let mut report = self.sweep();
        report.merged = self.rebalance();
        report.bootstrapped = match self.bootstrap() {
            Ok(count) => count,
            Err(DirectoryError::NoEligibleBackend) => 0,
            Err(e) => {
                warn!("[tl-dir] Bootstrap failed: {}", e);
                0
            }
        };
        report
    }

    /// Mark silent backends unreachable and hand over the territory of
    /// backends that are leaving or unreachable past the grace period.
    pub fn sweep(&self) -> MaintenanceReport {
        let sweep = self.registry.sweep(self.now());
        let mut report = MaintenanceReport {
            newly_unreachable: sweep.newly_unreachable,
            ..Default::default()
        };

        for id in &report.newly_unreachable {
            if let Ok(backend) = self.registry.get(*id) {
                if let Err(e) = self.store.persist_backend(&backend) {
                    warn!("[tl-dir] Could not persist status of {}: {}", id, e);
                }
            }
        }

        for id in sweep.eviction_candidates {
            match self.evict(id) {
                Ok(true) => {
                    info!("[tl-dir] Evicted unreachable backend {}", id);
                    report.evicted.push(id);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("[tl-dir] Eviction of {} deferred: {}", id, e);
                    report.deferred.push((id, e));
                }
            }
        }

        for id in sweep.draining {
            match self.evict(id) {
                Ok(true) => report.drained.push(id),
                Ok(false) => {}
                Err(e) => {
                    warn!("[tl-dir] Drain of {} deferred: {}", id, e);
                    report.deferred.push((id, e));
                }
            }
        }
        report
    }

    /// Merge quiet sibling groups. Returns the merged parents.
    pub fn rebalance(&self) -> Vec<TrixelId> {
        let mut table = self.table.write();
        let backends = self.registry.snapshot();
        let plans = self.planner().plan_merges(&table, &backends);
        let now = self.now();

        let mut merged = Vec::new();
        for plan in plans {
            let result = table
                .plan_merge(plan.parent, plan.owner, now)
                .and_then(|change| self.commit(&mut table, change));
            match result {
                Ok(()) => {
                    info!("[tl-dir] Merged children of {} into {}", plan.parent, plan.owner);
                    merged.push(plan.parent);
                }
                Err(e) => warn!("[tl-dir] Merge of {} skipped: {}", plan.parent, e),
            }
        }
        merged
    }
}
