//! # Lookup Resolver
//!
//! Answers "who owns trixel X", repairing the partition when the owner is
//! gone and growing it when the owner is overloaded.

use tracing::{debug, error, info, warn};

use crate::algorithms::AssignmentTable;
use crate::domain::{Assignment, Backend, DirectoryError, Generation, TrixelId};
use crate::ports::{GrowthOutcome, LookupResponse};
use crate::service::TrixelDirectoryService;

impl TrixelDirectoryService {
    /// Resolve, repair and grow.
    pub(crate) fn resolve_lookup(&self, trixel: TrixelId) -> Result<LookupResponse, DirectoryError> {
        let (assignment, owner) = self.usable_owner(trixel)?;

        let (assignment, owner, growth) = if self.planner().needs_growth(&owner) {
            self.try_grow(trixel, assignment, owner)?
        } else {
            (assignment, owner, GrowthOutcome::NotNeeded)
        };

        debug!(
            "[tl-dir] Lookup {} -> {} via {} (generation {})",
            trixel, owner.id, assignment.subtree_root, assignment.generation
        );
        Ok(LookupResponse {
            trixel,
            subtree_root: assignment.subtree_root,
            owner: owner.id,
            endpoint: owner.base_url(),
            transport_security: owner.transport_security,
            generation: assignment.generation,
            growth,
        })
    }

    /// Read-only resolve. A gap is a broken invariant and is logged, not patched.
    pub(crate) fn resolve_assignment(&self, trixel: TrixelId) -> Result<Assignment, DirectoryError> {
        logged_resolve(&self.table.read(), trixel)
    }

    /// Covering assignment and its owner, repairing the subtree first when
    /// the owner is gone or no longer active.
    pub(crate) fn usable_owner(
        &self,
        trixel: TrixelId,
    ) -> Result<(Assignment, Backend), DirectoryError> {
        let assignment = self.resolve_assignment(trixel)?;
        match self.registry.get(assignment.owner) {
            Ok(owner) if owner.is_active() => Ok((assignment, owner)),
            _ => self.repair(trixel),
        }
    }

    /// Fail if `generation` is not the one currently covering `trixel`.
    pub(crate) fn check_generation(
        &self,
        trixel: TrixelId,
        generation: Generation,
    ) -> Result<(), DirectoryError> {
        let current = self.resolve_assignment(trixel)?.generation;
        if current != generation {
            return Err(DirectoryError::StaleGeneration {
                trixel,
                cached: generation,
                current,
            });
        }
        Ok(())
    }

    /// Move the subtree covering `trixel` off an unusable owner.
    ///
    /// Re-resolves under the write lock, so concurrent lookups repair once.
    fn repair(&self, trixel: TrixelId) -> Result<(Assignment, Backend), DirectoryError> {
        let mut table = self.table.write();
        let current = logged_resolve(&table, trixel)?;
        if let Ok(owner) = self.registry.get(current.owner) {
            if owner.is_active() {
                return Ok((current, owner));
            }
        }

        let backends = self.registry.snapshot();
        let m = self.planner().plan_single_reassignment(&current, &backends)?;
        let change = table.plan_insert(m.subtree_root, m.to, self.now())?;
        let activated = change.activated[0];
        self.commit(&mut table, change)?;
        info!(
            "[tl-dir] Reassigned {} from unusable {} to {}",
            m.subtree_root, m.from, m.to
        );

        let owner = self.registry.get(m.to)?;
        Ok((activated, owner))
    }

    /// Split the resolved subtree if it is still the one we saw.
    ///
    /// Growth failures are reported in the outcome, never as lookup errors.
    fn try_grow(
        &self,
        trixel: TrixelId,
        assignment: Assignment,
        owner: Backend,
    ) -> Result<(Assignment, Backend, GrowthOutcome), DirectoryError> {
        let grown = {
            let mut table = self.table.write();
            let unchanged = table
                .get(assignment.subtree_root)
                .is_some_and(|current| current.generation == assignment.generation);
            // Re-read under the write lock: a concurrent lookup may already
            // have shed load, or a heartbeat may have changed it.
            let still_overloaded = self
                .registry
                .get(owner.id)
                .is_ok_and(|latest| latest.is_active() && self.planner().needs_growth(&latest));
            if unchanged && still_overloaded {
                let backends = self.registry.snapshot();
                self.planner()
                    .plan_growth(&table, assignment.subtree_root, &owner, &backends, self.now())
                    .and_then(|change| {
                        let children = change.activated.clone();
                        self.commit(&mut table, change)?;
                        self.registry.mark_shed(owner.id);
                        Ok(Some(children))
                    })
            } else {
                Ok(None)
            }
        };

        match grown {
            Ok(Some(children)) => {
                info!(
                    "[tl-dir] Split {} of overloaded {} (load {}/{})",
                    assignment.subtree_root, owner.id, owner.current_load, owner.capacity_hint
                );
                let growth = GrowthOutcome::Split {
                    subtree_root: assignment.subtree_root,
                    children,
                };
                let (assignment, owner) = self.usable_owner(trixel)?;
                Ok((assignment, owner, growth))
            }
            Ok(None) => {
                let (assignment, owner) = self.usable_owner(trixel)?;
                Ok((assignment, owner, GrowthOutcome::NotNeeded))
            }
            Err(e) => {
                warn!(
                    "[tl-dir] Growth of {} deferred: {}",
                    assignment.subtree_root, e
                );
                Ok((assignment, owner, GrowthOutcome::Deferred(e)))
            }
        }
    }
}

/// Resolve against a locked table, logging a gap in the partition.
fn logged_resolve(table: &AssignmentTable, trixel: TrixelId) -> Result<Assignment, DirectoryError> {
    let resolved = table.resolve(trixel);
    if let Err(DirectoryError::Unpartitioned(_)) = &resolved {
        error!("[tl-dir] Trixel {} is not covered by any assignment", trixel);
    }
    resolved
}
