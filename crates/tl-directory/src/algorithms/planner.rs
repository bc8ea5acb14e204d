//! # Partition Planner
//!
//! Stateless decisions over the assignment table and a backend snapshot:
//! bootstrap, growth, eviction reassignment and merges.
//!
//! Every function only plans. Nothing here mutates the table or the
//! registry; the service commits the returned changes.

use std::collections::BTreeMap;

use super::assignment_table::AssignmentTable;
use super::selection::{is_eligible, least_loaded, rank_eligible};
use crate::domain::{
    Assignment, Backend, BackendId, DirectoryConfig, DirectoryError, TableChange, Timestamp,
    TrixelId, ROOTS,
};

/// A subtree changing hands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    /// Subtree being moved.
    pub subtree_root: TrixelId,
    /// Previous owner.
    pub from: BackendId,
    /// New owner.
    pub to: BackendId,
}

/// Sibling group that can be collapsed into its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergePlan {
    /// Parent to activate.
    pub parent: TrixelId,
    /// Owner of the merged subtree.
    pub owner: BackendId,
}

/// Planner bound to a configuration.
#[derive(Clone, Copy, Debug)]
pub struct PartitionPlanner<'a> {
    config: &'a DirectoryConfig,
}

impl<'a> PartitionPlanner<'a> {
    /// Create a planner.
    pub fn new(config: &'a DirectoryConfig) -> Self {
        Self { config }
    }

    /// Delegate every uncovered root, round-robin over eligible backends
    /// in id order. Empty change if all roots are covered.
    pub fn plan_bootstrap(
        &self,
        table: &AssignmentTable,
        backends: &[Backend],
        now: Timestamp,
    ) -> Result<TableChange, DirectoryError> {
        let uncovered: Vec<TrixelId> = ROOTS
            .iter()
            .copied()
            .filter(|root| table.get(*root).is_none() && table.first_active_descendant(*root).is_none())
            .collect();
        if uncovered.is_empty() {
            return Ok(TableChange::default());
        }

        let mut eligible: Vec<BackendId> = backends
            .iter()
            .filter(|b| is_eligible(b, self.config.allow_insecure_transport))
            .map(|b| b.id)
            .collect();
        eligible.sort();
        if eligible.is_empty() {
            return Err(DirectoryError::NoEligibleBackend);
        }

        let delegations: Vec<(TrixelId, BackendId)> = uncovered
            .into_iter()
            .zip(eligible.iter().copied().cycle())
            .collect();
        table.plan_fill(&delegations, now)
    }

    /// Whether the owner is above the high-water mark.
    ///
    /// The reported load is stale once territory was shed, so an owner grows
    /// at most once per heartbeat.
    pub fn needs_growth(&self, owner: &Backend) -> bool {
        !owner.shed_since_heartbeat && owner.load_ratio() > self.config.high_water
    }

    /// Split `subtree_root` away from its overloaded owner.
    ///
    /// Children are dealt over the rotation of eligible alternatives by
    /// load, followed by the owner itself.
    pub fn plan_growth(
        &self,
        table: &AssignmentTable,
        subtree_root: TrixelId,
        owner: &Backend,
        backends: &[Backend],
        now: Timestamp,
    ) -> Result<TableChange, DirectoryError> {
        let mut rotation: Vec<BackendId> =
            rank_eligible(backends, self.config.allow_insecure_transport, Some(owner.id))
                .iter()
                .map(|b| b.id)
                .collect();
        if rotation.is_empty() {
            return Err(DirectoryError::NoEligibleBackend);
        }
        rotation.push(owner.id);

        let owners: BTreeMap<TrixelId, BackendId> = subtree_root
            .children()?
            .into_iter()
            .zip(rotation.into_iter().cycle())
            .collect();
        table.plan_split(subtree_root, &owners, now)
    }

    /// Destinations for every subtree owned by `leaving`.
    ///
    /// Each pick adds an estimated share of the leaving backend's load to
    /// the target so consecutive subtrees spread out.
    pub fn plan_reassignment(
        &self,
        table: &AssignmentTable,
        leaving: BackendId,
        backends: &[Backend],
    ) -> Result<Vec<Move>, DirectoryError> {
        let owned = table.owned_by(leaving);
        if owned.is_empty() {
            return Ok(Vec::new());
        }

        let mut projected: Vec<(u32, BackendId)> =
            rank_eligible(backends, self.config.allow_insecure_transport, Some(leaving))
                .iter()
                .map(|b| (b.current_load, b.id))
                .collect();
        if projected.is_empty() {
            return Err(DirectoryError::NoEligibleBackend);
        }

        let leaving_load = backends
            .iter()
            .find(|b| b.id == leaving)
            .map(|b| b.current_load)
            .unwrap_or(0);
        let share = leaving_load.div_ceil(owned.len() as u32).max(1);

        let mut moves = Vec::with_capacity(owned.len());
        for assignment in owned {
            let slot = projected
                .iter_mut()
                .min()
                .ok_or(DirectoryError::NoEligibleBackend)?;
            moves.push(Move {
                subtree_root: assignment.subtree_root,
                from: leaving,
                to: slot.1,
            });
            slot.0 = slot.0.saturating_add(share);
        }
        Ok(moves)
    }

    /// Destination for one subtree whose owner is no longer usable.
    pub fn plan_single_reassignment(
        &self,
        assignment: &Assignment,
        backends: &[Backend],
    ) -> Result<Move, DirectoryError> {
        let target = least_loaded(
            backends,
            self.config.allow_insecure_transport,
            Some(assignment.owner),
        )
        .ok_or(DirectoryError::NoEligibleBackend)?;
        Ok(Move {
            subtree_root: assignment.subtree_root,
            from: assignment.owner,
            to: target.id,
        })
    }

    /// Sibling groups whose owners have stayed quiet long enough.
    pub fn plan_merges(&self, table: &AssignmentTable, backends: &[Backend]) -> Vec<MergePlan> {
        let by_id: BTreeMap<BackendId, &Backend> = backends.iter().map(|b| (b.id, b)).collect();
        let mut plans = Vec::new();

        for (parent, group) in table.sibling_groups() {
            let mut owners: Vec<&Backend> = Vec::with_capacity(4);
            let mut quiet = true;
            for assignment in &group {
                match by_id.get(&assignment.owner) {
                    Some(&b)
                        if b.is_active()
                            && b.low_load_streak >= self.config.merge_after_low_heartbeats =>
                    {
                        if !owners.iter().any(|o| o.id == b.id) {
                            owners.push(b);
                        }
                    }
                    _ => {
                        quiet = false;
                        break;
                    }
                }
            }
            if !quiet {
                continue;
            }

            if let [only] = owners.as_slice() {
                plans.push(MergePlan {
                    parent,
                    owner: only.id,
                });
                continue;
            }

            let combined: u64 = owners.iter().map(|b| u64::from(b.current_load)).sum();
            let target = owners
                .iter()
                .filter(|b| is_eligible(b, self.config.allow_insecure_transport))
                .min_by_key(|b| (b.current_load, b.id));
            if let Some(target) = target {
                let projected = combined as f64 / f64::from(target.capacity_hint);
                if projected < self.config.low_water {
                    plans.push(MergePlan {
                        parent,
                        owner: target.id,
                    });
                }
            }
        }
        plans
    }
}
