//! # Assignment Table
//!
//! Active subtree delegations plus a bounded audit history.
//!
//! Active roots are keyed in a hash map, so resolving a trixel walks its
//! lineage (`id`, `parent(id)`, ...) and costs O(depth) lookups, independent
//! of the number of assignments or backends.
//!
//! Mutations are two-phase: `plan_*` validates a mutation against the
//! current state and returns a [`TableChange`] without touching anything,
//! [`AssignmentTable::apply`] installs it. The service persists in between,
//! so a failed write never leaves a half-applied table behind.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::domain::{
    invariant_non_overlapping, invariant_partition, Assignment, BackendId, DirectoryError,
    Generation, TableChange, Timestamp, TrixelId,
};

/// In-memory assignment table.
#[derive(Clone, Debug)]
pub struct AssignmentTable {
    active: HashMap<TrixelId, Assignment>,
    history: VecDeque<Assignment>,
    history_limit: usize,
    next_generation: u64,
}

impl AssignmentTable {
    /// Create an empty table.
    pub fn new(history_limit: usize) -> Self {
        Self {
            active: HashMap::new(),
            history: VecDeque::new(),
            history_limit,
            next_generation: 1,
        }
    }

    /// Rebuild a table from persisted records.
    ///
    /// Active records must not overlap. Coverage is not required, the
    /// service bootstraps missing roots afterwards.
    pub fn from_assignments(
        records: Vec<Assignment>,
        history_limit: usize,
    ) -> Result<Self, DirectoryError> {
        let mut table = Self::new(history_limit);
        let mut superseded = Vec::new();
        for record in records {
            table.next_generation = table.next_generation.max(record.generation.0 + 1);
            if record.is_active() {
                if table.active.insert(record.subtree_root, record).is_some() {
                    return Err(DirectoryError::OverlapConflict {
                        subtree_root: record.subtree_root,
                        conflicting: record.subtree_root,
                    });
                }
            } else {
                superseded.push(record);
            }
        }
        let roots: Vec<TrixelId> = table.active.keys().copied().collect();
        invariant_non_overlapping(&roots)?;

        superseded.sort_by_key(|a| a.generation);
        for record in superseded {
            table.push_history(record);
        }
        Ok(table)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Active assignment covering `id`.
    pub fn resolve(&self, id: TrixelId) -> Result<Assignment, DirectoryError> {
        id.lineage()
            .find_map(|node| self.active.get(&node).copied())
            .ok_or(DirectoryError::Unpartitioned(id))
    }

    /// Active assignment rooted exactly at `subtree_root`.
    pub fn get(&self, subtree_root: TrixelId) -> Option<Assignment> {
        self.active.get(&subtree_root).copied()
    }

    /// Number of active assignments.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no assignment is active.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Highest generation handed out so far.
    pub fn current_generation(&self) -> Generation {
        Generation(self.next_generation - 1)
    }

    /// Active assignments ordered by subtree root.
    pub fn active_assignments(&self) -> Vec<Assignment> {
        let mut all: Vec<Assignment> = self.active.values().copied().collect();
        all.sort_by_key(|a| a.subtree_root);
        all
    }

    /// Active assignments of one backend, ordered by subtree root.
    pub fn owned_by(&self, owner: BackendId) -> Vec<Assignment> {
        let mut owned: Vec<Assignment> = self
            .active
            .values()
            .filter(|a| a.owner == owner)
            .copied()
            .collect();
        owned.sort_by_key(|a| a.subtree_root);
        owned
    }

    /// Active subtree roots and owners, for comparison.
    pub fn snapshot(&self) -> BTreeMap<TrixelId, BackendId> {
        self.active
            .iter()
            .map(|(root, a)| (*root, a.owner))
            .collect()
    }

    /// Superseded assignments, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Assignment> {
        self.history.iter()
    }

    /// Active strict ancestor of `id`, if any.
    pub fn covering_ancestor(&self, id: TrixelId) -> Option<Assignment> {
        id.ancestors().find_map(|a| self.active.get(&a).copied())
    }

    /// Lowest active strict descendant of `id`, if any.
    pub fn first_active_descendant(&self, id: TrixelId) -> Option<TrixelId> {
        self.active
            .keys()
            .filter(|root| id.is_ancestor_of(**root))
            .min()
            .copied()
    }

    /// Parents whose 4 children are all active, with those children.
    pub fn sibling_groups(&self) -> Vec<(TrixelId, [Assignment; 4])> {
        let mut groups: Vec<(TrixelId, [Assignment; 4])> = self
            .active
            .keys()
            .filter(|root| root.child_index() == Some(0))
            .filter_map(|first| {
                let parent = first.parent().ok()?;
                let children = parent.children().ok()?;
                let mut group = [self.active.get(first).copied()?; 4];
                for (slot, child) in group.iter_mut().zip(children).skip(1) {
                    *slot = self.active.get(&child).copied()?;
                }
                Some((parent, group))
            })
            .collect();
        groups.sort_by_key(|(parent, _)| *parent);
        groups
    }

    /// Verify the partition invariants on the active set.
    pub fn check_partition(&self) -> Result<(), DirectoryError> {
        let roots: Vec<TrixelId> = self.active.keys().copied().collect();
        invariant_partition(&roots)
    }

    // =========================================================================
    // PLANNING
    // =========================================================================

    /// Plan delegating `subtree_root` to `owner`.
    ///
    /// Supersedes an exact active match, otherwise fills a gap.
    pub fn plan_insert(
        &self,
        subtree_root: TrixelId,
        owner: BackendId,
        now: Timestamp,
    ) -> Result<TableChange, DirectoryError> {
        self.ensure_no_nested(subtree_root)?;
        let superseded = self
            .get(subtree_root)
            .map(|existing| existing.superseded(now))
            .into_iter()
            .collect();
        Ok(TableChange {
            superseded,
            activated: vec![Assignment::new(
                subtree_root,
                owner,
                Generation(self.next_generation),
                now,
            )],
        })
    }

    /// Plan filling several gaps at once.
    pub fn plan_fill(
        &self,
        delegations: &[(TrixelId, BackendId)],
        now: Timestamp,
    ) -> Result<TableChange, DirectoryError> {
        let mut change = TableChange::default();
        for (offset, (root, owner)) in delegations.iter().enumerate() {
            if let Some(existing) = self.get(*root) {
                return Err(DirectoryError::OverlapConflict {
                    subtree_root: *root,
                    conflicting: existing.subtree_root,
                });
            }
            self.ensure_no_nested(*root)?;
            if let Some(previous) = change.activated.iter().find(|a| a.subtree_root.overlaps(*root)) {
                return Err(DirectoryError::OverlapConflict {
                    subtree_root: *root,
                    conflicting: previous.subtree_root,
                });
            }
            change.activated.push(Assignment::new(
                *root,
                *owner,
                Generation(self.next_generation + offset as u64),
                now,
            ));
        }
        Ok(change)
    }

    /// Plan splitting an active subtree into its 4 children.
    ///
    /// Children missing from `owners` keep the current owner.
    pub fn plan_split(
        &self,
        subtree_root: TrixelId,
        owners: &BTreeMap<TrixelId, BackendId>,
        now: Timestamp,
    ) -> Result<TableChange, DirectoryError> {
        let current = match self.get(subtree_root) {
            Some(current) => current,
            None => return Err(self.inactive_error(subtree_root)),
        };
        let children = subtree_root.children()?;
        if let Some(stray) = owners.keys().find(|k| !children.contains(k)) {
            return Err(DirectoryError::InvalidSplit {
                parent: subtree_root,
                child: *stray,
            });
        }

        let activated = children
            .iter()
            .enumerate()
            .map(|(offset, child)| {
                let owner = owners.get(child).copied().unwrap_or(current.owner);
                Assignment::new(
                    *child,
                    owner,
                    Generation(self.next_generation + offset as u64),
                    now,
                )
            })
            .collect();
        Ok(TableChange {
            superseded: vec![current.superseded(now)],
            activated,
        })
    }

    /// Plan collapsing 4 active sibling leaves into `parent`.
    pub fn plan_merge(
        &self,
        parent: TrixelId,
        owner: BackendId,
        now: Timestamp,
    ) -> Result<TableChange, DirectoryError> {
        if self.active.contains_key(&parent) {
            return Err(DirectoryError::OverlapConflict {
                subtree_root: parent,
                conflicting: parent,
            });
        }
        if let Some(ancestor) = self.covering_ancestor(parent) {
            return Err(DirectoryError::OverlapConflict {
                subtree_root: parent,
                conflicting: ancestor.subtree_root,
            });
        }

        let mut superseded = Vec::with_capacity(4);
        for child in parent.children()? {
            match self.get(child) {
                Some(current) => superseded.push(current.superseded(now)),
                None => {
                    return Err(match self.first_active_descendant(child) {
                        Some(deeper) => DirectoryError::OverlapConflict {
                            subtree_root: parent,
                            conflicting: deeper,
                        },
                        None => DirectoryError::Unpartitioned(child),
                    })
                }
            }
        }
        Ok(TableChange {
            superseded,
            activated: vec![Assignment::new(
                parent,
                owner,
                Generation(self.next_generation),
                now,
            )],
        })
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Install a planned change.
    ///
    /// The change must have been planned against the current state.
    pub fn apply(&mut self, change: TableChange) {
        for old in change.superseded {
            self.active.remove(&old.subtree_root);
            self.push_history(old);
        }
        for new in change.activated {
            self.next_generation = self.next_generation.max(new.generation.0 + 1);
            self.active.insert(new.subtree_root, new);
        }
    }

    /// Plan and apply an insert.
    pub fn insert(
        &mut self,
        subtree_root: TrixelId,
        owner: BackendId,
        now: Timestamp,
    ) -> Result<TableChange, DirectoryError> {
        let change = self.plan_insert(subtree_root, owner, now)?;
        self.apply(change.clone());
        Ok(change)
    }

    /// Plan and apply a split.
    pub fn split(
        &mut self,
        subtree_root: TrixelId,
        owners: &BTreeMap<TrixelId, BackendId>,
        now: Timestamp,
    ) -> Result<TableChange, DirectoryError> {
        let change = self.plan_split(subtree_root, owners, now)?;
        self.apply(change.clone());
        Ok(change)
    }

    /// Plan and apply a merge.
    pub fn merge(
        &mut self,
        parent: TrixelId,
        owner: BackendId,
        now: Timestamp,
    ) -> Result<TableChange, DirectoryError> {
        let change = self.plan_merge(parent, owner, now)?;
        self.apply(change.clone());
        Ok(change)
    }

    fn ensure_no_nested(&self, subtree_root: TrixelId) -> Result<(), DirectoryError> {
        if let Some(ancestor) = self.covering_ancestor(subtree_root) {
            return Err(DirectoryError::OverlapConflict {
                subtree_root,
                conflicting: ancestor.subtree_root,
            });
        }
        if let Some(descendant) = self.first_active_descendant(subtree_root) {
            return Err(DirectoryError::OverlapConflict {
                subtree_root,
                conflicting: descendant,
            });
        }
        Ok(())
    }

    /// Why `subtree_root` cannot be treated as an active assignment.
    pub fn inactive_error(&self, subtree_root: TrixelId) -> DirectoryError {
        if let Some(ancestor) = self.covering_ancestor(subtree_root) {
            return DirectoryError::OverlapConflict {
                subtree_root,
                conflicting: ancestor.subtree_root,
            };
        }
        match self.first_active_descendant(subtree_root) {
            Some(descendant) => DirectoryError::OverlapConflict {
                subtree_root,
                conflicting: descendant,
            },
            None => DirectoryError::Unpartitioned(subtree_root),
        }
    }

    fn push_history(&mut self, record: Assignment) {
        if self.history_limit == 0 {
            return;
        }
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }
}

impl Default for AssignmentTable {
    fn default() -> Self {
        Self::new(4096)
    }
}
