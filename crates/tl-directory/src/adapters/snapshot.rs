//! Serializable image of everything a store holds.

use serde::{Deserialize, Serialize};

use crate::domain::{Assignment, Backend, BackendId, TableChange};

/// Superseded records kept by default.
pub const DEFAULT_RETENTION: usize = 4096;

/// Stored assignments and backends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    /// Active and superseded assignment records.
    pub assignments: Vec<Assignment>,
    /// Registered backends.
    pub backends: Vec<Backend>,
}

impl DirectorySnapshot {
    /// Record a table mutation, keeping at most `retention` superseded records.
    pub fn record_change(&mut self, change: &TableChange, retention: usize) {
        for old in &change.superseded {
            let existing = self.assignments.iter_mut().find(|a| {
                a.is_active() && a.subtree_root == old.subtree_root && a.generation == old.generation
            });
            match existing {
                Some(slot) => *slot = *old,
                None => self.assignments.push(*old),
            }
        }
        self.assignments.extend(change.activated.iter().copied());
        self.prune(retention);
    }

    /// Insert or replace a backend.
    pub fn upsert_backend(&mut self, backend: &Backend) {
        match self.backends.iter_mut().find(|b| b.id == backend.id) {
            Some(slot) => *slot = backend.clone(),
            None => {
                self.backends.push(backend.clone());
                self.backends.sort_by_key(|b| b.id);
            }
        }
    }

    /// Drop a backend.
    pub fn remove_backend(&mut self, id: BackendId) {
        self.backends.retain(|b| b.id != id);
    }

    fn prune(&mut self, retention: usize) {
        let superseded = self.assignments.iter().filter(|a| !a.is_active()).count();
        if superseded <= retention {
            return;
        }
        let mut generations: Vec<_> = self
            .assignments
            .iter()
            .filter(|a| !a.is_active())
            .map(|a| a.generation)
            .collect();
        generations.sort();
        let cutoff = generations[superseded - retention - 1];
        let mut excess = superseded - retention;
        self.assignments.retain(|a| {
            if excess > 0 && !a.is_active() && a.generation <= cutoff {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Generation, Timestamp, TrixelId};

    fn active(raw: u64, gen: u64) -> Assignment {
        Assignment::new(
            TrixelId::new(raw).unwrap(),
            BackendId(1),
            Generation(gen),
            Timestamp::new(0),
        )
    }

    #[test]
    fn test_record_change_marks_superseded_in_place() {
        let mut snapshot = DirectorySnapshot::default();
        snapshot.record_change(
            &TableChange {
                superseded: vec![],
                activated: vec![active(8, 1)],
            },
            10,
        );
        snapshot.record_change(
            &TableChange {
                superseded: vec![active(8, 1).superseded(Timestamp::new(5))],
                activated: vec![active(8, 2)],
            },
            10,
        );
        assert_eq!(snapshot.assignments.len(), 2);
        assert_eq!(snapshot.assignments.iter().filter(|a| a.is_active()).count(), 1);
    }

    #[test]
    fn test_prune_drops_oldest_superseded() {
        let mut snapshot = DirectorySnapshot::default();
        for gen in 1..=4 {
            snapshot.assignments.push(active(9, gen).superseded(Timestamp::new(gen)));
        }
        snapshot.record_change(
            &TableChange {
                superseded: vec![],
                activated: vec![active(8, 5)],
            },
            2,
        );
        let kept: Vec<u64> = snapshot
            .assignments
            .iter()
            .filter(|a| !a.is_active())
            .map(|a| a.generation.0)
            .collect();
        assert_eq!(kept, vec![3, 4]);
    }
}
