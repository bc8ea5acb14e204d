//! # Domain Invariants
//!
//! Partition rules that must hold for every committed assignment table:
//! active subtrees never overlap, and together they cover all 8 roots.

use std::collections::HashSet;

use super::errors::DirectoryError;
use super::trixel::{TrixelId, ROOTS};

/// Invariant: no active subtree contains another.
pub fn invariant_non_overlapping(roots: &[TrixelId]) -> Result<(), DirectoryError> {
    let active: HashSet<TrixelId> = roots.iter().copied().collect();
    if active.len() != roots.len() {
        let mut seen = HashSet::new();
        for root in roots {
            if !seen.insert(*root) {
                return Err(DirectoryError::OverlapConflict {
                    subtree_root: *root,
                    conflicting: *root,
                });
            }
        }
    }
    // Checking ancestors only keeps this O(n * depth).
    for root in roots {
        if let Some(ancestor) = root.ancestors().find(|a| active.contains(a)) {
            return Err(DirectoryError::OverlapConflict {
                subtree_root: *root,
                conflicting: ancestor,
            });
        }
    }
    Ok(())
}

/// Invariant: every trixel is covered by some active subtree.
///
/// Returns `Unpartitioned` with the first uncovered node found.
pub fn invariant_full_coverage(roots: &[TrixelId]) -> Result<(), DirectoryError> {
    let active: HashSet<TrixelId> = roots.iter().copied().collect();
    // Nodes strictly above some active subtree.
    let interior: HashSet<TrixelId> = roots.iter().flat_map(|r| r.ancestors()).collect();

    let mut stack: Vec<TrixelId> = ROOTS.iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        if active.contains(&node) {
            continue;
        }
        if !interior.contains(&node) {
            return Err(DirectoryError::Unpartitioned(node));
        }
        let children = node.children()?;
        stack.extend(children.iter().rev());
    }
    Ok(())
}

/// Both partition invariants.
pub fn invariant_partition(roots: &[TrixelId]) -> Result<(), DirectoryError> {
    invariant_non_overlapping(roots)?;
    invariant_full_coverage(roots)
}
