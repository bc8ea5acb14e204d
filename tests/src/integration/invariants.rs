//! # Randomized Partition Checks
//!
//! Drives the assignment table with seeded random insert/split/merge
//! sequences and checks after every step that:
//!
//! - the active subtree roots never overlap and cover the sphere
//! - a rejected mutation leaves the active set untouched
//! - `resolve` is idempotent and returns a subtree containing the trixel

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use tl_directory::{AssignmentTable, BackendId, Timestamp, TrixelId, ROOTS};

    const OWNERS: u32 = 4;
    const MAX_DEPTH: u8 = 6;

    fn bootstrapped() -> AssignmentTable {
        let mut table = AssignmentTable::new(256);
        for (i, root) in ROOTS.iter().enumerate() {
            table
                .insert(*root, BackendId(i as u32 % OWNERS + 1), Timestamp::new(0))
                .unwrap();
        }
        table
    }

    fn random_trixel(rng: &mut StdRng, depth: u8) -> TrixelId {
        let mut id = ROOTS[rng.gen_range(0..ROOTS.len())];
        for _ in 0..depth {
            id = id.child(rng.gen_range(0..4)).unwrap();
        }
        id
    }

    fn random_owner(rng: &mut StdRng) -> BackendId {
        BackendId(rng.gen_range(1..=OWNERS))
    }

    fn run_sequence(seed: u64, steps: usize) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut table = bootstrapped();

        for step in 0..steps {
            let now = Timestamp::new(step as u64);
            let before = table.snapshot();
            let active = table.active_assignments();
            let pick = active[rng.gen_range(0..active.len())];

            let result = match rng.gen_range(0..4) {
                0 if pick.subtree_root.depth() < MAX_DEPTH => {
                    let mut owners = BTreeMap::new();
                    for child in pick.subtree_root.children().unwrap() {
                        if rng.gen_bool(0.5) {
                            owners.insert(child, random_owner(&mut rng));
                        }
                    }
                    table.split(pick.subtree_root, &owners, now)
                }
                1 => match pick.subtree_root.parent() {
                    Ok(parent) => table.merge(parent, random_owner(&mut rng), now),
                    Err(e) => Err(e),
                },
                2 => table.insert(pick.subtree_root, random_owner(&mut rng), now),
                _ => {
                    let depth = rng.gen_range(0..=MAX_DEPTH);
                    let target = random_trixel(&mut rng, depth);
                    table.insert(target, random_owner(&mut rng), now)
                }
            };

            table
                .check_partition()
                .unwrap_or_else(|e| panic!("seed {seed} step {step}: {e}"));
            match result {
                Ok(change) => {
                    for old in &change.superseded {
                        assert!(table.get(old.subtree_root).map_or(true, |a| a.generation > old.generation));
                    }
                }
                Err(_) => assert_eq!(table.snapshot(), before, "seed {seed} step {step}"),
            }
        }

        for _ in 0..200 {
            let target = random_trixel(&mut rng, 10);
            let first = table.resolve(target).unwrap();
            let second = table.resolve(target).unwrap();
            assert_eq!(first, second);
            assert!(first.subtree_root.contains(target));
            assert!(first.is_active());
        }
    }

    #[test]
    fn test_random_sequences_keep_partition() {
        for seed in 0..16 {
            run_sequence(seed, 400);
        }
    }

    #[test]
    fn test_generations_strictly_increase_per_subtree() {
        let mut table = bootstrapped();
        let root = TrixelId::new(13).unwrap();
        let mut last = table.resolve(root).unwrap().generation;
        for i in 0..10u64 {
            let now = Timestamp::new(i);
            table.split(root, &BTreeMap::new(), now).unwrap();
            let child = table.resolve(root.child(2).unwrap()).unwrap().generation;
            assert!(child > last);
            table.merge(root, BackendId(1), now).unwrap();
            let merged = table.resolve(root).unwrap().generation;
            assert!(merged > child);
            last = merged;
        }
    }

    #[test]
    fn test_split_owners_hold_for_every_leaf_until_merge() {
        let mut table = bootstrapped();
        let parent = TrixelId::new(15).unwrap();
        let [c1, c2, _, _] = parent.children().unwrap();
        let (a, b) = (BackendId(7), BackendId(8));
        let owners = BTreeMap::from([(c1, a), (c2, b)]);
        table.split(parent, &owners, Timestamp::new(1)).unwrap();

        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..100 {
            let mut leaf_under_c1 = c1;
            let mut leaf_under_c2 = c2;
            for _ in 0..rng.gen_range(0..8) {
                leaf_under_c1 = leaf_under_c1.child(rng.gen_range(0..4)).unwrap();
                leaf_under_c2 = leaf_under_c2.child(rng.gen_range(0..4)).unwrap();
            }
            assert_eq!(table.resolve(leaf_under_c1).unwrap().owner, a);
            assert_eq!(table.resolve(leaf_under_c2).unwrap().owner, b);
        }

        table.merge(parent, a, Timestamp::new(2)).unwrap();
        for _ in 0..100 {
            let mut leaf = parent;
            for _ in 0..rng.gen_range(0..8) {
                leaf = leaf.child(rng.gen_range(0..4)).unwrap();
            }
            let resolved = table.resolve(leaf).unwrap();
            assert_eq!(resolved.owner, a);
            assert_eq!(resolved.subtree_root, parent);
        }
    }

    #[test]
    fn test_ancestor_insert_rejected_without_mutation() {
        let mut table = bootstrapped();
        let parent = TrixelId::new(11).unwrap();
        table.split(parent, &BTreeMap::new(), Timestamp::new(1)).unwrap();
        let before = table.snapshot();
        assert!(table.insert(parent, BackendId(9), Timestamp::new(2)).is_err());
        assert_eq!(table.snapshot(), before);
    }

    #[test]
    fn test_split_then_merge_restores_owners() {
        let mut table = bootstrapped();
        let before = table.snapshot();
        let root = TrixelId::new(10).unwrap();
        let owner = table.resolve(root).unwrap().owner;

        table.split(root, &BTreeMap::new(), Timestamp::new(1)).unwrap();
        assert_eq!(table.len(), ROOTS.len() + 3);
        table.merge(root, owner, Timestamp::new(2)).unwrap();

        assert_eq!(table.snapshot(), before);
        assert_eq!(table.history().count(), 5);
    }
}
