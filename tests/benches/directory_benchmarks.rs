//! # Trixel Directory Benchmarks
//!
//! | Operation | Claim | Target |
//! |-----------|-------|--------|
//! | `resolve` | O(depth), independent of table size | < 5µs at level 24 |
//! | `lookup` | resolve + owner check | < 10µs |
//! | `from_lat_lon` | O(level) | < 10µs at level 24 |

use std::collections::BTreeMap;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tl_directory::test_utils::ManualTimeSource;
use tl_directory::{
    AssignmentTable, BackendId, DirectoryConfig, Timestamp, TransportSecurity,
    TrixelDirectoryApi, TrixelDirectoryService, TrixelId, MAX_LEVEL, ROOTS,
};

fn random_trixel(rng: &mut StdRng, depth: u8) -> TrixelId {
    let mut id = ROOTS[rng.gen_range(0..ROOTS.len())];
    for _ in 0..depth {
        id = id.child(rng.gen_range(0..4)).unwrap();
    }
    id
}

/// Table split `splits` times at random active subtrees.
fn fragmented_table(splits: usize, rng: &mut StdRng) -> AssignmentTable {
    let mut table = AssignmentTable::new(0);
    for (i, root) in ROOTS.iter().enumerate() {
        table
            .insert(*root, BackendId(i as u32 % 16), Timestamp::new(0))
            .unwrap();
    }
    for _ in 0..splits {
        let active = table.active_assignments();
        let pick = active[rng.gen_range(0..active.len())];
        if pick.subtree_root.depth() < 12 {
            table
                .split(pick.subtree_root, &BTreeMap::new(), Timestamp::new(0))
                .unwrap();
        }
    }
    table
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("assignment-table");
    group.measurement_time(Duration::from_secs(5));
    let mut rng = StdRng::seed_from_u64(7);

    for splits in [0usize, 1_000, 10_000] {
        let table = fragmented_table(splits, &mut rng);
        let targets: Vec<TrixelId> = (0..1024)
            .map(|_| random_trixel(&mut rng, MAX_LEVEL))
            .collect();
        group.bench_with_input(
            BenchmarkId::new("resolve_level_24", table.len()),
            &table,
            |b, table| {
                let mut i = 0;
                b.iter(|| {
                    i = (i + 1) % targets.len();
                    black_box(table.resolve(targets[i]).unwrap())
                })
            },
        );
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let service = TrixelDirectoryService::in_memory(
        DirectoryConfig::default(),
        Box::new(ManualTimeSource::new(0)),
    )
    .unwrap();
    for i in 0..8 {
        service
            .register_backend(&format!("tms-{i}"), TransportSecurity::Encrypted, 1_000)
            .unwrap();
    }
    let mut rng = StdRng::seed_from_u64(11);
    let targets: Vec<TrixelId> = (0..1024).map(|_| random_trixel(&mut rng, 16)).collect();

    c.bench_function("service_lookup_level_16", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % targets.len();
            black_box(service.lookup(targets[i]).unwrap())
        })
    });
}

fn bench_coordinates(c: &mut Criterion) {
    c.bench_function("from_lat_lon_level_24", |b| {
        b.iter(|| black_box(TrixelId::from_lat_lon(52.52, 13.405, MAX_LEVEL).unwrap()))
    });
}

criterion_group!(benches, bench_resolve, bench_lookup, bench_coordinates);
criterion_main!(benches);
