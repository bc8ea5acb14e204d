//! # Concurrent Lookups
//!
//! Readers resolve trixels while writers split, merge and reassign the
//! subtrees they fall in. Every lookup must see a complete partition.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::thread;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use tl_directory::test_utils::ManualTimeSource;
    use tl_directory::{
        DirectoryConfig, TransportSecurity, TrixelDirectoryApi, TrixelDirectoryService, TrixelId,
        ROOTS,
    };

    const READERS: usize = 4;
    const WRITER_ROUNDS: usize = 200;
    // Growth splits whole subtrees; targets stay well below anything a test
    // run can split, so a lookup never lands on an interior node.
    const LOOKUP_DEPTH: u8 = 12;

    fn service() -> TrixelDirectoryService {
        TrixelDirectoryService::in_memory(
            DirectoryConfig::for_testing(),
            Box::new(ManualTimeSource::new(0)),
        )
        .unwrap()
    }

    #[test]
    fn test_lookups_during_repartitioning_never_miss() {
        let service = service();
        let a = service
            .register_backend("tms-a", TransportSecurity::Encrypted, 1000)
            .unwrap();
        let b = service
            .register_backend("tms-b", TransportSecurity::Encrypted, 1000)
            .unwrap();
        let hot = TrixelId::new(12).unwrap();
        let done = AtomicBool::new(false);
        let start = Barrier::new(READERS + 1);

        thread::scope(|s| {
            for seed in 0..READERS as u64 {
                let (service, done, start) = (&service, &done, &start);
                s.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    start.wait();
                    let mut resolved = 0u64;
                    while !done.load(Ordering::Acquire) || resolved < 100 {
                        let mut target = if rng.gen_bool(0.8) {
                            hot
                        } else {
                            ROOTS[rng.gen_range(0..ROOTS.len())]
                        };
                        for _ in 0..8 {
                            target = target.child(rng.gen_range(0..4)).unwrap();
                        }
                        let response = service.lookup(target).unwrap();
                        assert!(response.subtree_root.contains(target));
                        assert!(response.owner == a || response.owner == b);
                        resolved += 1;
                    }
                });
            }

            let (service, done, start) = (&service, &done, &start);
            s.spawn(move || {
                start.wait();
                for round in 0..WRITER_ROUNDS {
                    let owners = BTreeMap::from([(hot.child((round % 4) as u8).unwrap(), b)]);
                    service.split_assignment(hot, &owners).unwrap();
                    service.merge_assignment(hot, a).unwrap();
                    if round % 10 == 0 {
                        service.insert_assignment(hot, b).unwrap();
                        service.insert_assignment(hot, a).unwrap();
                    }
                }
                done.store(true, Ordering::Release);
            });
        });

        service.check_partition().unwrap();
        assert_eq!(service.who_owns(hot).unwrap(), a);
    }

    #[test]
    fn test_lookups_never_answer_with_departed_backends() {
        let service = service();
        let a = service
            .register_backend("tms-a", TransportSecurity::Encrypted, 100)
            .unwrap();
        let done = AtomicBool::new(false);
        let start = Barrier::new(READERS + 1);

        thread::scope(|s| {
            for seed in 0..READERS as u64 {
                let (service, done, start) = (&service, &done, &start);
                s.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    start.wait();
                    for _ in 0..WRITER_ROUNDS {
                        // Keep the stable owner overloaded so lookups shed
                        // territory to whoever is currently registered.
                        service.heartbeat(a, 95).unwrap();
                        let mut target = ROOTS[rng.gen_range(0..ROOTS.len())];
                        for _ in 0..LOOKUP_DEPTH {
                            target = target.child(rng.gen_range(0..4)).unwrap();
                        }
                        let response = service.lookup(target).unwrap();
                        assert!(response.subtree_root.contains(target));
                        if done.load(Ordering::Acquire) {
                            break;
                        }
                    }
                });
            }

            let (service, done, start) = (&service, &done, &start);
            s.spawn(move || {
                start.wait();
                for round in 0..WRITER_ROUNDS {
                    let transient = service
                        .register_backend(&format!("tms-t{round}"), TransportSecurity::Encrypted, 100)
                        .unwrap();
                    service.deregister_backend(transient).unwrap();
                }
                done.store(true, Ordering::Release);
            });
        });

        service.run_maintenance();
        service.check_partition().unwrap();
    }

    #[test]
    fn test_concurrent_heartbeats_and_growth() {
        let service = service();
        let ids: Vec<_> = (0..4)
            .map(|i| {
                service
                    .register_backend(&format!("tms-{i}"), TransportSecurity::Encrypted, 100)
                    .unwrap()
            })
            .collect();

        thread::scope(|s| {
            for (i, id) in ids.iter().enumerate() {
                let service = &service;
                s.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(i as u64);
                    for _ in 0..200 {
                        service.heartbeat(*id, rng.gen_range(0..100)).unwrap();
                        let mut target = ROOTS[rng.gen_range(0..ROOTS.len())];
                        for _ in 0..LOOKUP_DEPTH {
                            target = target.child(rng.gen_range(0..4)).unwrap();
                        }
                        let response = service.lookup(target).unwrap();
                        assert!(response.subtree_root.contains(target));
                    }
                });
            }
        });

        service.check_partition().unwrap();
    }
}
