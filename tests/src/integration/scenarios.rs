//! # Directory Scenarios
//!
//! End-to-end flows through `TrixelDirectoryApi`:
//!
//! 1. **Bootstrap + growth**: first backend takes every root, an overloaded
//!    owner sheds children to a newcomer
//! 2. **Eviction**: a silent backend loses its territory after the grace period
//! 3. **Insecure registration**: rejected without touching the registry
//! 4. **Conflicts**: rejected mutations leave the snapshot unchanged
//! 5. **Restart**: a JSON-backed directory comes back identical

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use tl_directory::test_utils::ManualTimeSource;
    use tl_directory::{
        BackendId, BackendStatus, DirectoryConfig, DirectoryError, GrowthOutcome,
        JsonFileDirectoryStore, Page, TransportSecurity, TrixelDirectoryApi,
        TrixelDirectoryService, TrixelId, ROOTS,
    };

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn t(raw: u64) -> TrixelId {
        TrixelId::new(raw).unwrap()
    }

    fn directory(config: DirectoryConfig) -> (TrixelDirectoryService, ManualTimeSource) {
        let clock = ManualTimeSource::new(10_000);
        let service = TrixelDirectoryService::in_memory(config, Box::new(clock.clone())).unwrap();
        (service, clock)
    }

    fn join(service: &TrixelDirectoryService, name: &str, capacity: u32) -> BackendId {
        service
            .register_backend(name, TransportSecurity::Encrypted, capacity)
            .unwrap()
    }

    // =========================================================================
    // SCENARIOS
    // =========================================================================

    #[test]
    fn test_bootstrap_then_growth() {
        let (service, _) = directory(DirectoryConfig::for_testing());
        let a = join(&service, "tms-a.example.org", 100);
        assert_eq!(service.list_assignments(Page::default()).len(), ROOTS.len());

        let b = join(&service, "tms-b.example.org", 100);
        service.heartbeat(a, 95).unwrap();

        let target = t(12).child(2).unwrap().child(0).unwrap();
        let response = service.lookup(target).unwrap();
        assert!(matches!(response.growth, GrowthOutcome::Split { .. }));
        assert!(response.subtree_root.contains(target));
        assert_eq!(response.subtree_root.depth(), 1);

        let owners: Vec<BackendId> = t(12)
            .children()
            .unwrap()
            .iter()
            .map(|c| service.who_owns(*c).unwrap())
            .collect();
        assert_eq!(owners, vec![b, a, b, a]);
        service.check_partition().unwrap();

        // N32 went to B, so the lookup answers with B.
        assert_eq!(response.owner, b);
        assert_eq!(response.endpoint, "https://tms-b.example.org");
    }

    #[test]
    fn test_eviction_reassigns_every_subtree() {
        let (service, clock) = directory(DirectoryConfig::for_testing());
        let a = join(&service, "tms-a", 100);
        let b = join(&service, "tms-b", 100);
        let c = join(&service, "tms-c", 100);
        service.split_assignment(t(8), &BTreeMap::new()).unwrap();
        let owned_by_a = service.backend_assignments(a).unwrap().len();
        assert_eq!(owned_by_a, 11);

        // Keep B and C alive while A stays silent.
        for _ in 0..12 {
            clock.advance(10);
            service.heartbeat(b, 30).unwrap();
            service.heartbeat(c, 30).unwrap();
            service.run_maintenance();
        }

        assert!(matches!(
            service.get_backend(a),
            Err(DirectoryError::UnknownBackend(_))
        ));
        let to_b = service.backend_assignments(b).unwrap().len();
        let to_c = service.backend_assignments(c).unwrap().len();
        assert_eq!(to_b + to_c, owned_by_a);
        assert!(to_b.abs_diff(to_c) <= 1);
        service.check_partition().unwrap();
    }

    #[test]
    fn test_insecure_registration_rejected() {
        let (service, _) = directory(DirectoryConfig::for_testing());
        join(&service, "tms-a", 10);
        let before = service.list_backends(None, Page::default());

        let err = service
            .register_backend("tms-plain", TransportSecurity::Plain, 10)
            .unwrap_err();
        assert!(matches!(err, DirectoryError::InsecureTransportRejected(_)));
        assert_eq!(service.list_backends(None, Page::default()), before);
    }

    #[test]
    fn test_insecure_registration_allowed_when_enabled() {
        let config = DirectoryConfig {
            allow_insecure_transport: true,
            ..DirectoryConfig::for_testing()
        };
        let (service, _) = directory(config);
        let id = service
            .register_backend("tms.local:8080", TransportSecurity::Plain, 10)
            .unwrap();
        assert_eq!(service.lookup(t(8)).unwrap().endpoint, "http://tms.local:8080");
        assert_eq!(service.who_owns(t(15)).unwrap(), id);
    }

    #[test]
    fn test_conflicting_mutations_leave_snapshot_unchanged() {
        let (service, _) = directory(DirectoryConfig::for_testing());
        let a = join(&service, "tms-a", 100);
        service.split_assignment(t(9), &BTreeMap::new()).unwrap();
        let before = service.assignment_snapshot();

        let stray = BTreeMap::from([(t(10).child(0).unwrap(), a)]);
        let attempts = [
            service.insert_assignment(t(9), a).map(|_| ()),
            service
                .insert_assignment(t(9).child(0).unwrap().child(0).unwrap(), a)
                .map(|_| ()),
            service.split_assignment(t(9), &BTreeMap::new()).map(|_| ()),
            service.split_assignment(t(11), &stray).map(|_| ()),
            service.merge_assignment(t(10), a).map(|_| ()),
            service.merge_assignment(t(9).child(2).unwrap(), a).map(|_| ()),
        ];
        for attempt in attempts {
            assert!(attempt.is_err());
            assert_eq!(service.assignment_snapshot(), before);
        }
        service.check_partition().unwrap();
    }

    #[test]
    fn test_deregistration_drains_to_remaining_backends() {
        let (service, _) = directory(DirectoryConfig::for_testing());
        let a = join(&service, "tms-a", 100);
        let b = join(&service, "tms-b", 100);

        service.deregister_backend(a).unwrap();
        assert_eq!(
            service.list_backends(Some(BackendStatus::Active), Page::default()).len(),
            1
        );
        for root in ROOTS {
            assert_eq!(service.lookup(root).unwrap().owner, b);
        }
    }

    #[test]
    fn test_json_directory_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directory.json");
        let clock = ManualTimeSource::new(500);

        let (snapshot, b) = {
            let store = Arc::new(JsonFileDirectoryStore::open(&path).unwrap());
            let service = TrixelDirectoryService::new(
                DirectoryConfig::for_testing(),
                store,
                Box::new(clock.clone()),
            )
            .unwrap();
            join(&service, "tms-a", 100);
            let b = join(&service, "tms-b", 100);
            let owners = BTreeMap::from([(t(14).child(1).unwrap(), b)]);
            service.split_assignment(t(14), &owners).unwrap();
            (service.assignment_snapshot(), b)
        };

        let store = Arc::new(JsonFileDirectoryStore::open(&path).unwrap());
        let service =
            TrixelDirectoryService::new(DirectoryConfig::for_testing(), store, Box::new(clock))
                .unwrap();
        assert_eq!(service.assignment_snapshot(), snapshot);
        assert_eq!(service.who_owns(t(14).child(1).unwrap()).unwrap(), b);
        assert_eq!(service.assignment_history().len(), 1);
        service.check_partition().unwrap();
    }
}
