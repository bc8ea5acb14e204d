use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::domain::{
    Assignment, Backend, BackendId, BackendStatus, DirectoryError, Generation, MeasurementType,
    Page, ReferenceEntry, ReferenceId, ReferenceScope, SensorCount, ServiceKind,
    TransportSecurity, TrixelId,
};
use crate::ports::{LookupResponse, TrixelDirectoryApi};
use crate::service::TrixelDirectoryService;

impl TrixelDirectoryApi for TrixelDirectoryService {
    fn lookup(&self, trixel: TrixelId) -> Result<LookupResponse, DirectoryError> {
        self.resolve_lookup(trixel)
    }

    fn lookup_coordinates(
        &self,
        lat: f64,
        lon: f64,
        level: u8,
    ) -> Result<LookupResponse, DirectoryError> {
        let trixel = TrixelId::from_lat_lon(lat, lon, level)?;
        self.resolve_lookup(trixel)
    }

    fn who_owns(&self, trixel: TrixelId) -> Result<BackendId, DirectoryError> {
        Ok(self.resolve_assignment(trixel)?.owner)
    }

    fn validate_generation(
        &self,
        trixel: TrixelId,
        generation: Generation,
    ) -> Result<(), DirectoryError> {
        self.check_generation(trixel, generation)
    }

    fn register_backend(
        &self,
        endpoint: &str,
        transport_security: TransportSecurity,
        capacity_hint: u32,
    ) -> Result<BackendId, DirectoryError> {
        let backend =
            self.registry
                .register(endpoint, transport_security, capacity_hint, self.now())?;
        if let Err(e) = self.store.persist_backend(&backend) {
            self.registry.remove(backend.id);
            return Err(e.into());
        }
        info!(
            "[tl-dir] Registered {} at {} (capacity {})",
            backend.id,
            backend.base_url(),
            capacity_hint
        );

        if let Err(e) = self.bootstrap() {
            warn!("[tl-dir] Bootstrap after registration failed: {}", e);
        }
        Ok(backend.id)
    }

    fn heartbeat(&self, backend: BackendId, current_load: u32) -> Result<(), DirectoryError> {
        let revived = self.registry.heartbeat(backend, current_load, self.now())?;
        if revived {
            info!("[tl-dir] {} is reachable again", backend);
            self.store.persist_backend(&self.registry.get(backend)?)?;
        }
        Ok(())
    }

    fn deregister_backend(&self, backend: BackendId) -> Result<(), DirectoryError> {
        let previous = self.registry.get(backend)?;
        let draining = self.registry.mark_draining(backend, self.now())?;
        if let Err(e) = self.store.persist_backend(&draining) {
            self.registry.replace(previous);
            return Err(e.into());
        }
        info!("[tl-dir] {} is draining", backend);

        // On failure the backend stays draining and maintenance retries.
        self.evict(backend)?;
        Ok(())
    }

    fn update_backend_endpoint(
        &self,
        backend: BackendId,
        endpoint: &str,
    ) -> Result<(), DirectoryError> {
        let previous = self.registry.get(backend)?;
        let updated = self.registry.update_endpoint(backend, endpoint)?;
        if let Err(e) = self.store.persist_backend(&updated) {
            self.registry.replace(previous);
            return Err(e.into());
        }
        info!("[tl-dir] {} moved to {}", backend, updated.base_url());
        Ok(())
    }

    fn get_backend(&self, backend: BackendId) -> Result<Backend, DirectoryError> {
        self.registry.get(backend)
    }

    fn list_backends(&self, status: Option<BackendStatus>, page: Page) -> Vec<Backend> {
        self.registry.list(status, page)
    }

    fn list_assignments(&self, page: Page) -> Vec<Assignment> {
        page.apply(self.table.read().active_assignments())
    }

    fn backend_assignments(&self, backend: BackendId) -> Result<Vec<Assignment>, DirectoryError> {
        self.registry.get(backend)?;
        Ok(self.table.read().owned_by(backend))
    }

    fn lookup_reference(&self, scope: ReferenceScope) -> Vec<ReferenceEntry> {
        self.references.lookup(scope)
    }

    fn add_reference(
        &self,
        scope: ReferenceScope,
        service_kind: ServiceKind,
        endpoint: &str,
    ) -> Result<ReferenceId, DirectoryError> {
        let id = self.references.add(scope, service_kind, endpoint)?;
        info!("[tl-dir] Published reference {} for {:?}", id, scope);
        Ok(id)
    }

    fn remove_reference(&self, id: ReferenceId) -> Result<ReferenceEntry, DirectoryError> {
        self.references.remove(id)
    }

    fn report_sensor_count(
        &self,
        backend: BackendId,
        trixel: TrixelId,
        measurement: MeasurementType,
        sensor_count: u32,
    ) -> Result<(), DirectoryError> {
        let counts = BTreeMap::from([(trixel, sensor_count)]);
        self.report_sensor_counts(backend, measurement, &counts)
    }

    fn report_sensor_counts(
        &self,
        backend: BackendId,
        measurement: MeasurementType,
        counts: &BTreeMap<TrixelId, u32>,
    ) -> Result<(), DirectoryError> {
        self.registry.get(backend)?;
        let now = self.now();

        // Held so ownership cannot change between the check and the write.
        let table = self.table.read();
        for trixel in counts.keys() {
            if table.resolve(*trixel)?.owner != backend {
                return Err(DirectoryError::NotOwner {
                    backend,
                    trixel: *trixel,
                });
            }
        }
        self.census
            .record(counts.iter().map(|(trixel, count)| SensorCount {
                trixel: *trixel,
                measurement,
                sensor_count: *count,
                reported_by: backend,
                updated_at: now,
            }));
        Ok(())
    }

    fn sensor_counts(&self, trixel: TrixelId, types: &[MeasurementType]) -> Vec<SensorCount> {
        self.census.counts(trixel, types)
    }

    fn trixels_with_sensors(
        &self,
        region: Option<TrixelId>,
        types: &[MeasurementType],
        page: Page,
    ) -> Vec<TrixelId> {
        self.census.trixels_with_sensors(region, types, page)
    }
}
