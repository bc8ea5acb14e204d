//! # Driving Ports (Inbound API)
//!
//! What the trixel directory offers to a transport layer.
//!
//! All operations are synchronous and never perform network I/O. Callers
//! are already authenticated: backend-scoped operations receive the
//! caller's `BackendId` from the transport.

use std::collections::BTreeMap;

use crate::domain::{
    Assignment, Backend, BackendId, BackendStatus, DirectoryError, Generation, MeasurementType,
    Page, ReferenceEntry, ReferenceId, ReferenceScope, SensorCount, ServiceKind, TransportSecurity,
    TrixelId,
};

/// Result of the growth check performed during a lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrowthOutcome {
    /// Owner is within its capacity.
    NotNeeded,
    /// The resolved subtree was split.
    Split {
        /// Subtree that was split.
        subtree_root: TrixelId,
        /// Assignments that replaced it.
        children: Vec<Assignment>,
    },
    /// Growth was needed but could not be applied. The lookup still succeeded.
    Deferred(DirectoryError),
}

/// Answer to "who owns this trixel".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupResponse {
    /// Trixel that was asked for.
    pub trixel: TrixelId,
    /// Root of the subtree covering it.
    pub subtree_root: TrixelId,
    /// Owning backend.
    pub owner: BackendId,
    /// Owner endpoint including scheme.
    pub endpoint: String,
    /// Owner transport posture.
    pub transport_security: TransportSecurity,
    /// Generation of the covering assignment, for cache validation.
    pub generation: Generation,
    /// What the growth check did.
    pub growth: GrowthOutcome,
}

/// Trixel directory API - inbound port.
pub trait TrixelDirectoryApi: Send + Sync {
    // === Lookup ===

    /// Resolve the owner of a trixel, repairing or growing the partition
    /// when the owner is unusable or overloaded.
    fn lookup(&self, trixel: TrixelId) -> Result<LookupResponse, DirectoryError>;

    /// Resolve the owner of the trixel containing a point at `level`.
    fn lookup_coordinates(
        &self,
        lat: f64,
        lon: f64,
        level: u8,
    ) -> Result<LookupResponse, DirectoryError>;

    /// Current owner without any side effects.
    fn who_owns(&self, trixel: TrixelId) -> Result<BackendId, DirectoryError>;

    /// Fail with `StaleGeneration` if a cached lookup is out of date.
    fn validate_generation(
        &self,
        trixel: TrixelId,
        generation: Generation,
    ) -> Result<(), DirectoryError>;

    // === Backends ===

    /// Admit a backend and delegate uncovered roots to the pool.
    fn register_backend(
        &self,
        endpoint: &str,
        transport_security: TransportSecurity,
        capacity_hint: u32,
    ) -> Result<BackendId, DirectoryError>;

    /// Record a liveness report with the backend's current load.
    fn heartbeat(&self, backend: BackendId, current_load: u32) -> Result<(), DirectoryError>;

    /// Hand the backend's territory to others and remove it.
    fn deregister_backend(&self, backend: BackendId) -> Result<(), DirectoryError>;

    /// Change the address a backend is reached at.
    fn update_backend_endpoint(
        &self,
        backend: BackendId,
        endpoint: &str,
    ) -> Result<(), DirectoryError>;

    /// Registry record of a backend.
    fn get_backend(&self, backend: BackendId) -> Result<Backend, DirectoryError>;

    /// Backends ordered by id, optionally filtered by status.
    fn list_backends(&self, status: Option<BackendStatus>, page: Page) -> Vec<Backend>;

    // === Delegations ===

    /// Active assignments ordered by subtree root.
    fn list_assignments(&self, page: Page) -> Vec<Assignment>;

    /// Active assignments owned by one backend.
    fn backend_assignments(&self, backend: BackendId) -> Result<Vec<Assignment>, DirectoryError>;

    // === Reference directory ===

    /// Auxiliary services applicable to a scope, most specific first.
    fn lookup_reference(&self, scope: ReferenceScope) -> Vec<ReferenceEntry>;

    /// Publish an auxiliary service.
    fn add_reference(
        &self,
        scope: ReferenceScope,
        service_kind: ServiceKind,
        endpoint: &str,
    ) -> Result<ReferenceId, DirectoryError>;

    /// Withdraw an auxiliary service.
    fn remove_reference(&self, id: ReferenceId) -> Result<ReferenceEntry, DirectoryError>;

    // === Sensor census ===

    /// Record how many sensors of a type the owner serves in a trixel.
    fn report_sensor_count(
        &self,
        backend: BackendId,
        trixel: TrixelId,
        measurement: MeasurementType,
        sensor_count: u32,
    ) -> Result<(), DirectoryError>;

    /// Batch variant; rejected entirely if any trixel is not owned.
    fn report_sensor_counts(
        &self,
        backend: BackendId,
        measurement: MeasurementType,
        counts: &BTreeMap<TrixelId, u32>,
    ) -> Result<(), DirectoryError>;

    /// Counts recorded for a trixel, restricted to `types` (all if empty).
    fn sensor_counts(&self, trixel: TrixelId, types: &[MeasurementType]) -> Vec<SensorCount>;

    /// Trixels below `region` (everywhere if `None`) with at least one
    /// sensor of the given types.
    fn trixels_with_sensors(
        &self,
        region: Option<TrixelId>,
        types: &[MeasurementType],
        page: Page,
    ) -> Vec<TrixelId>;
}
