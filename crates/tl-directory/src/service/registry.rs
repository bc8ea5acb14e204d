//! # Backend Registry
//!
//! Registered backends, their liveness and load.
//!
//! The map sits behind an `RwLock` and every backend behind its own
//! `Mutex`, so heartbeats on different backends never contend. The
//! registry never removes a backend on its own: `sweep` only reports
//! candidates, the service removes them after their territory moved.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::domain::{
    Backend, BackendId, BackendStatus, DirectoryConfig, DirectoryError, Page, Timestamp,
    TransportSecurity,
};

/// Outcome of a liveness sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Backends that just went silent for too long.
    pub newly_unreachable: Vec<BackendId>,
    /// Backends unreachable past the eviction grace period.
    pub eviction_candidates: Vec<BackendId>,
    /// Backends still waiting to hand over their territory.
    pub draining: Vec<BackendId>,
}

/// Registry of backends.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: RwLock<BTreeMap<BackendId, Arc<Mutex<Backend>>>>,
    next_id: AtomicU32,
    config: DirectoryConfig,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new(config: DirectoryConfig) -> Self {
        Self::restore(config, Vec::new())
    }

    /// Rebuild a registry from persisted backends.
    pub fn restore(config: DirectoryConfig, backends: Vec<Backend>) -> Self {
        let next_id = backends.iter().map(|b| b.id.0 + 1).max().unwrap_or(1);
        let backends = backends
            .into_iter()
            .map(|b| (b.id, Arc::new(Mutex::new(b))))
            .collect();
        Self {
            backends: RwLock::new(backends),
            next_id: AtomicU32::new(next_id),
            config,
        }
    }

    /// Admit a new backend.
    pub fn register(
        &self,
        endpoint: &str,
        transport_security: TransportSecurity,
        capacity_hint: u32,
        now: Timestamp,
    ) -> Result<Backend, DirectoryError> {
        let endpoint = validate_endpoint(endpoint)?;
        if capacity_hint == 0 {
            return Err(DirectoryError::InvalidCapacity(capacity_hint));
        }
        if transport_security == TransportSecurity::Plain && !self.config.allow_insecure_transport
        {
            warn!("[tl-dir] Rejected plain transport registration from {}", endpoint);
            return Err(DirectoryError::InsecureTransportRejected(endpoint));
        }

        let mut backends = self.backends.write();
        if let Some(max) = self.config.max_backends {
            let active = backends.values().filter(|b| b.lock().is_active()).count();
            if active >= max {
                return Err(DirectoryError::BackendLimitReached(max));
            }
        }

        let id = BackendId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let backend = Backend::new(id, endpoint, transport_security, capacity_hint, now);
        backends.insert(id, Arc::new(Mutex::new(backend.clone())));
        Ok(backend)
    }

    /// Record a heartbeat. Returns `true` if the backend came back from
    /// `Unreachable`.
    pub fn heartbeat(
        &self,
        id: BackendId,
        current_load: u32,
        now: Timestamp,
    ) -> Result<bool, DirectoryError> {
        let entry = self.entry(id)?;
        let mut backend = entry.lock();
        backend.current_load = current_load;
        backend.last_heartbeat = now;
        backend.missed_heartbeats = 0;
        backend.shed_since_heartbeat = false;
        if backend.load_ratio() < self.config.low_water {
            backend.low_load_streak = backend.low_load_streak.saturating_add(1);
        } else {
            backend.low_load_streak = 0;
        }

        if backend.status == BackendStatus::Unreachable {
            backend.transition_to(BackendStatus::Active, now)?;
            return Ok(true);
        }
        debug!("[tl-dir] Heartbeat from {} (load {})", id, current_load);
        Ok(false)
    }

    /// Record that a growth split moved territory off the backend.
    pub(crate) fn mark_shed(&self, id: BackendId) {
        if let Some(entry) = self.backends.read().get(&id) {
            entry.lock().shed_since_heartbeat = true;
        }
    }

    /// Mark a backend as leaving.
    pub fn mark_draining(&self, id: BackendId, now: Timestamp) -> Result<Backend, DirectoryError> {
        let entry = self.entry(id)?;
        let mut backend = entry.lock();
        backend.transition_to(BackendStatus::Draining, now)?;
        Ok(backend.clone())
    }

    /// Change a backend's endpoint.
    pub fn update_endpoint(&self, id: BackendId, endpoint: &str) -> Result<Backend, DirectoryError> {
        let endpoint = validate_endpoint(endpoint)?;
        let entry = self.entry(id)?;
        let mut backend = entry.lock();
        backend.endpoint = endpoint;
        Ok(backend.clone())
    }

    /// Put back a previous record of an existing backend.
    pub(crate) fn replace(&self, previous: Backend) {
        if let Some(entry) = self.backends.read().get(&previous.id) {
            *entry.lock() = previous;
        }
    }

    /// Forget a backend.
    pub fn remove(&self, id: BackendId) -> Option<Backend> {
        self.backends
            .write()
            .remove(&id)
            .map(|entry| entry.lock().clone())
    }

    /// Current record of a backend.
    pub fn get(&self, id: BackendId) -> Result<Backend, DirectoryError> {
        Ok(self.entry(id)?.lock().clone())
    }

    /// Whether the id is registered.
    pub fn contains(&self, id: BackendId) -> bool {
        self.backends.read().contains_key(&id)
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.backends.read().is_empty()
    }

    /// Copy of every backend, ordered by id.
    pub fn snapshot(&self) -> Vec<Backend> {
        self.backends
            .read()
            .values()
            .map(|entry| entry.lock().clone())
            .collect()
    }

    /// Backends ordered by id, optionally filtered by status.
    pub fn list(&self, status: Option<BackendStatus>, page: Page) -> Vec<Backend> {
        page.apply(
            self.snapshot()
                .into_iter()
                .filter(|b| status.map_or(true, |s| b.status == s)),
        )
    }

    /// Update liveness from heartbeat age.
    pub fn sweep(&self, now: Timestamp) -> SweepReport {
        let interval = self.config.heartbeat_interval_secs;
        let unreachable_after = self.config.unreachable_after_secs();
        let mut report = SweepReport::default();

        for (id, entry) in self.backends.read().iter() {
            let mut backend = entry.lock();
            let silent = now.secs_since(backend.last_heartbeat);
            backend.missed_heartbeats = u32::try_from(silent / interval).unwrap_or(u32::MAX);

            match backend.status {
                BackendStatus::Active if silent >= unreachable_after => {
                    if backend.transition_to(BackendStatus::Unreachable, now).is_ok() {
                        info!(
                            "[tl-dir] {} unreachable after {} missed heartbeats",
                            id, backend.missed_heartbeats
                        );
                        report.newly_unreachable.push(*id);
                    }
                }
                BackendStatus::Unreachable => {
                    let since = backend.unreachable_since.unwrap_or(now);
                    if now.secs_since(since) >= self.config.eviction_grace_secs {
                        report.eviction_candidates.push(*id);
                    }
                }
                BackendStatus::Draining => report.draining.push(*id),
                BackendStatus::Active => {}
            }
        }
        report
    }

    fn entry(&self, id: BackendId) -> Result<Arc<Mutex<Backend>>, DirectoryError> {
        self.backends
            .read()
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::UnknownBackend(id))
    }
}

/// Normalize an endpoint: host with optional port and path, no scheme.
pub(crate) fn validate_endpoint(endpoint: &str) -> Result<String, DirectoryError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty()
        || trimmed.contains(char::is_whitespace)
        || trimmed.contains("://")
        || trimmed.starts_with('/')
    {
        return Err(DirectoryError::InvalidEndpoint(endpoint.to_string()));
    }
    Ok(trimmed.to_string())
}
