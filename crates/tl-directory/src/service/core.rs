use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::census::SensorCensus;
use super::references::ReferenceDirectory;
use super::registry::BackendRegistry;
use crate::adapters::InMemoryDirectoryStore;
use crate::algorithms::{AssignmentTable, PartitionPlanner};
use crate::domain::{
    Assignment, BackendId, DirectoryConfig, DirectoryError, TableChange, Timestamp, TrixelId,
};
use crate::ports::{DirectoryStore, TimeSource};

/// Trixel directory service implementing the driving port.
///
/// Owns the assignment table, the backend registry, the reference
/// directory and the sensor census. All operations take `&self`; share
/// the service behind an `Arc`.
///
/// # Lock order
///
/// The table lock is always taken before any registry lock. Registry
/// operations never touch the table.
///
/// # Example
///
/// ```rust,ignore
/// use tl_directory::{DirectoryConfig, TrixelDirectoryService, SystemTimeSource};
///
/// let service = TrixelDirectoryService::in_memory(
///     DirectoryConfig::default(),
///     Box::new(SystemTimeSource::new()),
/// )?;
/// let id = service.register_backend("tms.example.org", TransportSecurity::Encrypted, 100)?;
/// ```
pub struct TrixelDirectoryService {
    pub(crate) config: DirectoryConfig,
    pub(crate) table: RwLock<AssignmentTable>,
    pub(crate) registry: BackendRegistry,
    pub(crate) references: ReferenceDirectory,
    pub(crate) census: SensorCensus,
    pub(crate) store: Arc<dyn DirectoryStore>,
    pub(crate) time_source: Box<dyn TimeSource>,
}

impl TrixelDirectoryService {
    /// Create a service, restoring assignments and backends from `store`.
    ///
    /// Uncovered roots are bootstrapped if an eligible backend exists.
    pub fn new(
        config: DirectoryConfig,
        store: Arc<dyn DirectoryStore>,
        time_source: Box<dyn TimeSource>,
    ) -> Result<Self, DirectoryError> {
        config.validate()?;
        let assignments = store.load_all_assignments()?;
        let backends = store.load_all_backends()?;
        info!(
            "[tl-dir] Restoring {} assignment records and {} backends",
            assignments.len(),
            backends.len()
        );

        let table = AssignmentTable::from_assignments(assignments, config.history_limit)?;
        let registry = BackendRegistry::restore(config.clone(), backends);
        let service = Self {
            config,
            table: RwLock::new(table),
            registry,
            references: ReferenceDirectory::new(),
            census: SensorCensus::new(),
            store,
            time_source,
        };

        match service.bootstrap() {
            Ok(_) | Err(DirectoryError::NoEligibleBackend) => Ok(service),
            Err(e) => Err(e),
        }
    }

    /// Create a service with an empty in-memory store.
    pub fn in_memory(
        config: DirectoryConfig,
        time_source: Box<dyn TimeSource>,
    ) -> Result<Self, DirectoryError> {
        Self::new(config, Arc::new(InMemoryDirectoryStore::new()), time_source)
    }

    /// Get the current timestamp from the time source.
    pub(crate) fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    pub(crate) fn planner(&self) -> PartitionPlanner<'_> {
        PartitionPlanner::new(&self.config)
    }

    /// Active configuration.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Persist a change, then install it. Nothing changes if the write fails.
    pub(crate) fn commit(
        &self,
        table: &mut AssignmentTable,
        change: TableChange,
    ) -> Result<(), DirectoryError> {
        self.store.persist_assignments(&change)?;
        table.apply(change);
        Ok(())
    }

    // =========================================================================
    // PARTITION MAINTENANCE
    // =========================================================================

    /// Delegate every uncovered root. Returns the number of new assignments.
    pub fn bootstrap(&self) -> Result<usize, DirectoryError> {
        let mut table = self.table.write();
        let backends = self.registry.snapshot();
        let change = self.planner().plan_bootstrap(&table, &backends, self.now())?;
        if change.is_empty() {
            return Ok(0);
        }
        let count = change.activated.len();
        self.commit(&mut table, change)?;
        info!("[tl-dir] Bootstrapped {} root trixels", count);
        Ok(count)
    }

    /// Verify the partition invariants.
    pub fn check_partition(&self) -> Result<(), DirectoryError> {
        self.table.read().check_partition()
    }

    /// Active subtree roots and their owners.
    pub fn assignment_snapshot(&self) -> BTreeMap<TrixelId, BackendId> {
        self.table.read().snapshot()
    }

    /// Superseded assignments still held in memory, oldest first.
    pub fn assignment_history(&self) -> Vec<Assignment> {
        self.table.read().history().copied().collect()
    }

    /// Delegate `subtree_root` to a registered backend.
    pub fn insert_assignment(
        &self,
        subtree_root: TrixelId,
        owner: BackendId,
    ) -> Result<Assignment, DirectoryError> {
        self.registry.get(owner)?;
        let mut table = self.table.write();
        let change = table.plan_insert(subtree_root, owner, self.now())?;
        let activated = change.activated[0];
        self.commit(&mut table, change)?;
        info!("[tl-dir] Delegated {} to {}", subtree_root, owner);
        Ok(activated)
    }

    /// Split an active subtree; children missing from `owners` keep its owner.
    pub fn split_assignment(
        &self,
        subtree_root: TrixelId,
        owners: &BTreeMap<TrixelId, BackendId>,
    ) -> Result<Vec<Assignment>, DirectoryError> {
        for owner in owners.values() {
            self.registry.get(*owner)?;
        }
        let mut table = self.table.write();
        let change = table.plan_split(subtree_root, owners, self.now())?;
        let children = change.activated.clone();
        self.commit(&mut table, change)?;
        info!("[tl-dir] Split {} into {} children", subtree_root, children.len());
        Ok(children)
    }

    /// Collapse 4 active sibling leaves into `parent`.
    pub fn merge_assignment(
        &self,
        parent: TrixelId,
        owner: BackendId,
    ) -> Result<Assignment, DirectoryError> {
        self.registry.get(owner)?;
        let mut table = self.table.write();
        let change = table.plan_merge(parent, owner, self.now())?;
        let activated = change.activated[0];
        self.commit(&mut table, change)?;
        info!("[tl-dir] Merged children of {} into {}", parent, owner);
        Ok(activated)
    }

    /// Split `subtree_root` away from its owner using the growth rotation.
    pub fn grow(&self, subtree_root: TrixelId) -> Result<Vec<Assignment>, DirectoryError> {
        let mut table = self.table.write();
        let current = table
            .get(subtree_root)
            .ok_or_else(|| table.inactive_error(subtree_root))?;
        let owner = self.registry.get(current.owner)?;
        let backends = self.registry.snapshot();
        let change = self
            .planner()
            .plan_growth(&table, subtree_root, &owner, &backends, self.now())?;
        let children = change.activated.clone();
        self.commit(&mut table, change)?;
        info!(
            "[tl-dir] Grew {} away from {} (load {}/{})",
            subtree_root, owner.id, owner.current_load, owner.capacity_hint
        );
        Ok(children)
    }

    /// Move every subtree of `leaving` elsewhere, one atomic insert per
    /// subtree. Returns the number of moved subtrees.
    ///
    /// On `NoEligibleBackend` nothing has moved. A later failure keeps the
    /// moves already committed.
    pub(crate) fn reassign_backend(&self, leaving: BackendId) -> Result<usize, DirectoryError> {
        let mut table = self.table.write();
        let backends = self.registry.snapshot();
        let moves = self.planner().plan_reassignment(&table, leaving, &backends)?;
        let now = self.now();
        for m in &moves {
            let change = table.plan_insert(m.subtree_root, m.to, now)?;
            self.commit(&mut table, change)?;
            info!("[tl-dir] Moved {} from {} to {}", m.subtree_root, m.from, m.to);
        }
        Ok(moves.len())
    }

    /// Drop a backend that no longer owns anything.
    ///
    /// Returns `false` if it still owns territory.
    pub(crate) fn remove_backend_record(&self, id: BackendId) -> Result<bool, DirectoryError> {
        let table = self.table.read();
        if !table.owned_by(id).is_empty() {
            warn!("[tl-dir] {} still owns territory, keeping it registered", id);
            return Ok(false);
        }
        self.store.remove_backend(id)?;
        self.registry.remove(id);
        info!("[tl-dir] Removed backend {}", id);
        Ok(true)
    }

    /// Hand over a backend's territory, then remove it.
    pub(crate) fn evict(&self, id: BackendId) -> Result<bool, DirectoryError> {
        self.reassign_backend(id)?;
        self.remove_backend_record(id)
    }
}
