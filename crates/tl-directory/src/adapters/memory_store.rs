//! In-memory directory store for tests and ephemeral deployments.

use parking_lot::RwLock;

use super::snapshot::{DirectorySnapshot, DEFAULT_RETENTION};
use crate::domain::{Assignment, Backend, BackendId, StoreError, TableChange};
use crate::ports::DirectoryStore;

/// Directory store that keeps everything in memory.
#[derive(Debug)]
pub struct InMemoryDirectoryStore {
    state: RwLock<DirectorySnapshot>,
    retention: usize,
}

impl InMemoryDirectoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// Create an empty store keeping `retention` superseded records.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            state: RwLock::new(DirectorySnapshot::default()),
            retention,
        }
    }

    /// Copy of the stored state.
    pub fn snapshot(&self) -> DirectorySnapshot {
        self.state.read().clone()
    }
}

impl Default for InMemoryDirectoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryStore for InMemoryDirectoryStore {
    fn load_all_assignments(&self) -> Result<Vec<Assignment>, StoreError> {
        Ok(self.state.read().assignments.clone())
    }

    fn load_all_backends(&self) -> Result<Vec<Backend>, StoreError> {
        Ok(self.state.read().backends.clone())
    }

    fn persist_assignments(&self, change: &TableChange) -> Result<(), StoreError> {
        self.state.write().record_change(change, self.retention);
        Ok(())
    }

    fn persist_backend(&self, backend: &Backend) -> Result<(), StoreError> {
        self.state.write().upsert_backend(backend);
        Ok(())
    }

    fn remove_backend(&self, id: BackendId) -> Result<(), StoreError> {
        self.state.write().remove_backend(id);
        Ok(())
    }
}
