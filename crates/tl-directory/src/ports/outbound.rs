//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the host application provides to the directory.

use crate::domain::{Assignment, Backend, BackendId, StoreError, TableChange, Timestamp};

/// Durable storage for assignments and backends.
///
/// # Atomicity
///
/// `persist_assignments` must store the whole change or nothing. The
/// service applies a change in memory only after it was persisted.
pub trait DirectoryStore: Send + Sync {
    /// Every stored assignment record, active and superseded.
    fn load_all_assignments(&self) -> Result<Vec<Assignment>, StoreError>;

    /// Every stored backend.
    fn load_all_backends(&self) -> Result<Vec<Backend>, StoreError>;

    /// Store one logical table mutation.
    fn persist_assignments(&self, change: &TableChange) -> Result<(), StoreError>;

    /// Insert or replace a backend record.
    fn persist_backend(&self, backend: &Backend) -> Result<(), StoreError>;

    /// Delete a backend record.
    fn remove_backend(&self, id: BackendId) -> Result<(), StoreError>;
}

/// Abstract interface for time.
///
/// Lets tests drive heartbeat expiry and eviction grace deterministically.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}
