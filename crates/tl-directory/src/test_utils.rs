//! Test utilities for the trixel directory.
//!
//! Controllable clock and fault-injecting store for deterministic tests.
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use tl_directory::test_utils::ManualTimeSource;
//! use tl_directory::TimeSource;
//!
//! let clock = ManualTimeSource::new(1000);
//! clock.advance(30);
//! assert_eq!(clock.now().as_secs(), 1030);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::adapters::InMemoryDirectoryStore;
use crate::domain::{Assignment, Backend, BackendId, StoreError, TableChange, Timestamp};
use crate::ports::{DirectoryStore, TimeSource};

/// A time source whose value tests move by hand.
///
/// Clones share the same clock, so a test can keep one handle and give
/// another to the service.
#[derive(Debug, Clone)]
pub struct ManualTimeSource {
    secs: Arc<AtomicU64>,
}

impl ManualTimeSource {
    /// Create a clock starting at `secs`.
    pub fn new(secs: u64) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(secs)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.secs.load(Ordering::SeqCst))
    }
}

/// In-memory store whose writes can be made to fail.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: InMemoryDirectoryStore,
    fail_assignments: AtomicBool,
    fail_backends: AtomicBool,
}

impl FailingStore {
    /// Create a store that succeeds until told otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make assignment writes fail (or succeed again).
    pub fn fail_assignment_writes(&self, fail: bool) {
        self.fail_assignments.store(fail, Ordering::SeqCst);
    }

    /// Make backend writes fail (or succeed again).
    pub fn fail_backend_writes(&self, fail: bool) {
        self.fail_backends.store(fail, Ordering::SeqCst);
    }

    /// The wrapped store.
    pub fn inner(&self) -> &InMemoryDirectoryStore {
        &self.inner
    }

    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

impl DirectoryStore for FailingStore {
    fn load_all_assignments(&self) -> Result<Vec<Assignment>, StoreError> {
        self.inner.load_all_assignments()
    }

    fn load_all_backends(&self) -> Result<Vec<Backend>, StoreError> {
        self.inner.load_all_backends()
    }

    fn persist_assignments(&self, change: &TableChange) -> Result<(), StoreError> {
        Self::check(&self.fail_assignments)?;
        self.inner.persist_assignments(change)
    }

    fn persist_backend(&self, backend: &Backend) -> Result<(), StoreError> {
        Self::check(&self.fail_backends)?;
        self.inner.persist_backend(backend)
    }

    fn remove_backend(&self, id: BackendId) -> Result<(), StoreError> {
        Self::check(&self.fail_backends)?;
        self.inner.remove_backend(id)
    }
}
