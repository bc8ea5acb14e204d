//! # TL Directory
//!
//! Partition-assignment and lookup core of the Trixel Lookup Service.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Delegate regions of the HTM sphere subdivision ("trixels") to a pool of
//! Trixel Management Servers (TMS) and answer "who owns trixel X":
//! - Subtree delegations that never overlap and always cover the sphere
//! - O(depth) lookups, independent of the number of backends or trixels
//! - Growth by splitting subtrees of overloaded owners
//! - Eviction of silent backends after a grace period
//!
//! ## Module Structure
//!
//! ```text
//! tl-directory/
//! ├── domain/          # TrixelId, Assignment, Backend, errors, invariants
//! ├── algorithms/      # Assignment table, backend selection, planner
//! ├── ports/           # API trait + store/time traits
//! ├── adapters/        # In-memory and JSON file stores, system clock
//! └── service/         # Registry, resolver, maintenance, API impl
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::{InMemoryDirectoryStore, JsonFileDirectoryStore, SystemTimeSource};
pub use algorithms::{AssignmentTable, MergePlan, Move, PartitionPlanner};
pub use domain::{
    invariant_full_coverage, invariant_non_overlapping, invariant_partition, Assignment,
    AssignmentState, Backend, BackendId, BackendStatus, DirectoryConfig, DirectoryError,
    ErrorKind, Generation, MeasurementType, Page, ReferenceEntry, ReferenceId, ReferenceScope,
    SensorCount, ServiceKind, StoreError, TableChange, Timestamp, TransportSecurity, TrixelId,
    MAX_LEVEL, ROOTS,
};
pub use ports::{DirectoryStore, GrowthOutcome, LookupResponse, TimeSource, TrixelDirectoryApi};
pub use service::{MaintenanceReport, TrixelDirectoryService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
