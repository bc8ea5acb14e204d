//! # Trixel Directory Service
//!
//! High-level service implementing the `TrixelDirectoryApi` port.
//!
//! Wraps the assignment table and the backend registry, and runs the
//! partition planner whenever a lookup, registration or maintenance pass
//! needs the partition to change.

// Semantic submodules
mod api;
mod census;
mod core;
mod maintenance;
mod references;
mod registry;
mod resolver;

// Re-export public API
pub use census::SensorCensus;
pub use self::core::TrixelDirectoryService;
pub use maintenance::MaintenanceReport;
pub use references::ReferenceDirectory;
pub use registry::{BackendRegistry, SweepReport};
