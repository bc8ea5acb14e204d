//! # TL Runtime
//!
//! Process host for the trixel directory.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (TOML file, then `TLS_*` environment overrides)
//! 2. Install the tracing subscriber
//! 3. Open the directory file and restore assignments and backends
//! 4. Start the periodic maintenance pass
//! 5. Wait for Ctrl+C, then stop the maintenance task
//!
//! No transport is bundled; embed [`DirectoryRuntime::service`] behind
//! whatever RPC layer fronts the directory.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod maintenance;
pub mod runtime;

pub use config::{ConfigError, RuntimeConfig};
pub use maintenance::run_maintenance_loop;
pub use runtime::DirectoryRuntime;
