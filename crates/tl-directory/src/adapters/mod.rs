//! # Adapters
//!
//! Store and clock implementations of the outbound ports.

pub mod json_store;
pub mod memory_store;
pub mod snapshot;
pub mod time;

pub use json_store::JsonFileDirectoryStore;
pub use memory_store::InMemoryDirectoryStore;
pub use snapshot::{DirectorySnapshot, DEFAULT_RETENTION};
pub use time::SystemTimeSource;
