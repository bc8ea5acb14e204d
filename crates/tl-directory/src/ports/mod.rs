//! # Ports Module
//!
//! Hexagonal architecture ports for the trixel directory.
//!
//! - Inbound (driving): [`TrixelDirectoryApi`]
//! - Outbound (driven): [`DirectoryStore`], [`TimeSource`]

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
