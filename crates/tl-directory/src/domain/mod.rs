//! # Domain Module
//!
//! Core domain types for the trixel directory.

pub mod config;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod spherical;
pub mod trixel;
pub mod value_objects;

pub use config::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use trixel::*;
pub use value_objects::*;
