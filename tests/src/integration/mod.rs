//! Cross-module tests of the trixel directory.

pub mod concurrency;
pub mod invariants;
pub mod scenarios;
