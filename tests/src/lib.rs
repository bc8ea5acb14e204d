//! # Trixel Lookup Test Suite
//!
//! Unified test crate for the trixel directory.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── directory_benchmarks.rs  # Lookup and growth timings
//! └── src/
//!     └── integration/
//!         ├── scenarios.rs         # End-to-end directory scenarios
//!         ├── invariants.rs        # Randomized partition checks
//!         └── concurrency.rs       # Lookups racing re-partitions
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p tl-tests
//! cargo test -p tl-tests integration::invariants::
//! cargo bench -p tl-tests
//! ```

pub mod integration;
