//! # Algorithms Module
//!
//! Assignment table, backend selection and partition planning.

pub mod assignment_table;
pub mod planner;
pub mod selection;

pub use assignment_table::AssignmentTable;
pub use planner::{MergePlan, Move, PartitionPlanner};
pub use selection::{is_eligible, least_loaded, rank_eligible};
