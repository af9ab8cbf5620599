//! Derived views over the normalized snapshots and the identifier mapping.
pub mod golden;
pub mod search;
pub mod stats;
pub mod tiebreak;
