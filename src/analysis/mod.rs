//! Analysis modules.
//!
//! Aggregation of induction output and highlight normalization.

pub mod aggregator;
pub mod highlights;

pub use aggregator::*;
