//! Canonicalization of synthesized networks.
pub mod redundancy;
pub mod simplify;

pub use redundancy::cut_excess;
pub use simplify::{simplify, Partition, MAX_PASSES};
