//! Ratio reduction and the belt-aware search built on it.
pub mod ratio;
pub mod search;

pub use ratio::reduce;
pub use search::{search, Removals, SearchOutcome};
