//! Crate-wide error type.
use crate::graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    /// Rejected caller input. Always raised before any node is created.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Cannot split evenly into {0} branches, need at least 2")]
    InvalidSplitCount(u64),
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Canonicalization did not settle after {passes} passes")]
    DidNotConverge { passes: usize },
    #[error(transparent)]
    Graph(#[from] GraphError),
}
