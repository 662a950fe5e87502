//! Defines the error types for link manipulation.
use super::storage::{NodeId, Rate};
use thiserror::Error;

/// Raised by `unlink` when the requested link cannot be resolved.
///
/// Inside the synthesis and rewrite passes these signal a logic defect; they are
/// always propagated, never used for control flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("nodes {src} and {dst} are not linked")]
    NotLinked { src: NodeId, dst: NodeId },
    #[error("nodes {src} and {dst} are not linked with a load of {rate}")]
    RateNotLinked { src: NodeId, dst: NodeId, rate: Rate },
    #[error("more than one rate links {src} to {dst}, cannot pick a default")]
    AmbiguousRate { src: NodeId, dst: NodeId },
}
