//! Defines the core data structures for the conveyor network.
pub mod edge;
pub mod error;
pub mod node;
pub mod storage;
pub mod traverse;

// Re-export key types for convenient access
pub use edge::{carried, LinkRates, LinkRecord};
pub use error::GraphError;
pub use node::{ConveyorNode, NodeKind};
pub use storage::{ConveyorGraph, NodeId, Rate};
