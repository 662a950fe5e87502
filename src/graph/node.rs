//! Defines the `ConveyorNode` and its derived classification.

use super::storage::{NodeId, Rate};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single flow-carrying node.
///
/// The node only records who it is linked to; rates live in the graph's shared
/// link tables. `holding` is the amount not yet committed to an outgoing link.
#[derive(Debug, Clone, PartialEq)]
pub struct ConveyorNode {
    pub(crate) holding: Rate,
    pub(crate) ins: IndexSet<NodeId>,
    pub(crate) outs: IndexSet<NodeId>,
    /// Approximate shortest distance from a source, maintained on link/unlink.
    pub(crate) depth: u32,
}

impl ConveyorNode {
    pub fn new(holding: Rate) -> Self {
        Self { holding, ins: IndexSet::new(), outs: IndexSet::new(), depth: 0 }
    }

    pub fn holding(&self) -> Rate { self.holding }
    pub fn depth(&self) -> u32 { self.depth }
}

/// Structural role of a node, derived from its partner counts capped at 2.
///
/// Never stored; recompute it after any mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Island,
    Source,
    SourceSplitter,
    Destination,
    PassThrough,
    Splitter,
    /// A `Splitter` whose outgoing rates are not all equal.
    UnevenSplitter,
    MergerDestination,
    Merger,
    MergeSplitter,
}

impl NodeKind {
    pub fn from_degree(degree: (u8, u8), splits_evenly: bool) -> Self {
        match degree {
            (0, 0) => NodeKind::Island,
            (0, 1) => NodeKind::Source,
            (0, _) => NodeKind::SourceSplitter,
            (1, 0) => NodeKind::Destination,
            (1, 1) => NodeKind::PassThrough,
            (1, _) if splits_evenly => NodeKind::Splitter,
            (1, _) => NodeKind::UnevenSplitter,
            (_, 0) => NodeKind::MergerDestination,
            (_, 1) => NodeKind::Merger,
            _ => NodeKind::MergeSplitter,
        }
    }

    /// Kinds the canonicalizer leaves untouched.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeKind::Island
                | NodeKind::Source
                | NodeKind::Destination
                | NodeKind::Splitter
                | NodeKind::UnevenSplitter
                | NodeKind::Merger
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Island => "Island",
            NodeKind::Source => "Source",
            NodeKind::SourceSplitter => "Source Splitter",
            NodeKind::Destination => "Destination",
            NodeKind::PassThrough => "Pass Through",
            NodeKind::Splitter => "Splitter",
            NodeKind::UnevenSplitter => "Uneven Splitter",
            NodeKind::MergerDestination => "Merger Destination",
            NodeKind::Merger => "Merger",
            NodeKind::MergeSplitter => "Merge Splitter",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
