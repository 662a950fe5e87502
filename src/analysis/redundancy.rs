//! redundancy.rs
//! Collapses sub-networks that funnel into a single sink.
//!
//! Incremental construction leaves waterfalls: a node whose every downstream
//! path, after fanning out, ends at the same leaf. Such a node can feed the leaf
//! directly. Edges that loop back into the node under test are recorded during
//! the scan and severed before the collapse.

use crate::error::BalanceError;
use crate::graph::{ConveyorGraph, NodeId, Rate};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use std::collections::{BTreeSet, HashSet, VecDeque};

struct RedundancyCut<'g> {
    graph: &'g mut ConveyorGraph,
    visited: HashSet<NodeId>,
    /// leaf -> topmost nodes whose only leaf it is
    designated: IndexMap<NodeId, IndexSet<NodeId>>,
    /// Leaves whose funnel had loop-back edges severed.
    severed: HashSet<NodeId>,
}

/// Runs one redundancy cut below `anchor`. Nodes left fully detached are added
/// to `removed`. Returns whether the graph was rewired.
pub fn cut_excess(
    graph: &mut ConveyorGraph,
    anchor: NodeId,
    removed: &mut BTreeSet<NodeId>,
) -> Result<bool, BalanceError> {
    let mut cut = RedundancyCut {
        graph,
        visited: HashSet::from([anchor]),
        designated: IndexMap::new(),
        severed: HashSet::new(),
    };
    for child in cut.graph.out_partners(anchor).clone() {
        cut.designate(child)?;
    }
    cut.apply(removed)
}

impl RedundancyCut<'_> {
    fn designate(&mut self, node: NodeId) -> Result<(), BalanceError> {
        if !self.visited.insert(node) {
            return Ok(());
        }

        let (leaves, loops) = self.scan(node);
        if leaves.len() != 1 {
            for child in self.graph.out_partners(node).clone() {
                self.designate(child)?;
            }
            return Ok(());
        }

        let leaf = leaves[0];
        for src in loops {
            self.graph.sever(src, node)?;
            self.severed.insert(leaf);
        }
        self.designated.entry(leaf).or_default().insert(node);
        Ok(())
    }

    /// Leaves below `origin`, plus the nodes whose edges loop back into it.
    fn scan(&self, origin: NodeId) -> (IndexSet<NodeId>, IndexSet<NodeId>) {
        let mut leaves = IndexSet::new();
        let mut loops = IndexSet::new();
        for &child in self.graph.out_partners(origin) {
            let mut trace = HashSet::from([origin]);
            self.scan_from(child, origin, &mut trace, &mut leaves, &mut loops);
        }
        (leaves, loops)
    }

    fn scan_from(
        &self,
        curr: NodeId,
        origin: NodeId,
        trace: &mut HashSet<NodeId>,
        leaves: &mut IndexSet<NodeId>,
        loops: &mut IndexSet<NodeId>,
    ) {
        if self.graph.out_partners(curr).is_empty() {
            leaves.insert(curr);
            return;
        }
        if !trace.insert(curr) {
            return;
        }
        for &next in self.graph.out_partners(curr) {
            if next == origin {
                loops.insert(curr);
                continue;
            }
            self.scan_from(next, origin, trace, leaves, loops);
        }
        trace.remove(&curr);
    }

    fn apply(self, removed: &mut BTreeSet<NodeId>) -> Result<bool, BalanceError> {
        let RedundancyCut { graph, designated, severed, .. } = self;
        let mut changed = false;

        for (leaf, srcs) in designated {
            let interior = interior(graph, &srcs, leaf);
            if !severed.contains(&leaf) && is_collapsed(graph, srcs.iter().chain(interior.iter())) {
                continue;
            }
            changed = true;
            debug!("collapsing {} feeders and {} interior nodes into {}", srcs.len(), interior.len(), leaf);

            // 1. Detach the funnel from the leaf and from itself
            for &src in srcs.iter().chain(interior.iter()) {
                if graph.in_partners(leaf).contains(&src) {
                    graph.sever(src, leaf)?;
                }
            }
            for &node in srcs.iter().chain(interior.iter()) {
                graph.unlink_to_all(node)?;
            }

            // 2. Whatever still reaches the region now feeds the leaf directly
            for &node in srcs.iter().chain(interior.iter()) {
                let holding = graph.holding(node);
                if holding > Rate::from_integer(0) {
                    graph.link(node, leaf, Some(holding));
                }
            }

            for &node in srcs.iter().chain(interior.iter()) {
                if graph.is_detached(node) {
                    removed.insert(node);
                }
            }
        }
        Ok(changed)
    }
}

/// Nodes strictly between `srcs` and `leaf`.
fn interior(graph: &ConveyorGraph, srcs: &IndexSet<NodeId>, leaf: NodeId) -> IndexSet<NodeId> {
    let mut interior = IndexSet::new();
    let mut queue: VecDeque<NodeId> = srcs.iter().copied().collect();
    while let Some(node) = queue.pop_front() {
        for &next in graph.out_partners(node) {
            if next != leaf && !srcs.contains(&next) && interior.insert(next) {
                queue.push_back(next);
            }
        }
    }
    interior
}

/// A funnel made only of single-output, single-rate nodes is already a merge tree.
fn is_collapsed<'a>(graph: &ConveyorGraph, mut region: impl Iterator<Item = &'a NodeId>) -> bool {
    region.all(|&node| {
        let outs = graph.out_partners(node);
        outs.len() == 1 && outs.first().and_then(|&dst| graph.rates(node, dst)).map_or(false, |t| t.len() == 1)
    })
}
