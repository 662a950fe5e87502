//! traverse.rs
//! Reachability walks over the conveyor graph. Both tolerate cycles.

use super::storage::{ConveyorGraph, NodeId};
use std::collections::{HashSet, VecDeque};

/// Identifies all nodes downstream from the given start nodes, starts included.
pub fn downstream_from(graph: &ConveyorGraph, start_nodes: &[NodeId]) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from(start_nodes.to_vec());

    while let Some(node) = queue.pop_front() {
        if visited.insert(node) {
            queue.extend(graph.out_partners(node).iter().copied());
        }
    }
    visited
}

/// Depth-first pre-order of every node reachable from `start_nodes`.
///
/// Children are visited in link insertion order, so the walk is deterministic.
pub fn walk_order(graph: &ConveyorGraph, start_nodes: &[NodeId]) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<NodeId> = start_nodes.iter().rev().copied().collect();

    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        order.push(node);
        stack.extend(graph.out_partners(node).iter().rev().copied());
    }
    order
}
