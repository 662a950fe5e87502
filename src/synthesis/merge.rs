//! Folds groups of leaves back together with capped merger nodes.

use crate::error::BalanceError;
use crate::graph::{ConveyorGraph, NodeId};
use std::collections::VecDeque;

/// Merges `nodes` into a single fresh node, at most `max_merge` inputs per merger.
///
/// Each merger takes inputs from the front of the queue and, while anything is
/// left over, rejoins the back of the queue as an input itself.
pub fn fold(graph: &mut ConveyorGraph, nodes: &[NodeId], max_merge: usize) -> NodeId {
    let mut remaining: VecDeque<NodeId> = nodes.iter().copied().collect();
    loop {
        let to_node = graph.add_empty();
        for _ in 0..max_merge {
            match remaining.pop_front() {
                Some(node) => {
                    graph.link(node, to_node, None);
                }
                None => break,
            }
        }
        if remaining.is_empty() {
            return to_node;
        }
        remaining.push_back(to_node);
    }
}

/// Partitions `leaves` into contiguous groups of `group_sizes` (sorted ascending
/// unless `respect_order`) and folds each group into one node.
///
/// Empty groups yield `None`.
pub fn even_merge(
    graph: &mut ConveyorGraph,
    leaves: &[NodeId],
    group_sizes: &[u64],
    max_merge: usize,
    respect_order: bool,
) -> Result<Vec<Option<NodeId>>, BalanceError> {
    let mut sizes = group_sizes.to_vec();
    if !respect_order {
        sizes.sort_unstable();
    }
    let total: u64 = sizes.iter().sum();
    if total as usize != leaves.len() {
        return Err(BalanceError::InvariantViolation(format!(
            "{} leaves cannot fill groups totalling {}",
            leaves.len(),
            total
        )));
    }

    let mut ends = Vec::with_capacity(sizes.len());
    let mut start = 0usize;
    for size in sizes {
        let end = start + size as usize;
        let group = &leaves[start..end];
        ends.push((!group.is_empty()).then(|| fold(graph, group, max_merge)));
        start = end;
    }
    Ok(ends)
}
