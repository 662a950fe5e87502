//! Even N-way split trees built from 2- and 3-way splitters.

use crate::error::BalanceError;
use crate::graph::{ConveyorGraph, NodeId, Rate};
use log::debug;

/// A pending split: divide `node` into `into` equal shares, wiring the
/// `backlog` nodes in as some of those shares.
struct Frame {
    node: NodeId,
    into: u64,
    backlog: Vec<NodeId>,
}

/// Splits `root`'s holding into exactly `out_amount` equal leaves and returns
/// them in construction order.
///
/// Counts with no factor up to `max_split` are inflated by one: the node is
/// pushed onto the backlog and loops back in as one branch of the larger split.
/// Runs on an explicit frame stack, so large counts cannot exhaust the call stack.
pub fn even_split(
    graph: &mut ConveyorGraph,
    root: NodeId,
    out_amount: u64,
    max_split: usize,
) -> Result<Vec<NodeId>, BalanceError> {
    if out_amount < 2 {
        return Err(BalanceError::InvalidSplitCount(out_amount));
    }
    let max_split = max_split as u64;
    let multiplier = graph.holding(root) / Rate::from_integer(out_amount as i64);
    let mut leaves = Vec::with_capacity(out_amount as usize);
    let mut stack = vec![Frame { node: root, into: out_amount, backlog: Vec::new() }];

    while let Some(Frame { node, into, mut backlog }) = stack.pop() {
        // 1. Small enough for one splitter
        if into <= max_split {
            let fresh = into.saturating_sub(backlog.len() as u64);
            for _ in 0..fresh {
                let leaf = graph.add_empty();
                let rate = graph.split_into(node, into);
                graph.link(node, leaf, Some(rate));
                leaves.push(leaf);
            }
            for looped in backlog {
                let rate = graph.split_into(node, into);
                graph.link(node, looped, Some(rate));
            }
            continue;
        }

        // 2. Factor out a splitter and hand each branch its slice of the backlog
        if let Some(s) = (2..=max_split).find(|s| into % s == 0) {
            let mut branches = Vec::with_capacity(s as usize);
            for _ in 0..s {
                let branch = graph.add_empty();
                let take = backlog.len().min((into / s) as usize);
                let slice: Vec<NodeId> = backlog.drain(..take).collect();
                let rate = graph.split_into(node, s);
                graph.link(node, branch, Some(rate));
                branches.push(Frame { node: branch, into: into / s, backlog: slice });
            }
            // First branch is finished first, keeping leaf order depth-first.
            stack.extend(branches.into_iter().rev());
            continue;
        }

        // 3. No usable factor: build one extra share now and loop it back later
        backlog.push(node);
        let next = graph.add_empty();
        let rate = graph.holding(node) + multiplier;
        graph.link(node, next, Some(rate));
        stack.push(Frame { node: next, into: into + 1, backlog });
    }

    debug!("even split of {} into {} leaves", root, leaves.len());
    Ok(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;
    use rstest::rstest;

    #[test]
    fn test_split_eight_ways() {
        let mut g = ConveyorGraph::new();
        let root = g.add_node(Rate::from_integer(8));
        let leaves = even_split(&mut g, root, 8, 3).unwrap();

        assert_eq!(leaves.len(), 8);
        for leaf in &leaves {
            assert_eq!(g.holding(*leaf), Rate::from_integer(1));
        }
        assert!(g.holding(root).is_zero());
    }

    #[rstest]
    #[case(1)]
    #[case(0)]
    fn test_split_count_below_two(#[case] n: u64) {
        let mut g = ConveyorGraph::new();
        let root = g.add_node(Rate::from_integer(4));
        assert_eq!(even_split(&mut g, root, n, 3), Err(BalanceError::InvalidSplitCount(n)));
        assert_eq!(g.node_count(), 1);
    }

    #[rstest]
    fn test_split_is_complete(
        #[values(2, 3, 4, 5, 7, 11, 13, 25, 35, 49, 97, 128)] n: u64,
        #[values(2, 3)] max_split: usize,
    ) {
        let mut g = ConveyorGraph::new();
        let total = Rate::new(7, 2);
        let root = g.add_node(total);
        let leaves = even_split(&mut g, root, n, max_split).unwrap();

        assert_eq!(leaves.len() as u64, n);
        let share = total / Rate::from_integer(n as i64);
        let mut sum = Rate::zero();
        for leaf in &leaves {
            assert_eq!(g.holding(*leaf), share);
            assert!(g.out_partners(*leaf).is_empty());
            sum += g.holding(*leaf);
        }
        assert_eq!(sum, total);

        // Every interior node, looped-back ones included, forwards all it gets.
        for id in g.node_ids().filter(|id| !leaves.contains(id)) {
            assert!(g.holding(id).is_zero(), "node {} holds {}", id, g.holding(id));
            assert!(g.out_partners(id).len() <= max_split);
            assert!(g.in_partners(id).len() <= 2);
        }
    }
}
