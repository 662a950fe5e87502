//! Belt peeling plus ratio splitting: the full synthesis for several targets.

use super::merge::{even_merge, fold};
use super::split::even_split;
use crate::error::BalanceError;
use crate::graph::{ConveyorGraph, NodeId, Rate};
use crate::solver::Removals;
use log::debug;
use num_traits::Zero;

/// Builds the network that realizes every target from `root`.
///
/// For each target, whole belts listed in `removals` are peeled off a chain of
/// roots; the chain advances every `max_split - 1` peels so no root exceeds the
/// fan-out cap, and a fresh peel output starts every `max_merge - 1` peels.
/// What is left on the last root is split by `end_ratio` and regrouped per target.
///
/// Returns, per target, the node that ends up carrying that target's amount.
pub fn smart_split(
    graph: &mut ConveyorGraph,
    root: NodeId,
    removals: &[Removals],
    end_ratio: &[u64],
    max_split: usize,
    max_merge: usize,
) -> Result<Vec<NodeId>, BalanceError> {
    if removals.len() != end_ratio.len() {
        return Err(BalanceError::InvariantViolation(format!(
            "{} removal plans for {} ratio entries",
            removals.len(),
            end_ratio.len()
        )));
    }

    // --- 1. Peel whole belts ---
    let mut current = root;
    let mut contributions: Vec<Option<NodeId>> = Vec::with_capacity(removals.len());
    for removal in removals {
        let mut peeled: Vec<NodeId> = Vec::new();
        let mut next_out = None;
        for (i, &belt) in removal.iter().enumerate() {
            let out = match next_out {
                Some(out) if i % (max_merge - 1) != 0 => out,
                _ => {
                    let out = graph.add_empty();
                    peeled.push(out);
                    out
                }
            };
            next_out = Some(out);
            graph.link(current, out, Some(Rate::from_integer(belt as i64)));

            if i % (max_split - 1) == 0 || i == removal.len() - 1 {
                let remaining = graph.holding(current);
                if !remaining.is_zero() {
                    let next_root = graph.add_empty();
                    graph.link(current, next_root, Some(remaining));
                    current = next_root;
                }
            }
        }

        contributions.push(match peeled.len() {
            0 => None,
            1 => Some(peeled[0]),
            _ => Some(fold(graph, &peeled, max_merge)),
        });
    }

    // --- 2. Split the remainder by ratio ---
    let total: u64 = end_ratio.iter().sum();
    let groups: Vec<Option<NodeId>> = match total {
        0 => vec![None; end_ratio.len()],
        // A single share is the remainder itself.
        1 => end_ratio.iter().map(|&r| (r == 1).then_some(current)).collect(),
        _ => {
            let leaves = even_split(graph, current, total, max_split)?;
            even_merge(graph, &leaves, end_ratio, max_merge, true)?
        }
    };
    debug!("smart split: {} peel outputs, remainder ratio {:?}", contributions.iter().flatten().count(), end_ratio);

    // --- 3. Cross-wire peeled belts with their ratio group ---
    contributions
        .into_iter()
        .zip(groups)
        .enumerate()
        .map(|(target, pair)| match pair {
            (Some(peeled), Some(group)) => {
                // The extra hop keeps the junction from reading as a pass-through
                // chain during canonicalization.
                let junction = graph.add_empty();
                graph.link(group, junction, None);
                graph.link(peeled, junction, None);
                Ok(junction)
            }
            (Some(only), None) | (None, Some(only)) => Ok(only),
            (None, None) => Err(BalanceError::InvariantViolation(format!("target {} received no flow", target))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Rate { Rate::from_integer(n) }

    fn plan(removals: &[&[u64]]) -> Vec<Removals> {
        removals.iter().map(|r| Removals::from_slice(r)).collect()
    }

    fn build(total: i64, removals: &[&[u64]], ratio: &[u64]) -> (ConveyorGraph, NodeId, Vec<NodeId>) {
        let mut g = ConveyorGraph::new();
        let source = g.add_node(int(total));
        let root = g.add_empty();
        g.link(source, root, None);
        let ends = smart_split(&mut g, root, &plan(removals), ratio, 3, 3).unwrap();
        (g, source, ends)
    }

    #[test]
    fn test_peel_and_remainder_without_split() {
        let (g, _, ends) = build(130, &[&[60], &[]], &[0, 1]);
        assert_eq!(g.holding(ends[0]), int(60));
        assert_eq!(g.holding(ends[1]), int(70));
    }

    #[test]
    fn test_peels_merge_and_cross_wire() {
        // 200 = 3 x 60 + 20, 40 stays whole: remainder 60 split as 1:2.
        let (g, _, ends) = build(240, &[&[60, 60, 60], &[]], &[1, 2]);
        assert_eq!(g.holding(ends[0]), int(200));
        assert_eq!(g.holding(ends[1]), int(40));
        assert_eq!(g.in_partners(ends[0]).len(), 2, "junction joins belts and ratio group");

        for id in g.node_ids() {
            assert!(g.out_partners(id).len() <= 3, "fan-out at {}", id);
            assert!(g.in_partners(id).len() <= 3, "fan-in at {}", id);
        }
    }

    #[test]
    fn test_fully_absorbed_targets_leave_nothing_behind() {
        let (g, source, ends) = build(120, &[&[60], &[60]], &[0, 0]);
        assert_eq!(g.holding(ends[0]), int(60));
        assert_eq!(g.holding(ends[1]), int(60));
        // No zero-carrying leftovers
        for id in g.node_ids().filter(|id| *id != source) {
            for record in g.out_records(id) {
                assert!(!record.rate.is_zero());
            }
        }
    }

    #[test]
    fn test_long_peel_chain_respects_fan_out() {
        let removals: Vec<u64> = vec![60; 9];
        let mut g = ConveyorGraph::new();
        let root = g.add_node(int(60 * 9 + 30));
        let ends = smart_split(&mut g, root, &[Removals::from_vec(removals), Removals::new()], &[0, 1], 2, 2).unwrap();

        assert_eq!(g.holding(ends[0]), int(540));
        assert_eq!(g.holding(ends[1]), int(30));
        for id in g.node_ids() {
            assert!(g.out_partners(id).len() <= 2, "fan-out at {}", id);
            assert!(g.in_partners(id).len() <= 2, "fan-in at {}", id);
        }
    }

    #[test]
    fn test_mismatched_plans_rejected() {
        let mut g = ConveyorGraph::new();
        let root = g.add_node(int(10));
        let err = smart_split(&mut g, root, &plan(&[&[]]), &[1, 1], 3, 3).unwrap_err();
        assert!(matches!(err, BalanceError::InvariantViolation(_)));
    }
}
