//! planner.rs
//! Boundary entry points: validate a request, synthesize, canonicalize.

use crate::analysis::{simplify, Partition};
use crate::config::BalancerConfig;
use crate::display::{export_records, GraphExport};
use crate::error::BalanceError;
use crate::graph::traverse::downstream_from;
use crate::graph::{ConveyorGraph, NodeId, Rate};
use crate::solver::{search, SearchOutcome};
use crate::synthesis::{even_split, smart_split};
use log::debug;
use num_traits::{CheckedAdd, Zero};
use rayon::prelude::*;
use std::collections::HashSet;

/// A canonical network together with the search that shaped it.
#[derive(Debug, Clone)]
pub struct Plan {
    pub graph: ConveyorGraph,
    pub partition: Partition,
    /// `None` for the single-target shorthand, which skips the belt search.
    pub search: Option<SearchOutcome>,
}

impl Plan {
    pub fn start_nodes(&self) -> Vec<NodeId> { self.partition.start.iter().copied().collect() }

    /// Amounts arriving at each destination, in node order.
    pub fn delivered(&self) -> Vec<Rate> {
        self.partition.end.iter().map(|id| self.graph.holding(*id)).collect()
    }

    /// Every node still wired into the network, start nodes included.
    pub fn reachable(&self) -> HashSet<NodeId> { downstream_from(&self.graph, &self.start_nodes()) }

    pub fn export(&self) -> GraphExport { export_records(&self.graph, &self.start_nodes()) }
}

/// Checks the targets and returns their total.
fn validate_targets(targets: &[Rate]) -> Result<Rate, BalanceError> {
    if targets.is_empty() {
        return Err(BalanceError::InvalidInput("at least one target amount is required".into()));
    }
    if let Some(bad) = targets.iter().find(|t| **t <= Rate::zero()) {
        return Err(BalanceError::InvalidInput(format!("target amounts must be greater than 0, got {}", bad)));
    }
    targets
        .iter()
        .try_fold(Rate::zero(), |acc, t| acc.checked_add(t))
        .ok_or_else(|| BalanceError::InvalidInput("target denominators too large".into()))
}

/// Plans a network delivering every amount in `targets` from one source.
///
/// A single target takes the even-split shorthand and must be an integer.
///
/// The belt search tries every ordered sequence of whole-belt peels, so its
/// cost grows exponentially with how many belts fit into each target. Keep
/// targets within a few multiples of the largest belt; a pair like
/// `[1500, 1320]` against the default belts does not finish in practical time.
pub fn plan(targets: &[Rate], config: &BalancerConfig) -> Result<Plan, BalanceError> {
    // 1. Reject bad input before any node exists
    config.validate()?;
    let total = validate_targets(targets)?;
    if let [single] = targets {
        if !single.is_integer() {
            return Err(BalanceError::InvalidInput(format!("a single target must be a whole number, got {}", single)));
        }
        return plan_even(single.to_integer() as u64, config);
    }

    // 2. Search for whole-belt peels
    let belts = config.belt_capacities()?;
    let outcome = search(targets, &belts)?;
    debug!("planning {:?}: score {} ratio {:?}", targets, outcome.score, outcome.ratio);

    // 3. Synthesize below a dedicated source
    let mut graph = ConveyorGraph::new();
    let source = graph.add_node(total);
    let root = graph.add_empty();
    graph.link(source, root, None);
    smart_split(&mut graph, root, &outcome.removals, &outcome.ratio, config.max_split, config.max_merge)?;

    // 4. Canonicalize
    let partition = simplify(&mut graph, &[source], config.max_split, config.max_merge)?;
    Ok(Plan { graph, partition, search: Some(outcome) })
}

/// Splits `amount` into that many unit destinations without a belt search.
pub fn plan_even(amount: u64, config: &BalancerConfig) -> Result<Plan, BalanceError> {
    config.validate()?;
    let amount_rate = i64::try_from(amount)
        .map(Rate::from_integer)
        .map_err(|_| BalanceError::InvalidInput(format!("amount {} is too large", amount)))?;

    let mut graph = ConveyorGraph::new();
    let source = graph.add_node(amount_rate);
    match amount {
        0 => {}
        1 => {
            let leaf = graph.add_empty();
            graph.link(source, leaf, None);
        }
        n => {
            let root = graph.add_empty();
            graph.link(source, root, None);
            even_split(&mut graph, root, n, config.max_split)?;
        }
    }

    let partition = simplify(&mut graph, &[source], config.max_split, config.max_merge)?;
    Ok(Plan { graph, partition, search: None })
}

/// Plans independent requests in parallel. Each request gets its own graph.
pub fn plan_batch(requests: &[Vec<Rate>], config: &BalancerConfig) -> Vec<Result<Plan, BalanceError>> {
    requests.par_iter().map(|targets| plan(targets, config)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BeltTiers;
    use crate::graph::traverse::walk_order;
    use crate::graph::NodeKind;
    use rstest::rstest;

    fn int(n: i64) -> Rate { Rate::from_integer(n) }

    fn config(cap: usize) -> BalancerConfig {
        BalancerConfig { belts: BeltTiers::default(), max_split: cap, max_merge: cap }
    }

    fn link_snapshot(g: &ConveyorGraph) -> Vec<(NodeId, NodeId, Rate, u32)> {
        g.node_ids().flat_map(|id| g.out_records(id).map(move |r| (id, r.peer, r.rate, r.count))).collect()
    }

    #[test]
    fn test_even_split_of_500() {
        let _ = env_logger::builder().is_test(true).try_init();
        let plan = plan(&[int(500)], &BalancerConfig::default()).unwrap();

        assert_eq!(plan.partition.start.len(), 1);
        assert_eq!(plan.partition.end.len(), 500);
        assert!(plan.partition.islands.is_empty());
        assert!(plan.delivered().iter().all(|amount| *amount == int(1)));

        for id in walk_order(&plan.graph, &plan.start_nodes()) {
            assert_ne!(plan.graph.classify(id), NodeKind::PassThrough, "pass-through left at {}", id);
        }
        let sources = walk_order(&plan.graph, &plan.start_nodes())
            .into_iter()
            .filter(|id| plan.graph.classify(*id) == NodeKind::Source)
            .count();
        assert_eq!(sources, 1);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(9, 9)]
    fn test_small_even_plans(#[case] amount: u64, #[case] destinations: usize) {
        let plan = plan_even(amount, &BalancerConfig::default()).unwrap();
        assert_eq!(plan.partition.end.len(), destinations);
        assert!(plan.search.is_none());
    }

    #[test]
    fn test_belts_absorb_equal_targets() {
        let plan = plan(&[int(60), int(60)], &BalancerConfig::default()).unwrap();
        let outcome = plan.search.as_ref().unwrap();
        assert_eq!(outcome.ratio, vec![0, 0]);
        assert_eq!(plan.delivered(), vec![int(60), int(60)]);
    }

    #[rstest]
    fn test_canonical_plans(
        #[values(
            vec![int(60), int(60)],
            vec![int(130), int(40)],
            vec![Rate::new(1, 3), Rate::new(5, 2)],
            vec![int(7), int(11), int(13)],
            vec![int(90), int(45), int(15)],
            vec![int(1), int(1), int(1), int(1), int(1)],
            vec![int(500), int(3)]
        )]
        targets: Vec<Rate>,
        #[values(2, 3)] cap: usize,
    ) {
        let plan = plan(&targets, &config(cap)).unwrap();
        let g = &plan.graph;
        let total: Rate = targets.iter().sum();

        // Conservation: everything arrives, nothing lingers in between
        let mut delivered = plan.delivered();
        let mut expected = targets.clone();
        delivered.sort();
        expected.sort();
        assert_eq!(delivered, expected);
        assert_eq!(g.total_holding(), total);

        for id in walk_order(g, &plan.start_nodes()) {
            let kind = g.classify(id);
            assert!(kind.is_terminal(), "{} is a {}", id, kind);
            assert!(g.in_partners(id).len() <= cap, "fan-in at {}", id);
            assert!(g.out_partners(id).len() <= cap, "fan-out at {}", id);
            if !plan.partition.end.contains(&id) {
                assert!(g.holding(id).is_zero(), "{} holds {}", id, g.holding(id));
            }
        }
        assert!(plan.partition.islands.is_empty());

        let reachable = plan.reachable();
        assert!(plan.partition.end.iter().all(|id| reachable.contains(id)));
        assert!(plan.partition.removed.iter().all(|id| !reachable.contains(id)));
    }

    #[test]
    fn test_simplify_is_idempotent_on_plans() {
        let mut plan = plan(&[int(130), int(40), int(7)], &BalancerConfig::default()).unwrap();
        let before = link_snapshot(&plan.graph);

        let start_nodes = plan.start_nodes();
        let again = simplify(&mut plan.graph, &start_nodes, 3, 3).unwrap();
        assert_eq!(link_snapshot(&plan.graph), before);
        assert_eq!(again.start, plan.partition.start);
        assert_eq!(again.end, plan.partition.end);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![int(0)])]
    #[case(vec![int(5), int(-1)])]
    #[case(vec![Rate::new(5, 2)])]
    fn test_invalid_targets(#[case] targets: Vec<Rate>) {
        assert!(matches!(plan(&targets, &BalancerConfig::default()), Err(BalanceError::InvalidInput(_))));
    }

    #[test]
    fn test_oversized_denominators_rejected() {
        let targets = [Rate::new(1, 1_000_000_007), Rate::new(1, 998_244_353), Rate::new(1, 999_999_937)];
        assert_eq!(
            plan(&targets, &BalancerConfig::default()).unwrap_err(),
            BalanceError::InvalidInput("target denominators too large".into())
        );
    }

    #[test]
    fn test_invalid_config() {
        let bad = BalancerConfig { max_split: 4, ..BalancerConfig::default() };
        assert!(matches!(plan(&[int(2), int(3)], &bad), Err(BalanceError::InvalidInput(_))));
        assert!(matches!(plan_even(4, &bad.clone().with_tiers(0)), Err(BalanceError::InvalidInput(_))));
    }

    #[test]
    fn test_batch_matches_sequential() {
        let requests = vec![vec![int(60), int(60)], vec![int(3), int(5)], vec![int(0)]];
        let results = plan_batch(&requests, &BalancerConfig::default());

        assert_eq!(results.len(), 3);
        for (request, result) in requests.iter().zip(&results).take(2) {
            let single = plan(request, &BalancerConfig::default()).unwrap();
            assert_eq!(result.as_ref().unwrap().delivered(), single.delivered());
        }
        assert!(results[2].is_err());
    }
}
