//! simplify.rs
//! Rewrites a synthesized network into canonical form.
//!
//! Every non-terminal node shape is rewritten into terminal ones: pass-throughs
//! disappear, merge-splitters are pulled apart, and sources/sinks that also
//! split/merge get a dedicated endpoint. Redundancy cuts and rewrite passes
//! alternate until neither changes the graph.

use super::redundancy::cut_excess;
use crate::error::BalanceError;
use crate::graph::{carried, ConveyorGraph, NodeId, NodeKind, Rate};
use log::{debug, trace, warn};
use num_traits::Zero;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Upper bound on cut + rewrite passes before giving up.
pub const MAX_PASSES: usize = 4096;

/// The key node sets of a canonical network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub start: BTreeSet<NodeId>,
    pub end: BTreeSet<NodeId>,
    pub islands: BTreeSet<NodeId>,
    pub removed: BTreeSet<NodeId>,
}

struct Canonicalizer<'g> {
    graph: &'g mut ConveyorGraph,
    max_split: usize,
    max_merge: usize,
    key_nodes: Partition,
}

/// Canonicalizes everything reachable from `start_nodes` in place.
///
/// Returns the resulting start/end/island/removed partition. Fails with
/// `DidNotConverge` if the passes keep changing the graph past [`MAX_PASSES`].
pub fn simplify(
    graph: &mut ConveyorGraph,
    start_nodes: &[NodeId],
    max_split: usize,
    max_merge: usize,
) -> Result<Partition, BalanceError> {
    let mut canon = Canonicalizer {
        graph,
        max_split: max_split.max(2),
        max_merge: max_merge.max(2),
        key_nodes: Partition { start: start_nodes.iter().copied().collect(), ..Partition::default() },
    };
    canon.run()?;
    Ok(canon.key_nodes)
}

impl Canonicalizer<'_> {
    fn run(&mut self) -> Result<(), BalanceError> {
        let mut passes = 0usize;
        loop {
            // 1. Collapse funnels below the first start node
            let cut = match self.key_nodes.start.first().copied() {
                Some(anchor) => cut_excess(self.graph, anchor, &mut self.key_nodes.removed)?,
                None => false,
            };
            passes += 1;

            // 2. Rewrite until stable
            let mut rewrote = false;
            loop {
                if passes >= MAX_PASSES {
                    return Err(BalanceError::DidNotConverge { passes });
                }
                passes += 1;
                if !self.rewrite_pass()? {
                    break;
                }
                rewrote = true;
            }
            debug!("canonicalization pass {}: cut={} rewrote={}", passes, cut, rewrote);

            if !cut && !rewrote {
                return Ok(());
            }
        }
    }

    /// One depth-first walk from the start nodes. Returns whether any node was rewritten.
    fn rewrite_pass(&mut self) -> Result<bool, BalanceError> {
        let mut changed = false;
        let mut seen = HashSet::new();
        let starts: Vec<NodeId> = self.key_nodes.start.iter().copied().collect();

        for start in starts {
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                if !seen.insert(node) {
                    continue;
                }
                changed |= self.rewrite(node)?;
                stack.extend(self.graph.out_partners(node).iter().rev().copied());
            }
        }
        Ok(changed)
    }

    fn rewrite(&mut self, node: NodeId) -> Result<bool, BalanceError> {
        if self.graph.in_partners(node).len() > self.max_merge {
            self.fold_inputs(node)?;
            return Ok(true);
        }
        if self.graph.out_partners(node).len() > self.max_split {
            self.fold_outputs(node)?;
            return Ok(true);
        }

        let kind = self.graph.classify(node);
        trace!("{} is a {}", node, kind);
        match kind {
            NodeKind::Island => {
                self.key_nodes.start.remove(&node);
                if self.graph.holding(node).is_zero() {
                    self.key_nodes.removed.insert(node);
                } else {
                    self.key_nodes.islands.insert(node);
                }
            }
            NodeKind::Source => {
                self.key_nodes.start.insert(node);
            }
            NodeKind::Destination => {
                self.key_nodes.end.insert(node);
            }
            NodeKind::SourceSplitter => {
                self.detach_source(node);
                return Ok(true);
            }
            NodeKind::MergerDestination => {
                self.detach_destination(node);
                return Ok(true);
            }
            NodeKind::PassThrough => return self.bypass(node),
            NodeKind::MergeSplitter => {
                self.separate(node)?;
                return Ok(true);
            }
            NodeKind::Splitter | NodeKind::UnevenSplitter | NodeKind::Merger => {}
        }
        Ok(false)
    }

    /// Gives a splitting source its own upstream source node.
    fn detach_source(&mut self, node: NodeId) {
        let output = self.graph.sum_outs(node);
        let feeder = self.graph.add_node(output);
        self.graph.link(feeder, node, Some(output));
        self.graph.adjust_holding(node, -output);

        self.key_nodes.start.remove(&node);
        self.key_nodes.start.insert(feeder);
    }

    /// Gives a merging destination its own downstream sink.
    fn detach_destination(&mut self, node: NodeId) {
        let sink = self.graph.add_empty();
        self.graph.link(node, sink, None);

        self.key_nodes.end.remove(&node);
        self.key_nodes.end.insert(sink);
    }

    /// Links a pass-through's predecessor straight to its successor.
    fn bypass(&mut self, node: NodeId) -> Result<bool, BalanceError> {
        let (Some(&src), Some(&dst)) = (self.graph.in_partners(node).first(), self.graph.out_partners(node).first())
        else {
            return Ok(false);
        };
        // A self-loop has nothing to bypass
        if src == node || dst == node {
            return Ok(false);
        }

        let relink = self.graph.sum_outs(node);
        self.graph.sever(node, dst)?;
        self.graph.sever(src, node)?;
        self.graph.link(src, dst, Some(relink));

        let residual = self.graph.holding(node);
        if !residual.is_zero() {
            warn!("pass-through {} removed with {} left on it", node, residual);
        }
        self.key_nodes.start.remove(&node);
        self.key_nodes.end.remove(&node);
        self.key_nodes.removed.insert(node);
        Ok(true)
    }

    /// Splits a merge-splitter into a merger feeding a fresh splitter.
    fn separate(&mut self, node: NodeId) -> Result<(), BalanceError> {
        let carrying = self.graph.sum_outs(node);
        let records: Vec<_> = self.graph.out_records(node).collect();

        let splitter = self.graph.add_empty();
        self.graph.link(node, splitter, Some(carrying));
        for record in records {
            self.move_units(node, record.peer, record.rate, record.count, splitter, record.peer)?;
        }
        Ok(())
    }

    /// Routes the first `max_merge` inputs of `node` through a fresh merger.
    fn fold_inputs(&mut self, node: NodeId) -> Result<(), BalanceError> {
        let inputs: Vec<NodeId> = self.graph.in_partners(node).iter().take(self.max_merge).copied().collect();
        let merger = self.graph.add_empty();
        for src in inputs {
            for (rate, count) in self.graph.rates(src, node).cloned().unwrap_or_default() {
                self.move_units(src, node, rate, count, src, merger)?;
            }
        }
        let total = self.graph.holding(merger);
        self.graph.link(merger, node, Some(total));
        trace!("folded inputs of {} through {}", node, merger);
        Ok(())
    }

    /// Routes the first `max_split` outputs of `node` through a fresh splitter.
    fn fold_outputs(&mut self, node: NodeId) -> Result<(), BalanceError> {
        let outputs: Vec<NodeId> = self.graph.out_partners(node).iter().take(self.max_split).copied().collect();
        let total: Rate = outputs.iter().filter_map(|dst| self.graph.rates(node, *dst)).map(carried).sum();

        let splitter = self.graph.add_empty();
        self.graph.link(node, splitter, Some(total));
        for dst in outputs {
            for (rate, count) in self.graph.rates(node, dst).cloned().unwrap_or_default() {
                self.move_units(node, dst, rate, count, splitter, dst)?;
            }
        }
        trace!("folded outputs of {} through {}", node, splitter);
        Ok(())
    }

    /// Moves `count` link units of `rate` from `from_src -> from_dst` to `to_src -> to_dst`.
    fn move_units(
        &mut self,
        from_src: NodeId,
        from_dst: NodeId,
        rate: Rate,
        count: u32,
        to_src: NodeId,
        to_dst: NodeId,
    ) -> Result<(), BalanceError> {
        for _ in 0..count {
            self.graph.unlink(from_src, from_dst, Some(rate))?;
            self.graph.link(to_src, to_dst, Some(rate));
        }
        Ok(())
    }
}
