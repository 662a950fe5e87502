//! storage.rs
//! Node arena with shared link tables.
//!
//! Nodes are addressed by stable `NodeId` handles. A link table lives once per
//! `(src, dst)` pair, so the view from `src.outs` and from `dst.ins` is always the
//! same table. Every mutation goes through `link`/`unlink`, which keep the
//! conservation and depth bookkeeping in step.

use super::edge::{LinkRates, LinkRecord};
use super::error::GraphError;
use super::node::{ConveyorNode, NodeKind};
use indexmap::IndexSet;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// An exact flow amount.
pub type Rate = num_rational::Ratio<i64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConveyorGraph {
    nodes: Vec<ConveyorNode>,
    links: HashMap<(NodeId, NodeId), LinkRates>,
}

impl ConveyorGraph {
    pub fn new() -> Self { Self::default() }
    pub fn node_count(&self) -> usize { self.nodes.len() }

    pub fn add_node(&mut self, holding: Rate) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(ConveyorNode::new(holding));
        id
    }

    pub fn add_empty(&mut self) -> NodeId { self.add_node(Rate::zero()) }

    pub fn node(&self, id: NodeId) -> &ConveyorNode { &self.nodes[id.index()] }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId::new)
    }

    // --- Accessors ---
    pub fn holding(&self, id: NodeId) -> Rate { self.nodes[id.index()].holding }
    pub fn depth(&self, id: NodeId) -> u32 { self.nodes[id.index()].depth }
    pub fn in_partners(&self, id: NodeId) -> &IndexSet<NodeId> { &self.nodes[id.index()].ins }
    pub fn out_partners(&self, id: NodeId) -> &IndexSet<NodeId> { &self.nodes[id.index()].outs }

    /// The shared rate table between `src` and `dst`, if they are linked.
    pub fn rates(&self, src: NodeId, dst: NodeId) -> Option<&LinkRates> {
        self.links.get(&(src, dst))
    }

    /// Sum of every node's holding. Invariant under `link`/`unlink`.
    pub fn total_holding(&self) -> Rate {
        self.nodes.iter().fold(Rate::zero(), |acc, n| acc + n.holding)
    }

    pub(crate) fn adjust_holding(&mut self, id: NodeId, delta: Rate) {
        self.nodes[id.index()].holding += delta;
    }

    // --- Linking ---

    /// Links `src -> dst` at `rate`, defaulting to `src`'s splittable rate.
    /// Returns the rate that was linked.
    pub fn link(&mut self, src: NodeId, dst: NodeId, rate: Option<Rate>) -> Rate {
        let rate = rate.unwrap_or_else(|| self.splittable(src));

        *self.links.entry((src, dst)).or_default().entry(rate).or_insert(0) += 1;
        self.nodes[src.index()].outs.insert(dst);
        self.nodes[dst.index()].ins.insert(src);

        // Conservation
        self.nodes[src.index()].holding -= rate;
        self.nodes[dst.index()].holding += rate;

        // Depth: first inbound link sets it, later ones can only shorten it.
        let via_src = self.nodes[src.index()].depth + 1;
        let first_inbound = self.in_links(dst) <= 1;
        let dst_node = &mut self.nodes[dst.index()];
        dst_node.depth = if first_inbound { via_src } else { dst_node.depth.min(via_src) };

        rate
    }

    /// Removes one link unit `src -> dst`. If `rate` is omitted the pair must be
    /// linked at exactly one rate. Returns the rate that was unlinked.
    pub fn unlink(&mut self, src: NodeId, dst: NodeId, rate: Option<Rate>) -> Result<Rate, GraphError> {
        let table = self.links.get_mut(&(src, dst)).ok_or(GraphError::NotLinked { src, dst })?;

        let rate = match rate {
            Some(r) if table.contains_key(&r) => r,
            Some(r) => return Err(GraphError::RateNotLinked { src, dst, rate: r }),
            None if table.len() == 1 => *table.keys().next().ok_or(GraphError::NotLinked { src, dst })?,
            None => return Err(GraphError::AmbiguousRate { src, dst }),
        };

        // 1. Decrement and prune
        if let Some(count) = table.get_mut(&rate) {
            *count -= 1;
            if *count == 0 {
                table.shift_remove(&rate);
            }
        }
        if table.is_empty() {
            self.links.remove(&(src, dst));
            self.nodes[src.index()].outs.shift_remove(&dst);
            self.nodes[dst.index()].ins.shift_remove(&src);
        }

        // 2. Conservation
        self.nodes[src.index()].holding += rate;
        self.nodes[dst.index()].holding -= rate;

        // 3. Depth, only when `src` may have been the shortest route
        if self.nodes[dst.index()].depth == self.nodes[src.index()].depth + 1 {
            let shortest = self.nodes[dst.index()]
                .ins
                .iter()
                .map(|p| self.nodes[p.index()].depth + 1)
                .min();
            self.nodes[dst.index()].depth = shortest.unwrap_or(0);
        }

        Ok(rate)
    }

    /// Unlinks every outgoing link unit of `id`.
    pub fn unlink_to_all(&mut self, id: NodeId) -> Result<(), GraphError> {
        for dst in self.out_partners(id).clone() {
            for (rate, count) in self.rates(id, dst).cloned().unwrap_or_default() {
                for _ in 0..count {
                    self.unlink(id, dst, Some(rate))?;
                }
            }
        }
        Ok(())
    }

    /// Unlinks every incoming link unit of `id`.
    pub fn unlink_from_all(&mut self, id: NodeId) -> Result<(), GraphError> {
        for src in self.in_partners(id).clone() {
            for (rate, count) in self.rates(src, id).cloned().unwrap_or_default() {
                for _ in 0..count {
                    self.unlink(src, id, Some(rate))?;
                }
            }
        }
        Ok(())
    }

    /// Removes every link unit between the pair, returning the total rate removed.
    pub fn sever(&mut self, src: NodeId, dst: NodeId) -> Result<Rate, GraphError> {
        let mut removed = Rate::zero();
        for (rate, count) in self.rates(src, dst).cloned().unwrap_or_default() {
            for _ in 0..count {
                removed += self.unlink(src, dst, Some(rate))?;
            }
        }
        Ok(removed)
    }

    // --- Derived flow properties ---

    /// Rate of the first outgoing link group, or the full holding when unsplit.
    pub fn splittable(&self, id: NodeId) -> Rate {
        self.out_partners(id)
            .first()
            .and_then(|dst| self.rates(id, *dst))
            .and_then(|table| table.keys().next().copied())
            .unwrap_or_else(|| self.holding(id))
    }

    /// The amount a fresh `n`-way branch of `id` should carry.
    pub fn split_into(&self, id: NodeId, n: u64) -> Rate {
        let holding = self.holding(id);
        if holding.is_zero() {
            Rate::zero()
        } else if self.out_links(id) > 0 {
            self.splittable(id)
        } else {
            holding / Rate::from_integer(n as i64)
        }
    }

    pub fn in_links(&self, id: NodeId) -> u32 {
        self.in_partners(id).iter().filter_map(|src| self.rates(*src, id)).map(|t| t.values().sum::<u32>()).sum()
    }

    pub fn out_links(&self, id: NodeId) -> u32 {
        self.out_partners(id).iter().filter_map(|dst| self.rates(id, *dst)).map(|t| t.values().sum::<u32>()).sum()
    }

    pub fn sum_ins(&self, id: NodeId) -> Rate {
        self.in_partners(id)
            .iter()
            .filter_map(|src| self.rates(*src, id))
            .fold(Rate::zero(), |acc, t| acc + super::edge::carried(t))
    }

    pub fn sum_outs(&self, id: NodeId) -> Rate {
        self.out_partners(id)
            .iter()
            .filter_map(|dst| self.rates(id, *dst))
            .fold(Rate::zero(), |acc, t| acc + super::edge::carried(t))
    }

    /// True when every outgoing rate equals the mean outgoing rate.
    pub fn splits_evenly(&self, id: NodeId) -> bool {
        let count = self.out_links(id);
        if count == 0 {
            return true;
        }
        let target = self.sum_outs(id) / Rate::from_integer(count as i64);
        self.out_partners(id)
            .iter()
            .filter_map(|dst| self.rates(id, *dst))
            .all(|t| t.keys().all(|r| *r == target))
    }

    /// Partner counts capped at 2.
    pub fn degree(&self, id: NodeId) -> (u8, u8) {
        let cap = |n: usize| n.min(2) as u8;
        (cap(self.in_partners(id).len()), cap(self.out_partners(id).len()))
    }

    pub fn classify(&self, id: NodeId) -> NodeKind {
        NodeKind::from_degree(self.degree(id), self.splits_evenly(id))
    }

    /// Every link unit leaving `id`, in insertion order.
    pub fn out_records(&self, id: NodeId) -> impl Iterator<Item = LinkRecord> + '_ {
        self.out_partners(id).iter().flat_map(move |&dst| {
            self.rates(id, dst)
                .into_iter()
                .flat_map(move |t| t.iter().map(move |(&rate, &count)| LinkRecord { peer: dst, rate, count }))
        })
    }

    /// Every link unit entering `id`, in insertion order.
    pub fn in_records(&self, id: NodeId) -> impl Iterator<Item = LinkRecord> + '_ {
        self.in_partners(id).iter().flat_map(move |&src| {
            self.rates(src, id)
                .into_iter()
                .flat_map(move |t| t.iter().map(move |(&rate, &count)| LinkRecord { peer: src, rate, count }))
        })
    }

    pub fn is_detached(&self, id: NodeId) -> bool {
        self.in_partners(id).is_empty() && self.out_partners(id).is_empty()
    }
}
