//! export.rs
//! Flat node/edge records for renderers, plus `petgraph` and DOT conversions.

use crate::graph::traverse::walk_order;
use crate::graph::{ConveyorGraph, NodeId, NodeKind, Rate};
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub kind: NodeKind,
    pub in_degree: usize,
    pub out_degree: usize,
    /// `(numerator, denominator)`
    pub in_sum: (i64, i64),
    pub out_sum: (i64, i64),
    pub in_links: u32,
    pub out_links: u32,
    pub depth: u32,
}

impl fmt::Display for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.kind)
    }
}

/// `[src, dst, (num, den)]`, one per link unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeRecord(pub NodeId, pub NodeId, pub (i64, i64));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

fn pair(rate: Rate) -> (i64, i64) { (*rate.numer(), *rate.denom()) }

fn node_record(graph: &ConveyorGraph, id: NodeId) -> NodeRecord {
    NodeRecord {
        id,
        kind: graph.classify(id),
        in_degree: graph.in_partners(id).len(),
        out_degree: graph.out_partners(id).len(),
        in_sum: pair(graph.sum_ins(id)),
        out_sum: pair(graph.sum_outs(id)),
        in_links: graph.in_links(id),
        out_links: graph.out_links(id),
        depth: graph.depth(id),
    }
}

/// Collects records for every node reachable from `start_nodes`, depth-first.
pub fn export_records(graph: &ConveyorGraph, start_nodes: &[NodeId]) -> GraphExport {
    let order = walk_order(graph, start_nodes);
    let mut export = GraphExport { nodes: Vec::with_capacity(order.len()), edges: Vec::new() };

    for &id in &order {
        export.nodes.push(node_record(graph, id));
        for record in graph.out_records(id) {
            for _ in 0..record.count {
                export.edges.push(EdgeRecord(id, record.peer, pair(record.rate)));
            }
        }
    }
    export
}

pub fn to_json(export: &GraphExport) -> serde_json::Result<String> {
    serde_json::to_string(export)
}

/// Copies the reachable network into a `petgraph` graph, one edge per link unit.
pub fn to_petgraph(graph: &ConveyorGraph, start_nodes: &[NodeId]) -> DiGraph<NodeRecord, Rate> {
    let order = walk_order(graph, start_nodes);
    let mut out = DiGraph::with_capacity(order.len(), order.len() * 2);
    let mut index: HashMap<NodeId, NodeIndex> = HashMap::with_capacity(order.len());

    for &id in &order {
        index.insert(id, out.add_node(node_record(graph, id)));
    }
    for &id in &order {
        for record in graph.out_records(id) {
            // Every out-partner of a reachable node is itself reachable.
            if let (Some(&a), Some(&b)) = (index.get(&id), index.get(&record.peer)) {
                for _ in 0..record.count {
                    out.add_edge(a, b, record.rate);
                }
            }
        }
    }
    out
}

/// Graphviz text for the reachable network.
pub fn to_dot(graph: &ConveyorGraph, start_nodes: &[NodeId]) -> String {
    let pg = to_petgraph(graph, start_nodes);
    format!("{}", Dot::new(&pg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (ConveyorGraph, NodeId) {
        // source -> s, s =(1)x2=> a, s -> b
        let mut g = ConveyorGraph::new();
        let source = g.add_node(Rate::from_integer(3));
        let s = g.add_empty();
        let a = g.add_empty();
        let b = g.add_empty();
        g.link(source, s, None);
        g.link(s, a, Some(Rate::from_integer(1)));
        g.link(s, a, Some(Rate::from_integer(1)));
        g.link(s, b, Some(Rate::from_integer(1)));
        (g, source)
    }

    #[test]
    fn test_records_follow_walk_order() {
        let (g, source) = sample();
        let export = export_records(&g, &[source]);

        let ids: Vec<u32> = export.nodes.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(export.nodes[1].kind, NodeKind::Splitter);
        assert_eq!(export.nodes[1].out_degree, 2);
        assert_eq!(export.nodes[1].out_links, 3);
        assert_eq!(export.nodes[2].in_sum, (2, 1));
        // One edge per unit: 1 + 2 + 1
        assert_eq!(export.edges.len(), 4);
    }

    #[test]
    fn test_json_shape() {
        let (g, source) = sample();
        let json = to_json(&export_records(&g, &[source])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["edges"][0], serde_json::json!([0, 1, [3, 1]]));
        assert_eq!(value["nodes"][0]["kind"], "Source");
        assert_eq!(value["nodes"][3]["depth"], 2);
    }

    #[test]
    fn test_petgraph_and_dot() {
        let (g, source) = sample();
        let pg = to_petgraph(&g, &[source]);
        assert_eq!(pg.node_count(), 4);
        assert_eq!(pg.edge_count(), 4);

        let dot = to_dot(&g, &[source]);
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("#1 Splitter"));
    }
}
