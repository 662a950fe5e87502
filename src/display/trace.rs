use crate::graph::{ConveyorGraph, NodeId};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the network below `start_nodes` as an indented text tree.
///
/// A node reached a second time prints a back-reference to the level where it
/// was first expanded instead of repeating its subtree.
pub fn format_trace(graph: &ConveyorGraph, start_nodes: &[NodeId]) -> String {
    let mut tracer = Tracer { graph, visited_at_level: HashMap::new(), output: String::new() };

    for &start in start_nodes {
        if start.index() >= graph.node_count() {
            let _ = writeln!(tracer.output, "Error: Invalid Node ID {}", start);
            continue;
        }
        let _ = writeln!(tracer.output, "NETWORK TRACE from {}:", start);
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_node(start, 1, "", "");
    }
    tracer.output
}

struct Tracer<'a> {
    graph: &'a ConveyorGraph,
    visited_at_level: HashMap<NodeId, usize>,
    output: String,
}

impl Tracer<'_> {
    fn trace_node(&mut self, node: NodeId, level: usize, prefix: &str, via: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&node) {
            let _ = writeln!(self.output, "{}{}-> {} (Ref to L{})", prefix, via, node, first_seen);
            return;
        }
        self.visited_at_level.insert(node, level);

        let graph = self.graph;
        let _ = writeln!(
            self.output,
            "{}{}[L{}] {} {} holding={} in={} out={}",
            prefix,
            via,
            level,
            node,
            graph.classify(node),
            graph.holding(node),
            graph.sum_ins(node),
            graph.sum_outs(node)
        );

        let child_prefix = format!("{}  ", prefix);
        for record in graph.out_records(node).collect::<Vec<_>>() {
            let via = if record.count > 1 {
                format!("({} x{}) ", record.rate, record.count)
            } else {
                format!("({}) ", record.rate)
            };
            self.trace_node(record.peer, level + 1, &child_prefix, &via);
        }
    }
}
