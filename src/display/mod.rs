//! Renderer-facing views of a network.
pub mod export;
pub mod trace;

pub use export::{export_records, to_dot, to_json, to_petgraph, EdgeRecord, GraphExport, NodeRecord};
pub use trace::format_trace;
