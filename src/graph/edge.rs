//! Defines link tables and the flat link records handed to exporters.

use super::storage::{NodeId, Rate};
use indexmap::IndexMap;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Parallel links between one `(src, dst)` pair: carried rate -> multiplicity.
///
/// An entry exists only while its multiplicity is positive.
pub type LinkRates = IndexMap<Rate, u32>;

/// One rate group between a node and a peer, as seen from either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub peer: NodeId,
    pub rate: Rate,
    /// Number of parallel links carrying `rate`. Renderers draw one edge per unit.
    pub count: u32,
}

/// Total amount carried by a link table (rate x multiplicity, summed).
pub fn carried(table: &LinkRates) -> Rate {
    table
        .iter()
        .fold(Rate::zero(), |acc, (rate, &count)| acc + *rate * Rate::from_integer(count as i64))
}
