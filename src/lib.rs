// Library facade: plans conveyor split/merge networks that deliver a set of
// exact target rates from a single source.
//
// Pipeline: solver (ratio + belt search) -> synthesis (split/merge trees)
// -> analysis (canonicalization) -> display (export contract).

pub mod analysis;
pub mod config;
pub mod display;
pub mod error;
pub mod graph;
pub mod planner;
pub mod solver;
pub mod synthesis;

pub use analysis::{simplify, Partition};
pub use config::{BalancerConfig, BeltTiers};
pub use error::BalanceError;
pub use graph::{ConveyorGraph, NodeId, NodeKind, Rate};
pub use planner::{plan, plan_batch, plan_even, Plan};
