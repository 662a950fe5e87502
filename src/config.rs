//! Planner configuration: belt tiers and splitter/merger caps.

use crate::error::BalanceError;
use serde::{Deserialize, Serialize};

/// Belt capacities, ascending. `BeltTiers::Tiers(k)` selects the first `k`.
pub const DEFAULT_BELTS: [u64; 5] = [60, 120, 270, 480, 780];

/// Hard cap on splitter fan-out and merger fan-in.
pub const MAX_FAN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeltTiers {
    /// Highest default tier to allow, `1..=5`.
    Tiers(usize),
    Explicit(Vec<u64>),
}

impl Default for BeltTiers {
    fn default() -> Self { BeltTiers::Tiers(DEFAULT_BELTS.len()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    pub belts: BeltTiers,
    /// Max outputs per splitter.
    pub max_split: usize,
    /// Max inputs per merger.
    pub max_merge: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self { belts: BeltTiers::default(), max_split: MAX_FAN, max_merge: MAX_FAN }
    }
}

impl BalancerConfig {
    pub fn with_belts(mut self, belts: Vec<u64>) -> Self {
        self.belts = BeltTiers::Explicit(belts);
        self
    }

    pub fn with_tiers(mut self, tiers: usize) -> Self {
        self.belts = BeltTiers::Tiers(tiers);
        self
    }

    pub fn validate(&self) -> Result<(), BalanceError> {
        for (name, value) in [("max_split", self.max_split), ("max_merge", self.max_merge)] {
            if !(2..=MAX_FAN).contains(&value) {
                return Err(BalanceError::InvalidInput(format!(
                    "{} must be between 2 and {}, got {}",
                    name, MAX_FAN, value
                )));
            }
        }
        self.belt_capacities().map(|_| ())
    }

    /// Resolves the configured belts into an ascending capacity list.
    pub fn belt_capacities(&self) -> Result<Vec<u64>, BalanceError> {
        match &self.belts {
            BeltTiers::Tiers(k) if (1..=DEFAULT_BELTS.len()).contains(k) => Ok(DEFAULT_BELTS[..*k].to_vec()),
            BeltTiers::Tiers(k) => Err(BalanceError::InvalidInput(format!(
                "belt tier must be between 1 and {}, got {}",
                DEFAULT_BELTS.len(),
                k
            ))),
            BeltTiers::Explicit(belts) if belts.is_empty() => {
                Err(BalanceError::InvalidInput("at least one belt capacity is required".into()))
            }
            BeltTiers::Explicit(belts) if belts.contains(&0) => {
                Err(BalanceError::InvalidInput("belt capacities must be greater than 0".into()))
            }
            BeltTiers::Explicit(belts) => {
                let mut sorted = belts.clone();
                sorted.sort_unstable();
                Ok(sorted)
            }
        }
    }
}
