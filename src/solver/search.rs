//! Belt-aware ratio search.
//!
//! Whole belts can be peeled off a target before the remainder is ratio-split.
//! The search tries every sequence of peels (ascending belts per step, target by
//! target) and keeps the state with the lowest score:
//!
//! `score = sum(ratio) + even_floor(penalty + 1)`
//!
//! where `penalty` grows by one per peel and drops by one whenever a peel zeroes
//! every target. Ties keep the first state found.

use super::ratio::reduce;
use crate::error::BalanceError;
use crate::graph::Rate;
use log::debug;
use num_traits::Zero;
use serde::Serialize;
use smallvec::SmallVec;

/// Belt amounts peeled from one target, in peel order.
pub type Removals = SmallVec<[u64; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    /// Per target, the belt capacities to peel off.
    pub removals: Vec<Removals>,
    /// Per target, what remains after peeling.
    pub targets: Vec<Rate>,
    /// Integer ratio of the remaining targets.
    pub ratio: Vec<u64>,
    pub score: i64,
}

struct Frame {
    targets: Vec<Rate>,
    index: usize,
    removals: Vec<Removals>,
    penalty: i64,
    /// Next belt to try.
    belt: usize,
}

/// Floors to the nearest even number.
fn even_floor(n: i64) -> i64 { n.div_euclid(2) * 2 }

fn ratio_score(ratio: &[u64]) -> i64 { ratio.iter().sum::<u64>() as i64 }

/// Finds the peel plan with the lowest score. `belts` need not be sorted.
pub fn search(targets: &[Rate], belts: &[u64]) -> Result<SearchOutcome, BalanceError> {
    let mut belts: Vec<Rate> = belts.iter().map(|&b| Rate::from_integer(b as i64)).collect();
    belts.sort();

    let ratio = reduce(targets)?;
    let mut best = SearchOutcome {
        removals: vec![Removals::new(); targets.len()],
        targets: targets.to_vec(),
        score: ratio_score(&ratio),
        ratio,
    };
    if targets.is_empty() {
        return Ok(best);
    }

    let mut stack = vec![Frame {
        targets: targets.to_vec(),
        index: 0,
        removals: best.removals.clone(),
        penalty: 0,
        belt: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let fits = frame.belt < belts.len() && frame.targets[frame.index] >= belts[frame.belt];
        if !fits {
            // Belts exhausted for this target; continue with the next one on
            // top of the state reached so far.
            if let Some(done) = stack.pop() {
                if done.index + 1 < done.targets.len() {
                    stack.push(Frame { index: done.index + 1, belt: 0, ..done });
                }
            }
            continue;
        }

        let belt = belts[frame.belt];
        frame.belt += 1;

        // --- Candidate: peel one belt off the current target ---
        let mut removals = frame.removals.clone();
        removals[frame.index].push(belt.to_integer() as u64);
        let mut candidate = frame.targets.clone();
        candidate[frame.index] -= belt;

        let ratio = if candidate.iter().any(|t| !t.is_zero()) {
            reduce(&candidate)?
        } else {
            frame.penalty -= 1;
            vec![0; candidate.len()]
        };
        let score = ratio_score(&ratio) + even_floor(frame.penalty + 1);

        if score < best.score {
            best = SearchOutcome { removals: removals.clone(), targets: candidate.clone(), ratio, score };
        }

        // Try peeling more from the same target
        let child = Frame { targets: candidate, index: frame.index, removals, penalty: frame.penalty + 1, belt: 0 };
        stack.push(child);
    }

    debug!("belt search settled on ratio {:?} (score {}), removals {:?}", best.ratio, best.score, best.removals);
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ints(values: &[i64]) -> Vec<Rate> { values.iter().map(|&v| Rate::from_integer(v)).collect() }

    fn plan(removals: &[&[u64]]) -> Vec<Removals> {
        removals.iter().map(|r| Removals::from_slice(r)).collect()
    }

    #[rstest]
    #[case(-1, -2)]
    #[case(0, 0)]
    #[case(1, 0)]
    #[case(2, 2)]
    #[case(3, 2)]
    fn test_even_floor(#[case] n: i64, #[case] expected: i64) {
        assert_eq!(even_floor(n), expected);
    }

    #[test]
    fn test_full_belts_absorb_both_targets() {
        let outcome = search(&ints(&[60, 60]), &[60, 120, 270, 480, 780]).unwrap();
        assert_eq!(outcome.removals, plan(&[&[60], &[60]]));
        assert_eq!(outcome.ratio, vec![0, 0]);
        assert_eq!(outcome.targets, ints(&[0, 0]));
        assert!(outcome.score < 2, "baseline [1, 1] scores 2");
    }

    #[test]
    fn test_single_peel_beats_baseline() {
        let outcome = search(&ints(&[60, 70]), &[60]).unwrap();
        assert_eq!(outcome.removals, plan(&[&[60], &[]]));
        assert_eq!(outcome.targets, ints(&[0, 70]));
        assert_eq!(outcome.ratio, vec![0, 1]);
        assert_eq!(outcome.score, 1);
    }

    #[test]
    fn test_equal_score_keeps_first_found() {
        // 100 - 60 -> [40, 20] ~ [2, 1]; 100 - 90 -> [10, 20] ~ [1, 2]. Both score 3.
        let outcome = search(&ints(&[100, 20]), &[60, 90]).unwrap();
        assert_eq!(outcome.score, 3);
        assert_eq!(outcome.removals, plan(&[&[60], &[]]));
        assert_eq!(outcome.targets, ints(&[40, 20]));
        assert_eq!(outcome.ratio, vec![2, 1]);
    }

    #[test]
    fn test_nothing_fits_keeps_baseline() {
        let outcome = search(&[Rate::new(1, 3), Rate::new(5, 2)], &[60, 120]).unwrap();
        assert_eq!(outcome.removals, plan(&[&[], &[]]));
        assert_eq!(outcome.ratio, vec![2, 15]);
        assert_eq!(outcome.score, 17);
    }

    #[test]
    fn test_unsorted_belts_are_sorted() {
        let sorted = search(&ints(&[120, 45]), &[60, 120]).unwrap();
        let unsorted = search(&ints(&[120, 45]), &[120, 60]).unwrap();
        assert_eq!(sorted, unsorted);
    }

    #[test]
    fn test_removals_never_exceed_targets() {
        let targets = ints(&[780, 300, 45]);
        let outcome = search(&targets, &[60, 120, 270, 480, 780]).unwrap();
        for (i, removed) in outcome.removals.iter().enumerate() {
            let peeled: u64 = removed.iter().sum();
            assert_eq!(Rate::from_integer(peeled as i64) + outcome.targets[i], targets[i]);
        }
        assert_eq!(outcome.ratio, reduce(&outcome.targets).unwrap());
    }
}
