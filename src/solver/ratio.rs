//! Reduces exact rational targets to their smallest integer ratio.

use crate::error::BalanceError;
use crate::graph::Rate;
use num_integer::Integer;

/// Returns the unique integer tuple proportional to `targets` whose members
/// share no common factor. Zero targets stay zero; all-zero input yields zeros.
pub fn reduce(targets: &[Rate]) -> Result<Vec<u64>, BalanceError> {
    // 1. Explicit (numerator, denominator) pairs
    let mut fractions: Vec<(i64, i64)> = targets.iter().map(|t| (*t.numer(), *t.denom())).collect();

    // 2. Least common denominator
    let lcd = fractions.iter().try_fold(1i64, |acc, &(_, den)| checked_lcm(acc, den)).ok_or_else(too_large)?;

    // 3. Bring every fraction onto the common denominator
    for fraction in fractions.iter_mut() {
        let by = lcd / fraction.1;
        fraction.0 = fraction.0.checked_mul(by).ok_or_else(too_large)?;
        fraction.1 = fraction.1.checked_mul(by).ok_or_else(too_large)?;
    }
    if let Some(&(_, first)) = fractions.first() {
        if fractions.iter().any(|&(_, den)| den != first) {
            let dens: Vec<i64> = fractions.iter().map(|f| f.1).collect();
            return Err(BalanceError::InvariantViolation(format!("Denominators not the same. {:?}", dens)));
        }
    }

    // 4. Divide out the greatest common factor
    let gcf = fractions.iter().fold(0i64, |acc, &(num, _)| acc.gcd(&num));
    if gcf == 0 {
        return Ok(vec![0; fractions.len()]);
    }

    fractions
        .iter()
        .map(|&(num, _)| {
            u64::try_from(num / gcf)
                .map_err(|_| BalanceError::InvalidInput(format!("ratio targets must not be negative, got {}", num)))
        })
        .collect()
}

fn checked_lcm(a: i64, b: i64) -> Option<i64> {
    (a / a.gcd(&b)).checked_mul(b)
}

fn too_large() -> BalanceError {
    BalanceError::InvalidInput("target denominators too large".into())
}
