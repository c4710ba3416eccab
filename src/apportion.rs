//! Largest-remainder apportionment.
//!
//! Turns continuous quantities into whole lots while keeping the total exact:
//! the integer result always sums to the rounded sum of the inputs. Used by the
//! transfer generator to settle fractional excess demand in tradable units.

/// Inputs above this cannot be rounded to an exact integer in an f64.
pub const MAX_APPORTIONABLE: f64 = 9_007_199_254_740_992.0; // 2^53

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApportionmentError {
    #[error("fraction {index} is negative: {value}")]
    Negative { index: usize, value: f64 },

    #[error("fraction {index} is not finite")]
    NonFinite { index: usize },

    #[error("fraction {index} is too large to apportion: {value}")]
    OutOfRange { index: usize, value: f64 },
}

/// Apportion `fractions` into integers summing to `round(sum(fractions))`.
///
/// Every entry starts at its naive rounding (half away from zero). When those
/// roundings miss the target, the entries with the largest signed remainder
/// `f - round(f)` are incremented, or the ones with the smallest remainder are
/// decremented. Ties go to the lower index, so the result is deterministic and
/// no entry moves more than one unit from its naive rounding.
pub fn largest_remainder(fractions: &[f64]) -> Result<Vec<u64>, ApportionmentError> {
    validate(fractions)?;

    let mut result: Vec<u64> = fractions.iter().map(|f| f.round() as u64).collect();
    let current: u64 = result.iter().sum();
    let target = fractions.iter().sum::<f64>().round() as u64;

    if current == target {
        return Ok(result);
    }

    let remainder = |i: usize| fractions[i] - fractions[i].round();
    let mut indices: Vec<usize> = (0..fractions.len()).collect();

    if target > current {
        // stable sort keeps index order among equal remainders
        indices.sort_by(|&a, &b| remainder(b).total_cmp(&remainder(a)));
        for &i in indices.iter().take((target - current) as usize) {
            result[i] += 1;
        }
    } else {
        indices.sort_by(|&a, &b| remainder(a).total_cmp(&remainder(b)));
        for &i in indices.iter().take((current - target) as usize) {
            // only entries that were rounded up sit at the front
            result[i] = result[i].saturating_sub(1);
        }
    }

    Ok(result)
}

fn validate(fractions: &[f64]) -> Result<(), ApportionmentError> {
    for (index, &value) in fractions.iter().enumerate() {
        if !value.is_finite() {
            return Err(ApportionmentError::NonFinite { index });
        }
        if value < 0.0 {
            return Err(ApportionmentError::Negative { index, value });
        }
        if value > MAX_APPORTIONABLE {
            return Err(ApportionmentError::OutOfRange { index, value });
        }
    }

    let total: f64 = fractions.iter().sum();
    if total > MAX_APPORTIONABLE {
        return Err(ApportionmentError::OutOfRange {
            index: fractions.len().saturating_sub(1),
            value: total,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naive_rounding_already_exact() {
        // naive 1 + 2 + 3 = 6, target round(6.2) = 6
        let result = largest_remainder(&[1.2, 2.4, 2.6]).unwrap();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[test]
    fn overshoot_is_decremented() {
        // naive 3 + 3 + 3 = 9, target round(8.0) = 8
        let result = largest_remainder(&[2.6, 2.6, 2.8]).unwrap();
        assert_eq!(result.iter().sum::<u64>(), 8);
        // both 2.6 entries have remainder -0.4, the lower index gives way
        assert_eq!(result, vec![2, 3, 3]);
    }

    #[test]
    fn undershoot_is_incremented() {
        // naive 0 + 0 + 0 = 0, target round(1.2) = 1
        let result = largest_remainder(&[0.4, 0.4, 0.4]).unwrap();
        assert_eq!(result, vec![1, 0, 0]);

        // largest remainder wins over index order
        let result = largest_remainder(&[0.3, 0.45, 0.4]).unwrap();
        assert_eq!(result, vec![0, 1, 0]);
    }

    #[test]
    fn empty_and_zero_inputs() {
        assert!(largest_remainder(&[]).unwrap().is_empty());
        assert_eq!(largest_remainder(&[0.0, 0.0]).unwrap(), vec![0, 0]);
    }

    #[test]
    fn rejects_invalid_input() {
        assert_eq!(
            largest_remainder(&[1.0, -0.5]),
            Err(ApportionmentError::Negative { index: 1, value: -0.5 })
        );
        assert_eq!(
            largest_remainder(&[f64::INFINITY]),
            Err(ApportionmentError::NonFinite { index: 0 })
        );
        assert!(matches!(
            largest_remainder(&[f64::NAN, 1.0]),
            Err(ApportionmentError::NonFinite { index: 0 })
        ));
        assert!(matches!(
            largest_remainder(&[1e300]),
            Err(ApportionmentError::OutOfRange { .. })
        ));
    }

    #[test]
    fn deterministic() {
        let input = [0.5, 1.5, 2.5, 0.25, 0.75];
        let first = largest_remainder(&input).unwrap();
        for _ in 0..10 {
            assert_eq!(largest_remainder(&input).unwrap(), first);
        }
    }
}
