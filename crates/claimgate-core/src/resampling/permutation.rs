//! Permutation p-value.
//!
//! Two-group designs pool both groups and reassign labels by shuffling the
//! pool. Paired designs keep one group fixed and shuffle the other, which
//! breaks the pairing under the null.
//!
//! The pool is assembled in a label-independent order: the two groups are
//! ranked by content (size, then sorted values, then original order) and
//! concatenated in that rank. Swapping the group labels therefore replays
//! exactly the same shuffles, and for antisymmetric statistics every
//! permuted statistic is negated, leaving the two-sided p-value unchanged.

use std::cmp::Ordering;

use rand::seq::SliceRandom;

use crate::constants::{PERMUTATION_SALT, PERMUTATION_TIE_TOLERANCE};
use crate::effect::{Design, Estimator};
use crate::statistics::phase_rng;

use super::map_indexed;

/// Result of the permutation phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermutationOutcome {
    /// Fraction of defined permuted statistics at least as extreme as the observed one.
    pub p_value: f64,
    /// Permuted statistics that were defined.
    pub valid_draws: usize,
}

/// Two-sided permutation p-value of `observed`.
///
/// A permuted statistic counts as extreme when `|T*| >= |T_obs|`, with a
/// relative tolerance so that exact ties are not lost to rounding. With no
/// defined draw the p-value is 1.
pub fn permutation_p_value<E: Estimator>(
    estimator: &E,
    a: &[E::Item],
    b: &[E::Item],
    observed: f64,
    seed: u64,
    iterations: usize,
) -> PermutationOutcome {
    let a_first = content_order(estimator, a, b) != Ordering::Greater;

    let draws: Vec<Option<f64>> = match estimator.design() {
        Design::TwoGroup => {
            let (first, second) = if a_first { (a, b) } else { (b, a) };
            let mut pool = Vec::with_capacity(first.len() + second.len());
            pool.extend_from_slice(first);
            pool.extend_from_slice(second);
            let split = first.len();

            map_indexed(iterations, |i| {
                let mut rng = phase_rng(seed, PERMUTATION_SALT, i as u64);
                let mut shuffled = pool.clone();
                shuffled.shuffle(&mut rng);
                let (x, y) = shuffled.split_at(split);
                if a_first {
                    estimator.test_statistic(x, y)
                } else {
                    estimator.test_statistic(y, x)
                }
            })
        }
        Design::Paired => map_indexed(iterations, |i| {
            let mut rng = phase_rng(seed, PERMUTATION_SALT, i as u64);
            if a_first {
                let mut shuffled = b.to_vec();
                shuffled.shuffle(&mut rng);
                estimator.test_statistic(a, &shuffled)
            } else {
                let mut shuffled = a.to_vec();
                shuffled.shuffle(&mut rng);
                estimator.test_statistic(&shuffled, b)
            }
        }),
    };

    let threshold = observed.abs() * (1.0 - PERMUTATION_TIE_TOLERANCE);
    let valid: Vec<f64> = draws.into_iter().flatten().collect();
    let extreme = valid.iter().filter(|t| t.abs() >= threshold).count();

    let p_value = if valid.is_empty() {
        1.0
    } else {
        extreme as f64 / valid.len() as f64
    };

    PermutationOutcome {
        p_value,
        valid_draws: valid.len(),
    }
}

/// Label-independent ordering of the two groups.
fn content_order<E: Estimator>(estimator: &E, a: &[E::Item], b: &[E::Item]) -> Ordering {
    a.len()
        .cmp(&b.len())
        .then_with(|| {
            let mut sa = a.to_vec();
            let mut sb = b.to_vec();
            sa.sort_by(|x, y| estimator.canonical_cmp(x, y));
            sb.sort_by(|x, y| estimator.canonical_cmp(x, y));
            lexicographic(estimator, &sa, &sb)
        })
        .then_with(|| lexicographic(estimator, a, b))
}

fn lexicographic<E: Estimator>(estimator: &E, x: &[E::Item], y: &[E::Item]) -> Ordering {
    x.iter()
        .zip(y)
        .map(|(p, q)| estimator.canonical_cmp(p, q))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or_else(|| x.len().cmp(&y.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::ScalarEstimator;

    fn groups() -> (Vec<f64>, Vec<f64>) {
        let a: Vec<f64> = (0..25).map(|i| ((i * 13) % 17) as f64 * 0.3).collect();
        let b: Vec<f64> = (0..31).map(|i| ((i * 7) % 11) as f64 * 0.5).collect();
        (a, b)
    }

    #[test]
    fn test_label_swap_gives_identical_p_value() {
        let (a, b) = groups();
        let est = ScalarEstimator::MeanDifference;
        let t_ab = est.test_statistic(&a, &b).unwrap();
        let t_ba = est.test_statistic(&b, &a).unwrap();
        let p_ab = permutation_p_value(&est, &a, &b, t_ab, 11, 400);
        let p_ba = permutation_p_value(&est, &b, &a, t_ba, 11, 400);
        assert_eq!(p_ab, p_ba);
    }

    #[test]
    fn test_separated_groups_have_small_p_value() {
        let a: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.01).collect();
        let b: Vec<f64> = (0..30).map(|i| i as f64 * 0.01).collect();
        let est = ScalarEstimator::MeanDifference;
        let t = est.test_statistic(&a, &b).unwrap();
        let out = permutation_p_value(&est, &a, &b, t, 3, 500);
        assert!(out.p_value < 0.01, "p = {}", out.p_value);
        assert_eq!(out.valid_draws, 500);
    }

    #[test]
    fn test_zero_observed_statistic_gives_p_one() {
        let a = [1.0, 2.0, 3.0];
        let b = [3.0, 2.0, 1.0];
        let est = ScalarEstimator::MeanDifference;
        let out = permutation_p_value(&est, &a, &b, 0.0, 3, 100);
        assert_eq!(out.p_value, 1.0);
    }

    #[test]
    fn test_paired_permutation_breaks_perfect_correlation() {
        let a: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let b: Vec<f64> = a.iter().map(|x| 2.0 * x + 1.0).collect();
        let est = ScalarEstimator::PearsonCorrelation;
        let out = permutation_p_value(&est, &a, &b, 1.0, 9, 300);
        assert!(out.p_value < 0.01, "p = {}", out.p_value);
    }
}
