//! Leave-one-out stability.
//!
//! Folds enumerate every observation of group A, then every observation of
//! group B (or every pair, for paired designs). When there are more folds
//! than the cap, a uniform subset of `cap` folds is drawn once from the
//! jackknife stream of the run seed and evaluated in ascending order.

use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::constants::JACKKNIFE_SALT;
use crate::effect::{AgreementKey, Design, Estimator};
use crate::statistics::phase_rng;

use super::map_indexed;

/// How the evaluated folds were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldSampling {
    /// Every fold was evaluated.
    Exhaustive,
    /// A uniform random subset of `fold_cap` folds was evaluated.
    UniformSubsample,
}

/// Jackknife outcome and fold accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JackknifeSummary {
    /// Fraction of evaluated folds agreeing with the full-sample estimate.
    pub stability: f64,
    /// Number of possible leave-one-out folds.
    pub folds_total: usize,
    /// Number of folds actually evaluated.
    pub folds_evaluated: usize,
    /// Configured cap.
    pub fold_cap: usize,
    /// How folds were chosen.
    pub sampling: FoldSampling,
}

/// Fraction of leave-one-out folds whose agreement key matches `full_key`.
///
/// Folds where the statistic becomes undefined count as disagreeing.
pub fn jackknife_stability<E: Estimator>(
    estimator: &E,
    a: &[E::Item],
    b: &[E::Item],
    full_key: AgreementKey,
    seed: u64,
    fold_cap: usize,
) -> JackknifeSummary {
    let design = estimator.design();
    let folds_total = match design {
        Design::TwoGroup => a.len() + b.len(),
        Design::Paired => a.len().min(b.len()),
    };

    let (folds, sampling): (Vec<usize>, FoldSampling) = if folds_total <= fold_cap {
        ((0..folds_total).collect(), FoldSampling::Exhaustive)
    } else {
        let mut rng = phase_rng(seed, JACKKNIFE_SALT, 0);
        let mut picked = index::sample(&mut rng, folds_total, fold_cap).into_vec();
        picked.sort_unstable();
        (picked, FoldSampling::UniformSubsample)
    };

    let agreements: Vec<bool> = map_indexed(folds.len(), |k| {
        let fold = folds[k];
        let key = match design {
            Design::TwoGroup if fold < a.len() => {
                estimator.agreement_key(&without(a, fold), b)
            }
            Design::TwoGroup => estimator.agreement_key(a, &without(b, fold - a.len())),
            Design::Paired => estimator.agreement_key(&without(a, fold), &without(b, fold)),
        };
        key == Some(full_key)
    });

    let folds_evaluated = agreements.len();
    let agreeing = agreements.iter().filter(|&&ok| ok).count();
    let stability = if folds_evaluated == 0 {
        0.0
    } else {
        agreeing as f64 / folds_evaluated as f64
    };

    JackknifeSummary {
        stability,
        folds_total,
        folds_evaluated,
        fold_cap,
        sampling,
    }
}

fn without<T: Copy>(data: &[T], skip: usize) -> Vec<T> {
    data.iter()
        .enumerate()
        .filter(|(i, _)| *i != skip)
        .map(|(_, x)| *x)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{Direction, ScalarEstimator};

    #[test]
    fn test_exhaustive_when_under_cap() {
        let a: Vec<f64> = (0..10).map(|i| 5.0 + i as f64).collect();
        let b: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let key = AgreementKey::Direction(Direction::AboveZero);
        let out = jackknife_stability(&ScalarEstimator::MeanDifference, &a, &b, key, 1, 250);
        assert_eq!(out.sampling, FoldSampling::Exhaustive);
        assert_eq!(out.folds_total, 20);
        assert_eq!(out.folds_evaluated, 20);
        assert_eq!(out.stability, 1.0);
    }

    #[test]
    fn test_subsample_above_cap() {
        let a: Vec<f64> = (0..200).map(|i| (i % 10) as f64).collect();
        let b: Vec<f64> = (0..200).map(|i| (i % 10) as f64).collect();
        let key = AgreementKey::Direction(Direction::Zero);
        let out = jackknife_stability(&ScalarEstimator::MeanDifference, &a, &b, key, 1, 50);
        assert_eq!(out.sampling, FoldSampling::UniformSubsample);
        assert_eq!(out.folds_total, 400);
        assert_eq!(out.folds_evaluated, 50);
        assert_eq!(out.fold_cap, 50);
    }

    #[test]
    fn test_single_influential_point_reduces_stability() {
        // Mean difference is positive only because of one outlier in A
        let mut a = vec![0.0; 5];
        a[0] = 100.0;
        let b = vec![1.0; 5];
        let key = AgreementKey::Direction(Direction::AboveZero);
        let out = jackknife_stability(&ScalarEstimator::MeanDifference, &a, &b, key, 1, 250);
        assert_eq!(out.folds_total, 10);
        assert!((out.stability - 0.9).abs() < 1e-12);
    }
}
