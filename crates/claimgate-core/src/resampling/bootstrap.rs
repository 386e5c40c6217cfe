//! Bootstrap percentile interval.
//!
//! Two-group designs resample each group independently with replacement,
//! keeping the original group sizes. Paired designs resample pair indices
//! so that the pairing survives.

use rand::Rng;

use crate::constants::BOOTSTRAP_SALT;
use crate::effect::{Design, Estimator};
use crate::statistics::{percentile_interval, phase_rng};

use super::{map_indexed, ConfidenceInterval};

/// Result of the bootstrap phase.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapOutcome {
    /// Percentile interval over the usable draws, if any.
    pub interval: Option<ConfidenceInterval>,
    /// Draws whose statistic was undefined.
    pub degenerate_draws: usize,
}

/// Resample `iterations` times and return the percentile interval of the
/// test statistic at `confidence_level`.
///
/// # Panics
///
/// Panics if `confidence_level` is outside (0, 1).
pub fn bootstrap_interval<E: Estimator>(
    estimator: &E,
    a: &[E::Item],
    b: &[E::Item],
    seed: u64,
    iterations: usize,
    confidence_level: f64,
) -> BootstrapOutcome {
    let design = estimator.design();

    let draws: Vec<Option<f64>> = map_indexed(iterations, |i| {
        let mut rng = phase_rng(seed, BOOTSTRAP_SALT, i as u64);
        let (ra, rb) = match design {
            Design::TwoGroup => (resample(a, &mut rng), resample(b, &mut rng)),
            Design::Paired => resample_pairs(a, b, &mut rng),
        };
        estimator.test_statistic(&ra, &rb)
    });

    let mut usable: Vec<f64> = draws.iter().flatten().copied().collect();
    let degenerate_draws = iterations - usable.len();

    let interval = percentile_interval(&mut usable, confidence_level).map(|(lower, upper)| {
        ConfidenceInterval {
            lower,
            upper,
            confidence_level,
        }
    });

    BootstrapOutcome {
        interval,
        degenerate_draws,
    }
}

/// Draw `data.len()` items with replacement.
fn resample<T: Copy, R: Rng>(data: &[T], rng: &mut R) -> Vec<T> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    (0..n).map(|_| data[rng.random_range(0..n)]).collect()
}

/// Draw pair indices with replacement, applying the same index to both groups.
fn resample_pairs<T: Copy, R: Rng>(a: &[T], b: &[T], rng: &mut R) -> (Vec<T>, Vec<T>) {
    let n = a.len().min(b.len());
    let mut ra = Vec::with_capacity(n);
    let mut rb = Vec::with_capacity(n);
    for _ in 0..n {
        let idx = rng.random_range(0..n);
        ra.push(a[idx]);
        rb.push(b[idx]);
    }
    (ra, rb)
}
