//! Resampling-based uncertainty quantification.
//!
//! Three independent phases share one run seed:
//! - [`bootstrap`]: percentile confidence interval of the test statistic
//! - [`permutation`]: two-sided null-hypothesis p-value
//! - [`jackknife`]: leave-one-out agreement with the full-sample estimate
//!
//! Each iteration draws from its own generator, derived from the run seed,
//! a per-phase salt and the iteration index (see [`crate::statistics::phase_rng`]).
//! Per-iteration results are collected in iteration order and reduced with
//! order-independent operations, so the outcome is bit-identical with or
//! without the `parallel` feature and for any thread count.

pub mod bootstrap;
pub mod jackknife;
pub mod permutation;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CONFIDENCE_LEVEL, DEFAULT_ITERATIONS, DEFAULT_JACKKNIFE_FOLD_CAP};
use crate::effect::{Estimator, PreparedSample};

pub use bootstrap::{bootstrap_interval, BootstrapOutcome};
pub use jackknife::{jackknife_stability, FoldSampling, JackknifeSummary};
pub use permutation::{permutation_p_value, PermutationOutcome};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Knobs of one resampling run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResamplingConfig {
    /// Bootstrap and permutation iterations.
    pub iterations: usize,
    /// Confidence level of the percentile interval, in (0, 1).
    pub confidence_level: f64,
    /// Maximum number of leave-one-out folds.
    pub jackknife_fold_cap: usize,
}

impl Default for ResamplingConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            jackknife_fold_cap: DEFAULT_JACKKNIFE_FOLD_CAP,
        }
    }
}

/// Percentile confidence interval of the test statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
    /// Nominal confidence level.
    pub confidence_level: f64,
}

impl ConfidenceInterval {
    /// Whether the interval contains `x`.
    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }

    /// Whether zero lies strictly outside the interval.
    pub fn excludes_zero(&self) -> bool {
        self.lower > 0.0 || self.upper < 0.0
    }

    /// Whether the interval lies within `[-bar, bar]`.
    pub fn within(&self, bar: f64) -> bool {
        self.lower >= -bar && self.upper <= bar
    }
}

/// Everything the resampling phases produced for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResamplingResult {
    /// Bootstrap percentile interval; `None` when every draw was degenerate.
    pub confidence_interval: Option<ConfidenceInterval>,
    /// Two-sided permutation p-value.
    pub p_value: f64,
    /// Fraction of evaluated leave-one-out folds agreeing with the full sample.
    pub jackknife_stability: f64,
    /// Bootstrap iterations requested.
    pub bootstrap_draws: usize,
    /// Bootstrap draws whose statistic was undefined.
    pub degenerate_draws: usize,
    /// Permutation draws that produced a defined statistic.
    pub permutation_draws: usize,
    /// Jackknife fold accounting.
    pub jackknife: JackknifeSummary,
}

/// Run all three phases on a prepared sample.
///
/// Returns `None` if the full-sample statistic is undefined; callers block
/// before resampling in that case.
pub fn resample(
    sample: &PreparedSample,
    seed: u64,
    config: &ResamplingConfig,
) -> Option<ResamplingResult> {
    match sample {
        PreparedSample::Scalar { estimator, a, b } => resample_with(estimator, a, b, seed, config),
        PreparedSample::Ranked { estimator, a, b } => resample_with(estimator, a, b, seed, config),
    }
}

/// Run all three phases with an explicit estimator.
pub fn resample_with<E: Estimator>(
    estimator: &E,
    a: &[E::Item],
    b: &[E::Item],
    seed: u64,
    config: &ResamplingConfig,
) -> Option<ResamplingResult> {
    let observed = estimator.test_statistic(a, b)?;
    let full_key = estimator.agreement_key(a, b)?;

    tracing::debug!(
        statistic = estimator.formula_tag(),
        n_a = a.len(),
        n_b = b.len(),
        iterations = config.iterations,
        "resampling"
    );

    let boot = bootstrap_interval(
        estimator,
        a,
        b,
        seed,
        config.iterations,
        config.confidence_level,
    );
    let perm = permutation_p_value(estimator, a, b, observed, seed, config.iterations);
    let jack = jackknife_stability(estimator, a, b, full_key, seed, config.jackknife_fold_cap);

    if boot.degenerate_draws > 0 {
        tracing::warn!(
            degenerate = boot.degenerate_draws,
            total = config.iterations,
            "bootstrap draws with undefined statistic were excluded"
        );
    }

    Some(ResamplingResult {
        confidence_interval: boot.interval,
        p_value: perm.p_value,
        jackknife_stability: jack.stability,
        bootstrap_draws: config.iterations,
        degenerate_draws: boot.degenerate_draws,
        permutation_draws: perm.valid_draws,
        jackknife: jack,
    })
}

/// Evaluate `op` for every index in `0..count`, collecting in index order.
pub(crate) fn map_indexed<T, F>(count: usize, op: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        (0..count).into_par_iter().map(op).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..count).map(op).collect()
    }
}
