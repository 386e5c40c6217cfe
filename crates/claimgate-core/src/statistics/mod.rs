//! Statistical building blocks shared by the estimators and the resampling engine.
//!
//! - Type 2 quantiles (percentile intervals, medians)
//! - Moments and Pearson correlation
//! - Counter-based sub-seed derivation for deterministic parallel resampling

mod moments;
mod quantile;
mod rng;

pub use moments::{mean, pearson_correlation, sample_variance};
pub use quantile::{compute_median, compute_quantile, compute_quantile_sorted, percentile_interval};
pub use rng::{counter_rng_seed, phase_rng};
