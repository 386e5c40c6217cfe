//! Constants used throughout the crate.

/// Default deterministic seed for RNG operations.
///
/// Same seed + same observations = same resampling result.
/// The value `0x636C61696D` is "claim" encoded in ASCII.
pub const DEFAULT_SEED: u64 = 0x636C61696D;

/// Default number of bootstrap and permutation iterations.
pub const DEFAULT_ITERATIONS: usize = 2000;

/// Default confidence level of the bootstrap percentile interval.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Default significance level for the permutation p-value.
pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Default minimum fraction of leave-one-out estimates that must agree with
/// the full-sample estimate before a positive verdict is allowed.
pub const DEFAULT_MIN_JACKKNIFE_STABILITY: f64 = 0.8;

/// Default maximum number of leave-one-out folds evaluated exhaustively.
///
/// Above this, a uniformly sampled subset of this many folds is used.
pub const DEFAULT_JACKKNIFE_FOLD_CAP: usize = 250;

/// Magnitudes at or below this are treated as an exact zero when deciding
/// the direction of an effect.
pub const ZERO_TOLERANCE: f64 = 1e-12;

/// Relative tolerance when comparing permuted statistics to the observed one.
pub const PERMUTATION_TIE_TOLERANCE: f64 = 1e-12;

// Phase salts mixed into the run seed so bootstrap, permutation and
// jackknife draws never share a stream.
pub(crate) const BOOTSTRAP_SALT: u64 = 0xB007_57A9;
pub(crate) const PERMUTATION_SALT: u64 = 0x9E2B_17A7;
pub(crate) const JACKKNIFE_SALT: u64 = 0x1AC4_4E1F;
