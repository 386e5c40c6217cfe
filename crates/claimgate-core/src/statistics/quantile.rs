//! Quantile computation using Type 2 quantiles (inverse empirical CDF with averaging).
//!
//! **Type 2 formula** (for sorted sample x of size n at probability p):
//! ```text
//! h = n * p + 0.5
//! q = (x[floor(h)] + x[ceil(h)]) / 2
//! ```
//!
//! Type 2 quantiles are used both for the median-difference estimator and
//! for the bootstrap percentile interval, so the two agree on tie handling.
//!
//! # Input Requirements
//!
//! All input data must be finite. In debug builds this is checked via
//! assertions.
//!
//! # Reference
//!
//! Hyndman, R. J. & Fan, Y. (1996). "Sample quantiles in statistical packages."
//! The American Statistician 50(4):361–365.

/// 0-based (floor, ceil) indices of the Type 2 quantile at probability `p`.
#[inline]
fn type2_indices(n: usize, p: f64) -> (usize, usize) {
    debug_assert!(n > 0, "n must be positive");
    let h = n as f64 * p + 0.5;
    let floor_idx = (h.floor() as usize).saturating_sub(1).min(n - 1);
    let ceil_idx = (h.ceil() as usize).saturating_sub(1).min(n - 1);
    (floor_idx, ceil_idx)
}

#[inline]
fn debug_assert_finite(data: &[f64]) {
    debug_assert!(
        data.iter().all(|x| x.is_finite()),
        "quantile input must be finite (no NaN or infinity)"
    );
}

/// Compute a single quantile from a mutable slice using Type 2 quantiles.
///
/// Uses `select_nth_unstable()` for O(n) expected time. The slice is
/// partially reordered as a side effect.
///
/// # Panics
///
/// Panics if `data` is empty or if `p` is outside [0, 1].
pub fn compute_quantile(data: &mut [f64], p: f64) -> f64 {
    assert!(!data.is_empty(), "Cannot compute quantile of empty slice");
    assert!(
        (0.0..=1.0).contains(&p),
        "Quantile probability must be in [0, 1]"
    );
    debug_assert_finite(data);

    let n = data.len();
    if n == 1 {
        return data[0];
    }

    let (floor_idx, ceil_idx) = type2_indices(n, p);
    let cmp = |a: &f64, b: &f64| a.total_cmp(b);

    if floor_idx == ceil_idx {
        let (_, mid, _) = data.select_nth_unstable_by(floor_idx, cmp);
        return *mid;
    }

    // Select the larger index first, then the floor inside the left partition
    let (_, mid, _) = data.select_nth_unstable_by(ceil_idx, cmp);
    let ceil_val = *mid;
    let (_, mid, _) = data[..ceil_idx].select_nth_unstable_by(floor_idx, cmp);
    let floor_val = *mid;

    (floor_val + ceil_val) / 2.0
}

/// Type 2 quantile of an already sorted slice.
///
/// # Panics
///
/// Panics if `sorted` is empty or if `p` is outside [0, 1].
pub fn compute_quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    assert!(!sorted.is_empty(), "Cannot compute quantile of empty slice");
    assert!(
        (0.0..=1.0).contains(&p),
        "Quantile probability must be in [0, 1]"
    );
    debug_assert!(
        sorted.windows(2).all(|w| w[0] <= w[1]),
        "input must be sorted"
    );
    let (floor_idx, ceil_idx) = type2_indices(sorted.len(), p);
    (sorted[floor_idx] + sorted[ceil_idx]) / 2.0
}

/// Type 2 median. Returns `None` for an empty slice.
///
/// Copies the data into `buffer` so the caller's slice is untouched and
/// the allocation can be reused across resampling iterations.
pub fn compute_median(data: &[f64], buffer: &mut Vec<f64>) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    buffer.clear();
    buffer.extend_from_slice(data);
    Some(compute_quantile(buffer, 0.5))
}

/// Central percentile interval at the given confidence level.
///
/// Sorts `draws` in place and returns the Type 2 quantiles at
/// `(1 - level) / 2` and `(1 + level) / 2`. Returns `None` for no draws.
///
/// # Panics
///
/// Panics if `level` is outside (0, 1).
pub fn percentile_interval(draws: &mut [f64], level: f64) -> Option<(f64, f64)> {
    assert!(
        level > 0.0 && level < 1.0,
        "confidence level must be in (0, 1)"
    );
    if draws.is_empty() {
        return None;
    }
    draws.sort_unstable_by(|a, b| a.total_cmp(b));
    let alpha = 1.0 - level;
    let lower = compute_quantile_sorted(draws, alpha / 2.0);
    let upper = compute_quantile_sorted(draws, 1.0 - alpha / 2.0);
    Some((lower, upper))
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn data_strategy(min_size: usize, max_size: usize) -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(-1e6f64..1e6, min_size..=max_size)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Selection must agree with the sort-based quantile
        #[test]
        fn prop_selection_matches_sort(data in data_strategy(1, 500), p in 0.0f64..=1.0) {
            let mut sorted = data.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let mut work = data.clone();
            let a = compute_quantile(&mut work, p);
            let b = compute_quantile_sorted(&sorted, p);
            prop_assert!((a - b).abs() < 1e-9, "select={} sort={}", a, b);
        }

        /// The interval is ordered and bracketed by the data range
        #[test]
        fn prop_interval_within_range(data in data_strategy(1, 500), level in 0.5f64..0.999) {
            let min = data.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mut work = data.clone();
            let (lo, hi) = percentile_interval(&mut work, level).unwrap();
            prop_assert!(lo <= hi);
            prop_assert!(lo >= min && hi <= max);
        }
    }
}
