//! Adequacy gate: is the cohort large and balanced enough to support inference?
//!
//! The gate runs before any resampling so that degenerate data never reaches
//! the inferential machinery. It is a pure function of the cohort and the
//! thresholds; failing it is a data condition, not an error.
//!
//! Thresholds are checked in a fixed order and *every* unmet threshold is
//! reported, so a caller can see the full deficit at once:
//! 1. Minimum items per group
//! 2. Minimum distinct source units per group
//! 3. Minimum recurring items per group
//! 4. Minimum balance ratio

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CohortError, ThresholdError};
use crate::types::{Cohort, Group};

/// Minimums a cohort must meet before inference is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdequacyThresholds {
    /// Minimum observations in each group.
    pub min_items_per_group: usize,

    /// Minimum distinct source units in each group.
    pub min_source_units_per_group: usize,

    /// Minimum identities recurring across at least two source units, per group.
    /// Leave at zero for scalar measures, which carry no item identity.
    pub min_recurring_items: usize,

    /// Minimum min/max group size ratio, in [0, 1].
    pub min_balance_ratio: f64,
}

impl Default for AdequacyThresholds {
    fn default() -> Self {
        Self {
            min_items_per_group: 30,
            min_source_units_per_group: 10,
            min_recurring_items: 0,
            min_balance_ratio: 0.2,
        }
    }
}

impl AdequacyThresholds {
    /// Check that the thresholds themselves are meaningful.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        if !(0.0..=1.0).contains(&self.min_balance_ratio) {
            return Err(ThresholdError::BalanceRatioOutOfRange(self.min_balance_ratio));
        }
        if self.min_source_units_per_group > self.min_items_per_group {
            return Err(ThresholdError::UnitsExceedItems {
                units: self.min_source_units_per_group,
                items: self.min_items_per_group,
            });
        }
        Ok(())
    }
}

/// One unmet threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "threshold", rename_all = "snake_case")]
pub enum FailedThreshold {
    /// Too few observations in a group.
    MinItemsPerGroup {
        /// Deficient group.
        group: Group,
        /// Observed count.
        observed: usize,
        /// Required count.
        required: usize,
    },

    /// Too few distinct source units in a group.
    MinSourceUnitsPerGroup {
        /// Deficient group.
        group: Group,
        /// Observed count.
        observed: usize,
        /// Required count.
        required: usize,
    },

    /// Too few recurring items in a group.
    MinRecurringItems {
        /// Deficient group.
        group: Group,
        /// Observed count.
        observed: usize,
        /// Required count.
        required: usize,
    },

    /// Groups too unbalanced.
    MinBalanceRatio {
        /// Observed ratio.
        observed: f64,
        /// Required ratio.
        required: f64,
    },
}

impl FailedThreshold {
    /// Stable machine-readable code, e.g. `min_items_per_group[group_b]`.
    pub fn code(&self) -> String {
        match self {
            FailedThreshold::MinItemsPerGroup { group, .. } => {
                format!("min_items_per_group[{}]", group)
            }
            FailedThreshold::MinSourceUnitsPerGroup { group, .. } => {
                format!("min_source_units_per_group[{}]", group)
            }
            FailedThreshold::MinRecurringItems { group, .. } => {
                format!("min_recurring_items[{}]", group)
            }
            FailedThreshold::MinBalanceRatio { .. } => "min_balance_ratio".to_string(),
        }
    }

    /// Group this failure concerns, if it is a per-group threshold.
    pub fn group(&self) -> Option<Group> {
        match self {
            FailedThreshold::MinItemsPerGroup { group, .. }
            | FailedThreshold::MinSourceUnitsPerGroup { group, .. }
            | FailedThreshold::MinRecurringItems { group, .. } => Some(*group),
            FailedThreshold::MinBalanceRatio { .. } => None,
        }
    }
}

impl fmt::Display for FailedThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedThreshold::MinItemsPerGroup {
                group,
                observed,
                required,
            }
            | FailedThreshold::MinSourceUnitsPerGroup {
                group,
                observed,
                required,
            }
            | FailedThreshold::MinRecurringItems {
                group,
                observed,
                required,
            } => write!(
                f,
                "{}: {} has {}, needs at least {}",
                self.code(),
                group,
                observed,
                required
            ),
            FailedThreshold::MinBalanceRatio { observed, required } => write!(
                f,
                "min_balance_ratio: observed {:.3}, needs at least {:.3}",
                observed, required
            ),
        }
    }
}

/// Outcome of the adequacy gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdequacyResult {
    /// Whether every threshold was met.
    pub pass: bool,
    /// Every unmet threshold, in check order. Empty iff `pass`.
    pub failed: Vec<FailedThreshold>,
}

impl AdequacyResult {
    /// Failure codes in check order.
    pub fn failed_codes(&self) -> Vec<String> {
        self.failed.iter().map(FailedThreshold::code).collect()
    }
}

/// Check a cohort against the thresholds.
///
/// # Errors
///
/// Returns [`CohortError::Empty`] if the cohort has no observations at all.
/// That is a programmer or input error, not an adequacy condition.
pub fn check(
    cohort: &Cohort,
    thresholds: &AdequacyThresholds,
) -> Result<AdequacyResult, CohortError> {
    if cohort.total_size() == 0 {
        return Err(CohortError::Empty);
    }

    let mut failed = Vec::new();

    for group in [Group::A, Group::B] {
        if let Some(f) = check_items(cohort, group, thresholds) {
            failed.push(f);
        }
    }
    for group in [Group::A, Group::B] {
        if let Some(f) = check_source_units(cohort, group, thresholds) {
            failed.push(f);
        }
    }
    for group in [Group::A, Group::B] {
        if let Some(f) = check_recurring(cohort, group, thresholds) {
            failed.push(f);
        }
    }
    if let Some(f) = check_balance(cohort, thresholds) {
        failed.push(f);
    }

    Ok(AdequacyResult {
        pass: failed.is_empty(),
        failed,
    })
}

fn check_items(cohort: &Cohort, group: Group, t: &AdequacyThresholds) -> Option<FailedThreshold> {
    let observed = cohort.profile(group).size;
    (observed < t.min_items_per_group).then_some(FailedThreshold::MinItemsPerGroup {
        group,
        observed,
        required: t.min_items_per_group,
    })
}

fn check_source_units(
    cohort: &Cohort,
    group: Group,
    t: &AdequacyThresholds,
) -> Option<FailedThreshold> {
    let observed = cohort.profile(group).distinct_source_units;
    (observed < t.min_source_units_per_group).then_some(FailedThreshold::MinSourceUnitsPerGroup {
        group,
        observed,
        required: t.min_source_units_per_group,
    })
}

fn check_recurring(
    cohort: &Cohort,
    group: Group,
    t: &AdequacyThresholds,
) -> Option<FailedThreshold> {
    let observed = cohort.profile(group).recurring_items;
    (observed < t.min_recurring_items).then_some(FailedThreshold::MinRecurringItems {
        group,
        observed,
        required: t.min_recurring_items,
    })
}

fn check_balance(cohort: &Cohort, t: &AdequacyThresholds) -> Option<FailedThreshold> {
    (cohort.balance_ratio < t.min_balance_ratio).then_some(FailedThreshold::MinBalanceRatio {
        observed: cohort.balance_ratio,
        required: t.min_balance_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupProfile;

    fn cohort(a: (usize, usize, usize), b: (usize, usize, usize)) -> Cohort {
        let group_a = GroupProfile {
            size: a.0,
            distinct_source_units: a.1,
            recurring_items: a.2,
        };
        let group_b = GroupProfile {
            size: b.0,
            distinct_source_units: b.1,
            recurring_items: b.2,
        };
        let max = a.0.max(b.0);
        Cohort {
            group_a,
            group_b,
            balance_ratio: if max == 0 { 0.0 } else { a.0.min(b.0) as f64 / max as f64 },
        }
    }

    #[test]
    fn test_passes_when_all_thresholds_met() {
        let result =
            check(&cohort((50, 20, 0), (50, 20, 0)), &AdequacyThresholds::default()).unwrap();
        assert!(result.pass);
        assert!(result.failed.is_empty());
    }

    #[test]
    fn test_empty_cohort_is_an_error() {
        let err = check(&cohort((0, 0, 0), (0, 0, 0)), &AdequacyThresholds::default()).unwrap_err();
        assert_eq!(err, CohortError::Empty);
    }

    #[test]
    fn test_reports_every_failed_threshold() {
        let thresholds = AdequacyThresholds {
            min_items_per_group: 30,
            min_source_units_per_group: 10,
            min_recurring_items: 2,
            min_balance_ratio: 0.5,
        };
        let result = check(&cohort((50, 20, 3), (10, 4, 0)), &thresholds).unwrap();
        assert!(!result.pass);
        assert_eq!(
            result.failed_codes(),
            vec![
                "min_items_per_group[group_b]",
                "min_source_units_per_group[group_b]",
                "min_recurring_items[group_b]",
                "min_balance_ratio",
            ]
        );
    }

    #[test]
    fn test_boundary_values_pass() {
        let thresholds = AdequacyThresholds {
            min_items_per_group: 30,
            min_source_units_per_group: 10,
            min_recurring_items: 0,
            min_balance_ratio: 0.5,
        };
        let result = check(&cohort((30, 10, 0), (60, 10, 0)), &thresholds).unwrap();
        assert!(result.pass, "exact minimums must pass: {:?}", result.failed);
    }

    #[test]
    fn test_threshold_validation() {
        let mut t = AdequacyThresholds::default();
        assert!(t.validate().is_ok());
        t.min_balance_ratio = 1.5;
        assert_eq!(t.validate(), Err(ThresholdError::BalanceRatioOutOfRange(1.5)));
        t.min_balance_ratio = 0.5;
        t.min_source_units_per_group = t.min_items_per_group + 1;
        assert_eq!(
            t.validate(),
            Err(ThresholdError::UnitsExceedItems {
                units: 31,
                items: 30
            })
        );
    }

    #[test]
    fn test_failure_display_names_threshold() {
        let f = FailedThreshold::MinItemsPerGroup {
            group: Group::B,
            observed: 3,
            required: 30,
        };
        assert_eq!(f.to_string(), "min_items_per_group[group_b]: group_b has 3, needs at least 30");
    }
}
