//! Verdict classification.
//!
//! A total function from (adequacy, resampling outcome) onto a closed status
//! set. Every verdict is built through [`Verdict::new`], which rejects any
//! combination of status, reason and adequacy result that contradicts the
//! others; in particular INCONCLUSIVE_UNDERPOWERED holds exactly when the
//! adequacy gate ran and failed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::adequacy::AdequacyResult;
use crate::constants::{DEFAULT_MIN_JACKKNIFE_STABILITY, DEFAULT_SIGNIFICANCE_LEVEL};
use crate::error::CoherenceError;
use crate::resampling::ResamplingResult;

// ============================================================================
// Status taxonomy
// ============================================================================

/// Closed verdict status set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    /// The cohort is degenerate; nothing can be inferred regardless of thresholds.
    BlockedDataGeometry,
    /// The adequacy gate failed.
    InconclusiveUnderpowered,
    /// Adequate data that does not clear the significance bar.
    #[serde(alias = "INCONCLUSIVE_INFERENTIAL_AMBIGUITY")]
    InconclusiveAmbiguity,
    /// A stable, significant effect.
    ConclusivePositive,
    /// An effect demonstrably within the null-effect bar.
    ConclusiveNegative,
}

impl VerdictStatus {
    /// Every status, in declaration order.
    pub const ALL: [VerdictStatus; 5] = [
        VerdictStatus::BlockedDataGeometry,
        VerdictStatus::InconclusiveUnderpowered,
        VerdictStatus::InconclusiveAmbiguity,
        VerdictStatus::ConclusivePositive,
        VerdictStatus::ConclusiveNegative,
    ];

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            VerdictStatus::BlockedDataGeometry => "BLOCKED_DATA_GEOMETRY",
            VerdictStatus::InconclusiveUnderpowered => "INCONCLUSIVE_UNDERPOWERED",
            VerdictStatus::InconclusiveAmbiguity => "INCONCLUSIVE_AMBIGUITY",
            VerdictStatus::ConclusivePositive => "CONCLUSIVE_POSITIVE",
            VerdictStatus::ConclusiveNegative => "CONCLUSIVE_NEGATIVE",
        }
    }

    /// CONCLUSIVE_POSITIVE or CONCLUSIVE_NEGATIVE.
    pub fn is_conclusive(self) -> bool {
        matches!(
            self,
            VerdictStatus::ConclusivePositive | VerdictStatus::ConclusiveNegative
        )
    }

    /// Either inconclusive status.
    pub fn is_inconclusive(self) -> bool {
        matches!(
            self,
            VerdictStatus::InconclusiveUnderpowered | VerdictStatus::InconclusiveAmbiguity
        )
    }

    /// BLOCKED_DATA_GEOMETRY.
    pub fn is_blocked(self) -> bool {
        self == VerdictStatus::BlockedDataGeometry
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerdictStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCONCLUSIVE_INFERENTIAL_AMBIGUITY" => Ok(VerdictStatus::InconclusiveAmbiguity),
            other => VerdictStatus::ALL
                .into_iter()
                .find(|status| status.as_str() == other)
                .ok_or_else(|| format!("unknown verdict status '{}'", other)),
        }
    }
}

/// Machine-readable reason accompanying a status.
///
/// Each reason belongs to exactly one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusReason {
    /// Exactly one group has no observations.
    EmptyGroup,
    /// A paired statistic was given groups of different lengths.
    PairedLengthMismatch,
    /// The full-sample statistic is undefined (e.g. zero variance).
    StatisticUndefined,
    /// At least one adequacy threshold was not met.
    AdequacyFailed,
    /// No bootstrap draw produced a defined statistic.
    BootstrapDegenerate,
    /// Significant, but too sensitive to individual observations.
    JackknifeUnstable,
    /// The permutation p-value does not clear the significance level.
    PValueAboveAlpha,
    /// Significant p-value, but the confidence interval contains zero.
    CiSpansZero,
    /// Stable, significant effect above zero.
    EffectAboveZero,
    /// Stable, significant effect below zero.
    EffectBelowZero,
    /// The confidence interval lies inside the null-effect bar.
    EffectWithinNullBar,
}

impl StatusReason {
    /// The only status this reason can accompany.
    pub fn status(self) -> VerdictStatus {
        match self {
            StatusReason::EmptyGroup
            | StatusReason::PairedLengthMismatch
            | StatusReason::StatisticUndefined => VerdictStatus::BlockedDataGeometry,
            StatusReason::AdequacyFailed => VerdictStatus::InconclusiveUnderpowered,
            StatusReason::BootstrapDegenerate
            | StatusReason::JackknifeUnstable
            | StatusReason::PValueAboveAlpha
            | StatusReason::CiSpansZero => VerdictStatus::InconclusiveAmbiguity,
            StatusReason::EffectAboveZero | StatusReason::EffectBelowZero => {
                VerdictStatus::ConclusivePositive
            }
            StatusReason::EffectWithinNullBar => VerdictStatus::ConclusiveNegative,
        }
    }

    /// Whether this reason is decided before the adequacy gate runs.
    pub fn precedes_adequacy(self) -> bool {
        matches!(
            self,
            StatusReason::EmptyGroup | StatusReason::PairedLengthMismatch
        )
    }

    /// Stable code.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusReason::EmptyGroup => "empty_group",
            StatusReason::PairedLengthMismatch => "paired_length_mismatch",
            StatusReason::StatisticUndefined => "statistic_undefined",
            StatusReason::AdequacyFailed => "adequacy_failed",
            StatusReason::BootstrapDegenerate => "bootstrap_degenerate",
            StatusReason::JackknifeUnstable => "jackknife_unstable",
            StatusReason::PValueAboveAlpha => "p_value_above_alpha",
            StatusReason::CiSpansZero => "ci_spans_zero",
            StatusReason::EffectAboveZero => "effect_above_zero",
            StatusReason::EffectBelowZero => "effect_below_zero",
            StatusReason::EffectWithinNullBar => "effect_within_null_bar",
        }
    }
}

impl fmt::Display for StatusReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Verdict
// ============================================================================

/// A coherent (status, reason) pair.
///
/// Fields are private: the only way to obtain a `Verdict` is through the
/// validating constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    status: VerdictStatus,
    status_reason: StatusReason,
}

impl Verdict {
    /// Build a verdict, rejecting incoherent combinations.
    ///
    /// `adequacy` is `None` when the adequacy gate was not evaluated, which
    /// is only legal for blocks decided before the gate.
    pub fn new(
        status: VerdictStatus,
        status_reason: StatusReason,
        adequacy: Option<&AdequacyResult>,
    ) -> Result<Self, CoherenceError> {
        let verdict = Self {
            status,
            status_reason,
        };
        verdict.check_coherence(adequacy)?;
        Ok(verdict)
    }

    /// Re-check this verdict against an adequacy result.
    pub fn check_coherence(&self, adequacy: Option<&AdequacyResult>) -> Result<(), CoherenceError> {
        let (status, reason) = (self.status, self.status_reason);

        if reason.status() != status {
            return Err(CoherenceError::ReasonStatusMismatch { status, reason });
        }

        match adequacy {
            None if reason.precedes_adequacy() => Ok(()),
            None => Err(CoherenceError::AdequacyMissing { status }),
            Some(_) if reason.precedes_adequacy() => {
                Err(CoherenceError::AdequacyEvaluatedForGeometry { reason })
            }
            Some(result) => {
                let underpowered = status == VerdictStatus::InconclusiveUnderpowered;
                match (result.pass, underpowered) {
                    (true, true) => Err(CoherenceError::UnderpoweredWithoutFailure),
                    (false, false) => Err(CoherenceError::FailedAdequacyNotUnderpowered { status }),
                    _ => Ok(()),
                }
            }
        }
    }

    /// Check that resampling was attempted exactly when the status needs it.
    ///
    /// Blocks and INCONCLUSIVE_UNDERPOWERED never resample; every other
    /// status is decided from a resampling result.
    pub fn check_resampling(&self, attempted: bool) -> Result<(), CoherenceError> {
        let expected = !(self.status.is_blocked()
            || self.status == VerdictStatus::InconclusiveUnderpowered);
        match (attempted, expected) {
            (true, false) => Err(CoherenceError::UnexpectedResampling {
                status: self.status,
            }),
            (false, true) => Err(CoherenceError::MissingResampling {
                status: self.status,
            }),
            _ => Ok(()),
        }
    }

    /// Status.
    pub fn status(&self) -> VerdictStatus {
        self.status
    }

    /// Reason code.
    pub fn status_reason(&self) -> StatusReason {
        self.status_reason
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.status, self.status_reason)
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Inferential bar a verdict must clear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerdictPolicy {
    /// Permutation p-value must be strictly below this.
    pub significance_level: f64,
    /// Half-width of the equivalence region for CONCLUSIVE_NEGATIVE.
    /// Without it, no run can be CONCLUSIVE_NEGATIVE.
    pub null_effect_bar: Option<f64>,
    /// Minimum jackknife agreement for CONCLUSIVE_POSITIVE.
    pub min_jackknife_stability: f64,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            significance_level: DEFAULT_SIGNIFICANCE_LEVEL,
            null_effect_bar: None,
            min_jackknife_stability: DEFAULT_MIN_JACKKNIFE_STABILITY,
        }
    }
}

/// Verdict for a block decided before the adequacy gate.
pub fn block_geometry(reason: StatusReason) -> Result<Verdict, CoherenceError> {
    Verdict::new(VerdictStatus::BlockedDataGeometry, reason, None)
}

/// Classify an adequacy result and, if inference ran, its resampling result.
///
/// `resampling` is `None` when the full-sample statistic was undefined.
///
/// Rules, first match wins:
/// 1. adequacy failed: INCONCLUSIVE_UNDERPOWERED
/// 2. no resampling: BLOCKED_DATA_GEOMETRY (statistic undefined)
/// 3. no bootstrap interval: INCONCLUSIVE_AMBIGUITY (bootstrap degenerate)
/// 4. p < α, CI excludes 0, jackknife ≥ min: CONCLUSIVE_POSITIVE
/// 5. p < α, CI excludes 0, jackknife < min: INCONCLUSIVE_AMBIGUITY
/// 6. p ≥ α, CI within ±bar: CONCLUSIVE_NEGATIVE
/// 7. otherwise INCONCLUSIVE_AMBIGUITY
pub fn classify(
    adequacy: &AdequacyResult,
    resampling: Option<&ResamplingResult>,
    policy: &VerdictPolicy,
) -> Result<Verdict, CoherenceError> {
    let reason = decide(adequacy, resampling, policy);
    Verdict::new(reason.status(), reason, Some(adequacy))
}

fn decide(
    adequacy: &AdequacyResult,
    resampling: Option<&ResamplingResult>,
    policy: &VerdictPolicy,
) -> StatusReason {
    if !adequacy.pass {
        return StatusReason::AdequacyFailed;
    }
    let Some(result) = resampling else {
        return StatusReason::StatisticUndefined;
    };
    let Some(ci) = result.confidence_interval else {
        return StatusReason::BootstrapDegenerate;
    };

    let significant = result.p_value < policy.significance_level;

    if significant && ci.excludes_zero() {
        if result.jackknife_stability < policy.min_jackknife_stability {
            return StatusReason::JackknifeUnstable;
        }
        return if ci.lower > 0.0 {
            StatusReason::EffectAboveZero
        } else {
            StatusReason::EffectBelowZero
        };
    }

    if let Some(bar) = policy.null_effect_bar {
        if !significant && ci.within(bar) {
            return StatusReason::EffectWithinNullBar;
        }
    }

    if significant {
        StatusReason::CiSpansZero
    } else {
        StatusReason::PValueAboveAlpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adequacy::FailedThreshold;
    use crate::resampling::{ConfidenceInterval, FoldSampling, JackknifeSummary};
    use crate::types::Group;

    fn passing() -> AdequacyResult {
        AdequacyResult {
            pass: true,
            failed: vec![],
        }
    }

    fn failing() -> AdequacyResult {
        AdequacyResult {
            pass: false,
            failed: vec![FailedThreshold::MinItemsPerGroup {
                group: Group::A,
                observed: 3,
                required: 30,
            }],
        }
    }

    fn result(ci: Option<(f64, f64)>, p_value: f64, stability: f64) -> ResamplingResult {
        ResamplingResult {
            confidence_interval: ci.map(|(lower, upper)| ConfidenceInterval {
                lower,
                upper,
                confidence_level: 0.95,
            }),
            p_value,
            jackknife_stability: stability,
            bootstrap_draws: 2000,
            degenerate_draws: 0,
            permutation_draws: 2000,
            jackknife: JackknifeSummary {
                stability,
                folds_total: 100,
                folds_evaluated: 100,
                fold_cap: 250,
                sampling: FoldSampling::Exhaustive,
            },
        }
    }

    fn reason(
        adequacy: &AdequacyResult,
        r: Option<&ResamplingResult>,
        policy: &VerdictPolicy,
    ) -> StatusReason {
        classify(adequacy, r, policy).unwrap().status_reason()
    }

    #[test]
    fn test_failed_adequacy_is_underpowered() {
        let v = classify(&failing(), None, &VerdictPolicy::default()).unwrap();
        assert_eq!(v.status(), VerdictStatus::InconclusiveUnderpowered);
        assert_eq!(v.status_reason(), StatusReason::AdequacyFailed);
    }

    #[test]
    fn test_classification_rules() {
        let policy = VerdictPolicy::default();
        let ok = passing();
        assert_eq!(reason(&ok, None, &policy), StatusReason::StatisticUndefined);
        assert_eq!(
            reason(&ok, Some(&result(None, 0.01, 1.0)), &policy),
            StatusReason::BootstrapDegenerate
        );
        assert_eq!(
            reason(&ok, Some(&result(Some((0.5, 1.5)), 0.001, 0.95)), &policy),
            StatusReason::EffectAboveZero
        );
        assert_eq!(
            reason(&ok, Some(&result(Some((-1.5, -0.5)), 0.001, 0.95)), &policy),
            StatusReason::EffectBelowZero
        );
        assert_eq!(
            reason(&ok, Some(&result(Some((0.5, 1.5)), 0.001, 0.5)), &policy),
            StatusReason::JackknifeUnstable
        );
        assert_eq!(
            reason(&ok, Some(&result(Some((-0.1, 1.5)), 0.01, 1.0)), &policy),
            StatusReason::CiSpansZero
        );
        assert_eq!(
            reason(&ok, Some(&result(Some((-0.1, 0.1)), 0.6, 1.0)), &policy),
            StatusReason::PValueAboveAlpha
        );
    }

    #[test]
    fn test_null_effect_bar_enables_conclusive_negative() {
        let policy = VerdictPolicy {
            null_effect_bar: Some(0.2),
            ..Default::default()
        };
        let r = result(Some((-0.1, 0.1)), 0.6, 1.0);
        let v = classify(&passing(), Some(&r), &policy).unwrap();
        assert_eq!(v.status(), VerdictStatus::ConclusiveNegative);

        let wide = result(Some((-0.3, 0.1)), 0.6, 1.0);
        assert_eq!(reason(&passing(), Some(&wide), &policy), StatusReason::PValueAboveAlpha);
    }

    #[test]
    fn test_constructor_rejects_incoherent_combinations() {
        assert_eq!(
            Verdict::new(
                VerdictStatus::InconclusiveUnderpowered,
                StatusReason::AdequacyFailed,
                Some(&passing())
            ),
            Err(CoherenceError::UnderpoweredWithoutFailure)
        );
        assert_eq!(
            Verdict::new(
                VerdictStatus::InconclusiveAmbiguity,
                StatusReason::PValueAboveAlpha,
                Some(&failing())
            ),
            Err(CoherenceError::FailedAdequacyNotUnderpowered {
                status: VerdictStatus::InconclusiveAmbiguity
            })
        );
        assert_eq!(
            Verdict::new(
                VerdictStatus::ConclusivePositive,
                StatusReason::PValueAboveAlpha,
                Some(&passing())
            ),
            Err(CoherenceError::ReasonStatusMismatch {
                status: VerdictStatus::ConclusivePositive,
                reason: StatusReason::PValueAboveAlpha
            })
        );
        assert_eq!(
            Verdict::new(
                VerdictStatus::BlockedDataGeometry,
                StatusReason::EmptyGroup,
                Some(&passing())
            ),
            Err(CoherenceError::AdequacyEvaluatedForGeometry {
                reason: StatusReason::EmptyGroup
            })
        );
        assert_eq!(
            Verdict::new(
                VerdictStatus::ConclusivePositive,
                StatusReason::EffectAboveZero,
                None
            ),
            Err(CoherenceError::AdequacyMissing {
                status: VerdictStatus::ConclusivePositive
            })
        );
    }

    #[test]
    fn test_geometry_block() {
        let v = block_geometry(StatusReason::EmptyGroup).unwrap();
        assert_eq!(v.status(), VerdictStatus::BlockedDataGeometry);
        assert!(block_geometry(StatusReason::AdequacyFailed).is_err());
    }

    #[test]
    fn test_status_names_and_alias() {
        assert_eq!(
            "INCONCLUSIVE_INFERENTIAL_AMBIGUITY".parse::<VerdictStatus>(),
            Ok(VerdictStatus::InconclusiveAmbiguity)
        );
        let parsed: VerdictStatus =
            serde_json::from_str("\"INCONCLUSIVE_INFERENTIAL_AMBIGUITY\"").unwrap();
        assert_eq!(parsed, VerdictStatus::InconclusiveAmbiguity);
        assert_eq!(
            serde_json::to_string(&VerdictStatus::ConclusivePositive).unwrap(),
            "\"CONCLUSIVE_POSITIVE\""
        );
        assert!("MAYBE".parse::<VerdictStatus>().is_err());
    }

    #[test]
    fn test_resampling_presence_follows_status() {
        let blocked = block_geometry(StatusReason::EmptyGroup).unwrap();
        assert!(blocked.check_resampling(false).is_ok());
        assert!(blocked.check_resampling(true).is_err());

        let underpowered = classify(&failing(), None, &VerdictPolicy::default()).unwrap();
        assert!(underpowered.check_resampling(false).is_ok());

        let r = result(None, 0.5, 1.0);
        let degenerate = classify(&passing(), Some(&r), &VerdictPolicy::default()).unwrap();
        assert_eq!(
            degenerate.check_resampling(false),
            Err(CoherenceError::MissingResampling {
                status: VerdictStatus::InconclusiveAmbiguity
            })
        );
        assert!(degenerate.check_resampling(true).is_ok());
    }
}
