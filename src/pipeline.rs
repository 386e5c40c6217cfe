//! One pass of the core pipeline: adequacy, estimation, resampling, verdict.
//!
//! The stability analyzer replays this once per registered lane; the
//! publication lane's pass is the run reported in the artifact.

use tracing::debug;

use claimgate_core::adequacy;
use claimgate_core::effect::{Design, PreparedSample};
use claimgate_core::resampling::resample;
use claimgate_core::verdict::{block_geometry, classify};
use claimgate_core::{
    AdequacyResult, Cohort, EffectEstimate, ObservationSet, ResamplingResult, Statistic,
    StatusReason, Verdict,
};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Everything one pipeline pass produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Statistic the pass estimated.
    pub statistic: Statistic,
    /// Seed the pass resampled with.
    pub seed: u64,
    /// Cohort counts.
    pub cohort: Cohort,
    /// Adequacy result; `None` when the cohort was blocked before the gate.
    pub adequacy: Option<AdequacyResult>,
    /// Full-sample estimate; `None` when blocked or undefined.
    pub effect: Option<EffectEstimate>,
    /// Resampling result; `None` when no resampling was attempted.
    pub resampling: Option<ResamplingResult>,
    /// Coherent verdict.
    pub verdict: Verdict,
}

/// Run the pipeline once.
///
/// # Errors
///
/// Fails only on malformed input. Degenerate, underpowered and ambiguous
/// data all produce an `Ok` outcome carrying the corresponding verdict.
pub fn run_pipeline(
    set: &ObservationSet,
    statistic: &Statistic,
    config: &EngineConfig,
    seed: u64,
    iterations: usize,
) -> Result<RunOutcome, EngineError> {
    let sample = PreparedSample::prepare(statistic, set)?;
    let cohort = Cohort::from_observations(set);

    let blocked = |reason: StatusReason| -> Result<RunOutcome, EngineError> {
        debug!(%statistic, seed, %reason, "blocked before adequacy gate");
        Ok(RunOutcome {
            statistic: statistic.clone(),
            seed,
            cohort,
            adequacy: None,
            effect: None,
            resampling: None,
            verdict: block_geometry(reason)?,
        })
    };

    if let Some(group) = cohort.empty_group() {
        debug!(%group, "group has no observations");
        return blocked(StatusReason::EmptyGroup);
    }
    let (n_a, n_b) = sample.group_sizes();
    if sample.design() == Design::Paired && n_a != n_b {
        return blocked(StatusReason::PairedLengthMismatch);
    }

    let adequacy = adequacy::check(&cohort, &config.adequacy)?;
    let effect = sample.estimate();
    debug!(
        %statistic,
        seed,
        adequacy_pass = adequacy.pass,
        failed = ?adequacy.failed_codes(),
        "adequacy checked"
    );

    let resampling = if adequacy.pass && effect.is_some() {
        resample(&sample, seed, &config.resampling_config(iterations))
    } else {
        None
    };

    let verdict = classify(&adequacy, resampling.as_ref(), &config.verdict_policy())?;
    debug!(%statistic, seed, %verdict, "classified");

    Ok(RunOutcome {
        statistic: statistic.clone(),
        seed,
        cohort,
        adequacy: Some(adequacy),
        effect,
        resampling,
        verdict,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimgate_core::{
        AdequacyThresholds, Observation, ObservationGroup, VerdictStatus,
    };

    fn scalar_group(values: impl IntoIterator<Item = f64>) -> ObservationGroup {
        ObservationGroup::new(
            "g",
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| Observation::scalar(format!("unit-{}", i), v))
                .collect(),
        )
    }

    fn small_config() -> EngineConfig {
        EngineConfig::new().adequacy(AdequacyThresholds {
            min_items_per_group: 10,
            min_source_units_per_group: 5,
            min_recurring_items: 0,
            min_balance_ratio: 0.2,
        })
    }

    #[test]
    fn test_empty_group_blocks_without_adequacy() {
        let set = ObservationSet::new(scalar_group([1.0, 2.0]), ObservationGroup::default());
        let out = run_pipeline(&set, &Statistic::MeanDifference, &small_config(), 1, 100).unwrap();
        assert_eq!(out.verdict.status(), VerdictStatus::BlockedDataGeometry);
        assert_eq!(out.verdict.status_reason(), StatusReason::EmptyGroup);
        assert!(out.adequacy.is_none());
        assert!(out.resampling.is_none());
    }

    #[test]
    fn test_paired_length_mismatch_blocks() {
        let set = ObservationSet::new(
            scalar_group((0..20).map(f64::from)),
            scalar_group((0..19).map(f64::from)),
        );
        let out =
            run_pipeline(&set, &Statistic::PearsonCorrelation, &small_config(), 1, 100).unwrap();
        assert_eq!(out.verdict.status_reason(), StatusReason::PairedLengthMismatch);
        assert!(out.adequacy.is_none());
    }

    #[test]
    fn test_underpowered_skips_resampling() {
        let set = ObservationSet::new(
            scalar_group((0..20).map(f64::from)),
            scalar_group((0..3).map(f64::from)),
        );
        let out = run_pipeline(&set, &Statistic::MeanDifference, &small_config(), 1, 100).unwrap();
        assert_eq!(out.verdict.status(), VerdictStatus::InconclusiveUnderpowered);
        assert!(out.resampling.is_none());
        assert!(out.effect.is_some());
    }

    #[test]
    fn test_undefined_statistic_blocks_after_adequacy() {
        let set = ObservationSet::new(
            scalar_group((0..20).map(f64::from)),
            scalar_group(std::iter::repeat(4.0).take(20)),
        );
        let out =
            run_pipeline(&set, &Statistic::PearsonCorrelation, &small_config(), 1, 100).unwrap();
        assert_eq!(out.verdict.status_reason(), StatusReason::StatisticUndefined);
        assert!(out.adequacy.as_ref().is_some_and(|a| a.pass));
        assert!(out.resampling.is_none());
    }

    #[test]
    fn test_separated_groups_are_conclusive() {
        let set = ObservationSet::new(
            scalar_group((0..30).map(|i| 50.0 + (i % 5) as f64)),
            scalar_group((0..30).map(|i| (i % 5) as f64)),
        );
        let out = run_pipeline(&set, &Statistic::MeanDifference, &small_config(), 7, 300).unwrap();
        assert_eq!(out.verdict.status(), VerdictStatus::ConclusivePositive);
        assert_eq!(out.verdict.status_reason(), StatusReason::EffectAboveZero);
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        let set = ObservationSet::new(scalar_group([f64::INFINITY]), scalar_group([1.0]));
        let err = run_pipeline(&set, &Statistic::MeanDifference, &small_config(), 1, 100)
            .unwrap_err();
        assert!(matches!(err, EngineError::Input(_)));
    }
}
