//! Lane replays and fragility diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use claimgate_core::{ObservationSet, StatusReason, VerdictStatus};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::error::{ConfigError, EngineError};
use crate::pipeline::{run_pipeline, RunOutcome};

use super::lanes::{LaneClass, LaneDefinition, LaneMatrix};

/// Aggregate consistency of a verdict across the lane matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobustnessClass {
    /// Every lane agrees and none is ambiguous or underpowered.
    Robust,
    /// Neither robust nor fragile.
    Mixed,
    /// Agreement below the fragile floor.
    Fragile,
}

impl RobustnessClass {
    /// Every class.
    pub const ALL: [RobustnessClass; 3] = [
        RobustnessClass::Robust,
        RobustnessClass::Mixed,
        RobustnessClass::Fragile,
    ];

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            RobustnessClass::Robust => "ROBUST",
            RobustnessClass::Mixed => "MIXED",
            RobustnessClass::Fragile => "FRAGILE",
        }
    }
}

impl fmt::Display for RobustnessClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which lanes disagree with the publication lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisagreementScope {
    /// No lane disagrees.
    None,
    /// Only DIAGNOSTIC or STRESS lanes disagree.
    DiagnosticOnly,
    /// At least one ENTITLEMENT lane disagrees.
    Entitlement,
}

impl DisagreementScope {
    /// Every scope.
    pub const ALL: [DisagreementScope; 3] = [
        DisagreementScope::None,
        DisagreementScope::DiagnosticOnly,
        DisagreementScope::Entitlement,
    ];

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            DisagreementScope::None => "NONE",
            DisagreementScope::DiagnosticOnly => "DIAGNOSTIC_ONLY",
            DisagreementScope::Entitlement => "ENTITLEMENT",
        }
    }
}

impl fmt::Display for DisagreementScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lane's replay, as recorded in the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneOutcome {
    /// Lane identifier.
    pub lane_id: String,
    /// Closure role.
    pub lane_class: LaneClass,
    /// Effective seed.
    pub seed: u64,
    /// Per-group size cap applied, if any.
    pub cohort_size_cap: Option<usize>,
    /// Formula tag of the effective statistic.
    pub statistic: String,
    /// Verdict status.
    pub status: VerdictStatus,
    /// Verdict reason.
    pub status_reason: StatusReason,
    /// Whether this is the publication lane.
    pub publication: bool,
    /// Top identity (rank statistics) or effect direction.
    pub identity: Option<String>,
    /// Target rank (rank statistics only).
    pub target_rank: Option<usize>,
    /// Margin of the top identity over the runner-up (rank statistics only).
    pub margin_to_runner_up: Option<f64>,
    /// Permutation p-value, if resampling ran.
    pub p_value: Option<f64>,
    /// Whether this lane counts as disagreeing with the publication lane.
    pub disagrees: bool,
    #[serde(skip)]
    leading_pair: Option<(String, Option<String>)>,
}

/// Aggregate diagnostics over a lane matrix replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityDiagnostics {
    /// Lanes whose status matches the publication lane / all lanes.
    pub agreement_ratio: f64,
    /// Same, over ENTITLEMENT lanes only.
    pub entitlement_agreement_ratio: f64,
    /// Fraction of non-publication lanes whose identity differs from the publication lane's.
    pub identity_flip_rate: f64,
    /// Fraction of non-publication lanes whose target rank differs (rank statistics only).
    pub rank_flip_rate: Option<f64>,
    /// 1 − rank_flip_rate (rank statistics only).
    pub rank_stability: Option<f64>,
    /// Fraction of non-publication lanes whose top-2 identity set differs (rank statistics only).
    pub top2_flip_rate: Option<f64>,
    /// Smallest margin to runner-up across lanes (rank statistics only).
    pub min_margin_to_runner_up: Option<f64>,
    /// Aggregate class.
    pub robustness_class: RobustnessClass,
    /// Where disagreement occurs.
    pub disagreement_scope: DisagreementScope,
    /// Per-lane outcomes in registration order.
    pub lanes: Vec<LaneOutcome>,
}

/// Result of replaying a lane matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneReplay {
    /// Aggregate diagnostics.
    pub diagnostics: StabilityDiagnostics,
    /// The publication lane's full pipeline outcome.
    pub publication: RunOutcome,
}

/// Replay the pipeline under every lane and aggregate.
///
/// Each lane owns its seed and runs independently; with the `parallel`
/// feature lanes run concurrently, and results are collected in
/// registration order either way.
pub fn analyze(
    set: &ObservationSet,
    matrix: &LaneMatrix,
    config: &EngineConfig,
    run_seed: u64,
    iterations: usize,
) -> Result<LaneReplay, EngineError> {
    let replay = |lane: &LaneDefinition| -> Result<RunOutcome, EngineError> {
        let seed = lane.resolve_seed(run_seed);
        let statistic = lane.resolve_statistic(&config.statistic);
        let observations = lane.apply_cap(set, run_seed);
        debug!(lane = %lane.lane_id, class = %lane.lane_class, seed, "replaying lane");
        run_pipeline(&observations, &statistic, config, seed, iterations)
    };

    #[cfg(feature = "parallel")]
    let runs: Vec<RunOutcome> = matrix
        .lanes()
        .par_iter()
        .map(replay)
        .collect::<Result<_, _>>()?;

    #[cfg(not(feature = "parallel"))]
    let runs: Vec<RunOutcome> = matrix
        .lanes()
        .iter()
        .map(replay)
        .collect::<Result<_, _>>()?;

    let diagnostics = summarize(matrix, &runs, config.stability.fragile_agreement_floor)?;
    let publication = runs
        .into_iter()
        .nth(matrix.publication_index())
        .ok_or_else(|| {
            ConfigError::InvalidLaneMatrix("publication lane missing".to_string())
        })?;

    Ok(LaneReplay {
        diagnostics,
        publication,
    })
}

/// Aggregate per-lane runs (in matrix order) into diagnostics.
///
/// # Errors
///
/// Fails unless there is exactly one run per registered lane.
pub fn summarize(
    matrix: &LaneMatrix,
    runs: &[RunOutcome],
    fragile_floor: f64,
) -> Result<StabilityDiagnostics, ConfigError> {
    if runs.len() != matrix.lanes().len() {
        return Err(ConfigError::InvalidLaneMatrix(format!(
            "{} runs for {} registered lanes",
            runs.len(),
            matrix.lanes().len()
        )));
    }
    let pub_status = runs[matrix.publication_index()].verdict.status();

    let lanes: Vec<LaneOutcome> = matrix
        .lanes()
        .iter()
        .zip(runs)
        .map(|(lane, run)| lane_outcome(lane, run, pub_status))
        .collect();

    let total = lanes.len();
    let agreeing = lanes.iter().filter(|l| l.status == pub_status).count();
    let agreement_ratio = ratio(agreeing, total);

    let entitlement: Vec<&LaneOutcome> = lanes
        .iter()
        .filter(|l| l.lane_class.is_closure_bearing())
        .collect();
    let entitlement_agreement_ratio = ratio(
        entitlement.iter().filter(|l| l.status == pub_status).count(),
        entitlement.len(),
    );

    let pub_lane = &lanes[matrix.publication_index()];
    let others: Vec<&LaneOutcome> = lanes.iter().filter(|l| !l.publication).collect();
    let flip_rate = |differs: &dyn Fn(&LaneOutcome) -> bool| -> f64 {
        if others.is_empty() {
            0.0
        } else {
            ratio(others.iter().filter(|l| differs(l)).count(), others.len())
        }
    };

    let identity_flip_rate = flip_rate(&|l| l.identity != pub_lane.identity);

    let ranked = pub_lane.target_rank.is_some();
    let rank_flip_rate = ranked.then(|| flip_rate(&|l| l.target_rank != pub_lane.target_rank));
    let top2_flip_rate = ranked.then(|| {
        flip_rate(&|l| !same_pair(l.leading_pair.as_ref(), pub_lane.leading_pair.as_ref()))
    });
    let min_margin_to_runner_up = lanes
        .iter()
        .filter_map(|l| l.margin_to_runner_up)
        .reduce(f64::min)
        .filter(|_| ranked);

    let any_inconclusive = lanes.iter().any(|l| l.status.is_inconclusive());
    let robustness_class = if agreement_ratio >= 1.0 && !any_inconclusive {
        RobustnessClass::Robust
    } else if agreement_ratio < fragile_floor {
        RobustnessClass::Fragile
    } else {
        RobustnessClass::Mixed
    };

    let disagreement_scope = if lanes
        .iter()
        .any(|l| l.disagrees && l.lane_class.is_closure_bearing())
    {
        DisagreementScope::Entitlement
    } else if lanes.iter().any(|l| l.disagrees) {
        DisagreementScope::DiagnosticOnly
    } else {
        DisagreementScope::None
    };

    for lane in lanes.iter().filter(|l| l.disagrees && !l.publication) {
        warn!(
            lane = %lane.lane_id,
            class = %lane.lane_class,
            status = %lane.status,
            publication_status = %pub_status,
            "lane disagrees with publication lane"
        );
    }

    Ok(StabilityDiagnostics {
        agreement_ratio,
        entitlement_agreement_ratio,
        identity_flip_rate,
        rank_flip_rate,
        rank_stability: rank_flip_rate.map(|r| 1.0 - r),
        top2_flip_rate,
        min_margin_to_runner_up,
        robustness_class,
        disagreement_scope,
        lanes,
    })
}

fn lane_outcome(lane: &LaneDefinition, run: &RunOutcome, pub_status: VerdictStatus) -> LaneOutcome {
    let status = run.verdict.status();
    let ranking = run.effect.as_ref().and_then(|e| e.ranking.as_ref());
    LaneOutcome {
        lane_id: lane.lane_id.clone(),
        lane_class: lane.lane_class,
        seed: run.seed,
        cohort_size_cap: lane.cohort_size_cap,
        statistic: run.statistic.formula_tag().to_string(),
        status,
        status_reason: run.verdict.status_reason(),
        publication: lane.publication,
        identity: run.effect.as_ref().map(|e| e.identity_label()),
        target_rank: ranking.map(|r| r.target_rank),
        margin_to_runner_up: ranking.map(|r| r.margin_to_runner_up),
        p_value: run.resampling.as_ref().map(|r| r.p_value),
        disagrees: status != pub_status || status.is_inconclusive(),
        leading_pair: run.effect.as_ref().and_then(|e| e.leading_pair()),
    }
}

fn same_pair(a: Option<&(String, Option<String>)>, b: Option<&(String, Option<String>)>) -> bool {
    match (a, b) {
        (Some((a1, a2)), Some((b1, b2))) => {
            (a1 == b1 && a2 == b2) || (a2.as_ref() == Some(b1) && b2.as_ref() == Some(a1))
        }
        (None, None) => true,
        _ => false,
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}
