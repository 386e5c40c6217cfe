//! The verdict artifact.
//!
//! One artifact carries the full decision trail of a run. It is only ever
//! built by [`ArtifactEmitter::emit`], which re-checks coherence first, so
//! a consumer never sees an artifact whose verdict contradicts its own
//! adequacy or resampling blocks.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use claimgate_core::effect::{Direction, RankingSummary};
use claimgate_core::resampling::JackknifeSummary;
use claimgate_core::{AdequacyResult, Cohort, EffectEstimate, ResamplingResult, Statistic, Verdict};

use crate::config::Profile;
use crate::entitlement::{EntitlementLane, PolicyTable};
use crate::error::{ConfigError, EngineError};
use crate::stability::{LaneMatrix, LaneReplay, StabilityDiagnostics};

/// Artifact schema identifier.
pub const ARTIFACT_SCHEMA_VERSION: &str = "claimgate.verdict.v1";

/// Content fingerprints of everything the verdict depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprints {
    /// Input observation set.
    pub observations: String,
    /// Registered lane matrix.
    pub lane_matrix: String,
    /// Entitlement policy table.
    pub policy: String,
}

/// Adequacy block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdequacySection {
    /// Whether every threshold was met.
    pub pass: bool,
    /// Codes of unmet thresholds.
    pub failed_thresholds: Vec<String>,
}

impl From<&AdequacyResult> for AdequacySection {
    fn from(result: &AdequacyResult) -> Self {
        Self {
            pass: result.pass,
            failed_thresholds: result.failed_codes(),
        }
    }
}

/// Effect block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSection {
    /// Formula tag.
    pub statistic_name: String,
    /// Reported value.
    pub value: f64,
    /// Signed statistic used for inference.
    pub test_statistic: f64,
    /// Sign of the test statistic.
    pub direction: Direction,
    /// Top-ranked identity (rank statistics only).
    pub top_identity: Option<String>,
    /// Ranking details (rank statistics only).
    pub ranking: Option<RankingSummary>,
}

impl From<&EffectEstimate> for EffectSection {
    fn from(effect: &EffectEstimate) -> Self {
        Self {
            statistic_name: effect.statistic_name.clone(),
            value: effect.value,
            test_statistic: effect.test_statistic,
            direction: effect.direction,
            top_identity: effect.ranking.as_ref().map(|r| r.top_identity.clone()),
            ranking: effect.ranking.clone(),
        }
    }
}

/// Resampling block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResamplingSection {
    /// Lower bootstrap bound; null when every draw was degenerate.
    pub ci_lower: Option<f64>,
    /// Upper bootstrap bound; null when every draw was degenerate.
    pub ci_upper: Option<f64>,
    /// Nominal confidence level.
    pub confidence_level: f64,
    /// Permutation p-value.
    pub p_value: f64,
    /// Leave-one-out agreement.
    pub jackknife_stability: f64,
    /// Bootstrap iterations.
    pub bootstrap_draws: usize,
    /// Bootstrap draws with an undefined statistic.
    pub degenerate_draws: usize,
    /// Permutation draws with a defined statistic.
    pub permutation_draws: usize,
    /// Fold accounting.
    pub jackknife: JackknifeSummary,
}

impl ResamplingSection {
    fn new(result: &ResamplingResult, confidence_level: f64) -> Self {
        let ci = result.confidence_interval;
        Self {
            ci_lower: ci.map(|c| c.lower),
            ci_upper: ci.map(|c| c.upper),
            confidence_level: ci.map_or(confidence_level, |c| c.confidence_level),
            p_value: result.p_value,
            jackknife_stability: result.jackknife_stability,
            bootstrap_draws: result.bootstrap_draws,
            degenerate_draws: result.degenerate_draws,
            permutation_draws: result.permutation_draws,
            jackknife: result.jackknife.clone(),
        }
    }
}

/// The canonical output of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictArtifact {
    /// Schema identifier.
    pub schema_version: String,
    /// Deterministic run identifier.
    pub run_id: String,
    /// Emission time, RFC 3339 UTC.
    pub generated_at: String,
    /// Run seed.
    pub seed: u64,
    /// Bootstrap and permutation iterations.
    pub iterations: usize,
    /// Profile the iteration count came from, if any.
    pub profile: Option<Profile>,
    /// Entitlement policy version.
    pub policy_version: String,
    /// Lane matrix version.
    pub lane_matrix_version: String,
    /// Input fingerprints.
    pub fingerprints: Fingerprints,
    /// Configured statistic.
    pub statistic: Statistic,
    /// Cohort counts.
    pub cohort: Cohort,
    /// Null when the cohort was blocked before the adequacy gate.
    pub adequacy: Option<AdequacySection>,
    /// Null when the statistic is undefined or the cohort was blocked.
    pub effect: Option<EffectSection>,
    /// Null whenever no resampling was attempted.
    pub resampling: Option<ResamplingSection>,
    /// Lane-matrix diagnostics.
    pub stability: StabilityDiagnostics,
    /// Publication verdict.
    pub verdict: Verdict,
    /// Entitlement lane.
    pub entitlement: EntitlementLane,
}

/// Everything a run contributes to its artifact.
#[derive(Debug)]
pub struct RunRecord<'a> {
    /// Deterministic run identifier.
    pub run_id: String,
    /// Run seed.
    pub seed: u64,
    /// Iterations.
    pub iterations: usize,
    /// Profile, if the iteration count came from one.
    pub profile: Option<Profile>,
    /// Configured confidence level.
    pub confidence_level: f64,
    /// Observation fingerprint.
    pub observations_fingerprint: String,
    /// Lane matrix used.
    pub lane_matrix: &'a LaneMatrix,
    /// Policy table used.
    pub policy: &'a PolicyTable,
    /// Lane replay, including the publication run.
    pub replay: LaneReplay,
    /// Mapped entitlement lane.
    pub entitlement: EntitlementLane,
}

/// Builds artifacts, re-checking coherence on the way.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactEmitter {
    generated_at: DateTime<Utc>,
}

impl Default for ArtifactEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactEmitter {
    /// Emitter stamping the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Emitter stamping a fixed time.
    pub fn at(generated_at: DateTime<Utc>) -> Self {
        Self { generated_at }
    }

    /// Assemble and check the artifact.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Coherence`] if the publication verdict
    /// contradicts its adequacy result or resampling presence, and
    /// [`ConfigError::InvalidPolicy`] if the entitlement lane came from a
    /// different policy table than the one recorded.
    pub fn emit(&self, record: RunRecord<'_>) -> Result<VerdictArtifact, EngineError> {
        let publication = &record.replay.publication;
        publication
            .verdict
            .check_coherence(publication.adequacy.as_ref())?;
        publication
            .verdict
            .check_resampling(publication.resampling.is_some())?;

        if record.entitlement.policy_version != record.policy.version() {
            return Err(ConfigError::InvalidPolicy {
                version: record.policy.version().to_string(),
                message: format!(
                    "entitlement lane was mapped with policy '{}'",
                    record.entitlement.policy_version
                ),
            }
            .into());
        }

        let publication = record.replay.publication;
        Ok(VerdictArtifact {
            schema_version: ARTIFACT_SCHEMA_VERSION.to_string(),
            run_id: record.run_id,
            generated_at: self
                .generated_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            seed: record.seed,
            iterations: record.iterations,
            profile: record.profile,
            policy_version: record.policy.version().to_string(),
            lane_matrix_version: record.lane_matrix.version().to_string(),
            fingerprints: Fingerprints {
                observations: record.observations_fingerprint,
                lane_matrix: record.lane_matrix.fingerprint().to_string(),
                policy: record.policy.fingerprint().to_string(),
            },
            statistic: publication.statistic,
            cohort: publication.cohort,
            adequacy: publication.adequacy.as_ref().map(AdequacySection::from),
            effect: publication.effect.as_ref().map(EffectSection::from),
            resampling: publication
                .resampling
                .as_ref()
                .map(|r| ResamplingSection::new(r, record.confidence_level)),
            stability: record.replay.diagnostics,
            verdict: publication.verdict,
            entitlement: record.entitlement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::entitlement::{ClaimContext, EntitlementLaneMapper, PolicyRegistry};
    use crate::stability::analyze;
    use chrono::TimeZone;
    use claimgate_core::{Observation, ObservationGroup, ObservationSet};

    fn set(b_len: usize) -> ObservationSet {
        let group = |name: &str, n: usize, offset: f64| {
            ObservationGroup::new(
                name,
                (0..n)
                    .map(|i| {
                        Observation::scalar(format!("{}-{}", name, i), offset + (i % 7) as f64)
                    })
                    .collect(),
            )
        };
        ObservationSet::new(group("a", 40, 30.0), group("b", b_len, 0.0))
    }

    fn emit(observations: &ObservationSet) -> Result<VerdictArtifact, EngineError> {
        let config = EngineConfig::new();
        let matrix = LaneMatrix::publication_only().unwrap();
        let registry = PolicyRegistry::builtin()?;
        let policy = registry.get("2")?;
        let replay = analyze(observations, &matrix, &config, 3, 200)?;
        let context = ClaimContext::new(
            &replay.publication.statistic,
            replay.publication.effect.as_ref(),
        );
        let entitlement = EntitlementLaneMapper::new(&registry).map(
            &replay.publication.verdict,
            &replay.diagnostics,
            "2",
            &context,
        )?;
        ArtifactEmitter::at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()).emit(RunRecord {
            run_id: "run-test".to_string(),
            seed: 3,
            iterations: 200,
            profile: None,
            confidence_level: config.inference.confidence_level,
            observations_fingerprint: "sha256:00".to_string(),
            lane_matrix: &matrix,
            policy,
            replay,
            entitlement,
        })
    }

    #[test]
    fn test_blocked_artifact_has_null_blocks() {
        let artifact = emit(&set(0)).unwrap();
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["verdict"]["status"], "BLOCKED_DATA_GEOMETRY");
        assert_eq!(json["verdict"]["status_reason"], "empty_group");
        assert!(json["adequacy"].is_null());
        assert!(json["resampling"].is_null());
        assert_eq!(json["entitlement"]["lane"], "BLOCKED");
    }

    #[test]
    fn test_conclusive_artifact_carries_schema_fields() {
        let artifact = emit(&set(40)).unwrap();
        assert_eq!(artifact.generated_at, "2024-05-01T12:00:00Z");
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["schema_version"], ARTIFACT_SCHEMA_VERSION);
        assert_eq!(json["verdict"]["status"], "CONCLUSIVE_POSITIVE");
        assert_eq!(json["adequacy"]["pass"], true);
        assert!(json["resampling"]["ci_lower"].as_f64().unwrap() > 0.0);
        assert_eq!(json["resampling"]["jackknife"]["sampling"], "exhaustive");
        assert_eq!(json["stability"]["robustness_class"], "ROBUST");
        assert_eq!(json["entitlement"]["lane"], "ALIGNED");
        assert_eq!(json["entitlement"]["rule_id"], "conclusive-robust");
        assert_eq!(json["policy_version"], "2");
        assert_eq!(json["lane_matrix_version"], "publication-only");
    }
}
