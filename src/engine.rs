//! `VerdictEngine` entry point and builder.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use claimgate_core::constants::{DEFAULT_ITERATIONS, DEFAULT_SEED};
use claimgate_core::ObservationSet;

use crate::config::{EngineConfig, Profile};
use crate::entitlement::{ClaimContext, EntitlementLaneMapper, PolicyRegistry, PolicyTable};
use crate::error::EngineError;
use crate::output::{ArtifactEmitter, RunRecord, VerdictArtifact};
use crate::provenance::{fingerprint, run_id};
use crate::stability::{analyze, LaneMatrix};

/// Main entry point for verdict runs.
///
/// Use the builder pattern to configure a run, then call
/// [`run`](Self::run) with the observations.
///
/// # Example
///
/// ```ignore
/// use claimgate::{Profile, VerdictEngine};
///
/// let artifact = VerdictEngine::new()
///     .seed(42)
///     .profile(Profile::Smoke)
///     .run(&observations)?;
/// println!("{}", artifact.verdict);
/// ```
#[derive(Debug, Clone)]
pub struct VerdictEngine {
    config: Arc<EngineConfig>,
    seed: u64,
    iterations: Option<usize>,
    profile: Option<Profile>,
    lane_matrix: Option<LaneMatrix>,
    policies: Option<PolicyRegistry>,
    generated_at: Option<DateTime<Utc>>,
}

impl Default for VerdictEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdictEngine {
    /// Create with the default configuration, lane matrix and policy tables.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create with an explicit configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            seed: DEFAULT_SEED,
            iterations: None,
            profile: None,
            lane_matrix: None,
            policies: None,
            generated_at: None,
        }
    }

    /// Set the run seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the bootstrap and permutation iteration count.
    ///
    /// Takes precedence over [`profile`](Self::profile).
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn iterations(mut self, n: usize) -> Self {
        assert!(n > 0, "iterations must be > 0");
        self.iterations = Some(n);
        self
    }

    /// Take the iteration count from a profile.
    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Replace the built-in lane matrix.
    pub fn lane_matrix(mut self, matrix: LaneMatrix) -> Self {
        self.lane_matrix = Some(matrix);
        self
    }

    /// Replace the built-in policy registry.
    pub fn policy_registry(mut self, registry: PolicyRegistry) -> Self {
        self.policies = Some(registry);
        self
    }

    /// Stamp artifacts with a fixed time instead of the current time.
    pub fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Iteration count a run will use.
    pub fn effective_iterations(&self) -> usize {
        self.iterations
            .or_else(|| self.profile.map(Profile::iterations))
            .unwrap_or(DEFAULT_ITERATIONS)
    }

    /// Run the engine on an observation set.
    ///
    /// Configuration, policy version, lane matrix and observations are all
    /// validated before any resampling; a failure there returns an error and
    /// no artifact. Past validation every outcome, including blocked and
    /// inconclusive ones, is an `Ok` artifact.
    pub fn run(&self, observations: &ObservationSet) -> Result<VerdictArtifact, EngineError> {
        let config = self.config.as_ref();
        config.validate()?;

        let lane_matrix = match &self.lane_matrix {
            Some(matrix) => matrix.clone(),
            None => LaneMatrix::builtin()?,
        };
        let registry = match &self.policies {
            Some(registry) => registry.clone(),
            None => PolicyRegistry::builtin()?,
        };
        let policy: &PolicyTable = registry.get(&config.policy_version)?;

        let kind = observations.validate()?;
        config.statistic.check_kind(kind)?;
        lane_matrix.check_compatibility(&config.statistic, kind)?;

        let iterations = self.effective_iterations();
        let observations_fp = fingerprint(observations).map_err(EngineError::Serialize)?;
        let run_id = run_id(
            &observations_fp,
            lane_matrix.fingerprint(),
            policy.fingerprint(),
            self.seed,
            iterations,
        );

        info!(
            %run_id,
            seed = self.seed,
            iterations,
            statistic = %config.statistic,
            policy_version = policy.version(),
            lanes = lane_matrix.lanes().len(),
            "verdict run started"
        );

        let replay = analyze(observations, &lane_matrix, config, self.seed, iterations)?;
        let context = ClaimContext::new(
            &replay.publication.statistic,
            replay.publication.effect.as_ref(),
        );
        let entitlement = EntitlementLaneMapper::new(&registry).map(
            &replay.publication.verdict,
            &replay.diagnostics,
            policy.version(),
            &context,
        )?;

        let emitter = self
            .generated_at
            .map(ArtifactEmitter::at)
            .unwrap_or_default();
        let artifact = emitter.emit(RunRecord {
            run_id,
            seed: self.seed,
            iterations,
            profile: if self.iterations.is_some() {
                None
            } else {
                self.profile
            },
            confidence_level: config.inference.confidence_level,
            observations_fingerprint: observations_fp,
            lane_matrix: &lane_matrix,
            policy,
            replay,
            entitlement,
        })?;

        info!(
            run_id = %artifact.run_id,
            status = %artifact.verdict.status(),
            reason = %artifact.verdict.status_reason(),
            robustness = %artifact.stability.robustness_class,
            lane = %artifact.entitlement.lane,
            "verdict run finished"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use claimgate_core::{InputError, Observation, ObservationGroup, Statistic};

    fn scalar_set() -> ObservationSet {
        let group = |name: &str| {
            ObservationGroup::new(
                name,
                (0..40)
                    .map(|i| Observation::scalar(format!("{}-{}", name, i), i as f64))
                    .collect(),
            )
        };
        ObservationSet::new(group("a"), group("b"))
    }

    #[test]
    fn test_iteration_precedence() {
        assert_eq!(VerdictEngine::new().effective_iterations(), DEFAULT_ITERATIONS);
        assert_eq!(
            VerdictEngine::new().profile(Profile::Smoke).effective_iterations(),
            200
        );
        assert_eq!(
            VerdictEngine::new()
                .profile(Profile::Deep)
                .iterations(50)
                .effective_iterations(),
            50
        );
    }

    #[test]
    #[should_panic(expected = "iterations must be > 0")]
    fn test_zero_iterations_panics() {
        let _ = VerdictEngine::new().iterations(0);
    }

    #[test]
    fn test_unknown_policy_version_fails_before_resampling() {
        let engine =
            VerdictEngine::with_config(EngineConfig::new().policy_version("7")).iterations(10);
        let err = engine.run(&scalar_set()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::UnknownPolicyVersion(ref v)) if v == "7"
        ));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_statistic_kind_mismatch_is_an_input_error() {
        let config = EngineConfig::new().statistic(Statistic::RankPosition {
            target: "x".to_string(),
        });
        let err = VerdictEngine::with_config(config)
            .iterations(10)
            .run(&scalar_set())
            .unwrap_err();
        assert!(matches!(err, EngineError::Input(_)));
    }

    #[test]
    fn test_empty_set_is_an_input_error() {
        let set = ObservationSet::new(ObservationGroup::default(), ObservationGroup::default());
        let err = VerdictEngine::new().iterations(10).run(&set).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Input(InputError::EmptyObservationSet)
        ));
    }

    #[test]
    fn test_explicit_iterations_drop_profile() {
        let artifact = VerdictEngine::new()
            .profile(Profile::Smoke)
            .iterations(30)
            .lane_matrix(LaneMatrix::publication_only().unwrap())
            .run(&scalar_set())
            .unwrap();
        assert_eq!(artifact.iterations, 30);
        assert_eq!(artifact.profile, None);
    }
}
