//! Engine configuration.
//!
//! One [`EngineConfig`] is loaded (or built) per process, validated, and
//! then shared read-only by every component of a run. Iteration counts are
//! not part of it: they come from the invocation, optionally via a
//! [`Profile`], and never influence thresholds.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use claimgate_core::constants::{
    DEFAULT_CONFIDENCE_LEVEL, DEFAULT_JACKKNIFE_FOLD_CAP, DEFAULT_MIN_JACKKNIFE_STABILITY,
    DEFAULT_SIGNIFICANCE_LEVEL,
};
use claimgate_core::resampling::ResamplingConfig;
use claimgate_core::{AdequacyThresholds, Statistic, VerdictPolicy};

use crate::error::ConfigError;

/// Policy version used when none is configured.
pub const DEFAULT_POLICY_VERSION: &str = "2";

/// Default agreement ratio below which a lane matrix is FRAGILE.
pub const DEFAULT_FRAGILE_AGREEMENT_FLOOR: f64 = 0.5;

/// Inferential thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InferencePolicy {
    /// Permutation p-value must be strictly below this. In (0, 1).
    pub significance_level: f64,

    /// Confidence level of the bootstrap interval. In (0, 1).
    pub confidence_level: f64,

    /// Half-width of the equivalence region that licenses CONCLUSIVE_NEGATIVE.
    #[serde(default)]
    pub null_effect_bar: Option<f64>,

    /// Minimum leave-one-out agreement for CONCLUSIVE_POSITIVE. In [0, 1].
    pub min_jackknife_stability: f64,
}

impl Default for InferencePolicy {
    fn default() -> Self {
        Self {
            significance_level: DEFAULT_SIGNIFICANCE_LEVEL,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            null_effect_bar: None,
            min_jackknife_stability: DEFAULT_MIN_JACKKNIFE_STABILITY,
        }
    }
}

/// Resampling limits that are part of policy rather than invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResamplingPolicy {
    /// Maximum number of leave-one-out folds evaluated.
    pub jackknife_fold_cap: usize,
}

impl Default for ResamplingPolicy {
    fn default() -> Self {
        Self {
            jackknife_fold_cap: DEFAULT_JACKKNIFE_FOLD_CAP,
        }
    }
}

/// Lane-matrix aggregation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StabilityPolicy {
    /// Agreement ratio strictly below this is FRAGILE. In [0, 1].
    pub fragile_agreement_floor: f64,
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        Self {
            fragile_agreement_floor: DEFAULT_FRAGILE_AGREEMENT_FLOOR,
        }
    }
}

/// Complete, validated engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Entitlement policy table version.
    pub policy_version: String,

    /// Statistic estimated by the publication lane.
    pub statistic: Statistic,

    /// Adequacy gate thresholds.
    pub adequacy: AdequacyThresholds,

    /// Inferential thresholds.
    pub inference: InferencePolicy,

    /// Resampling limits.
    pub resampling: ResamplingPolicy,

    /// Lane-matrix aggregation thresholds.
    pub stability: StabilityPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy_version: DEFAULT_POLICY_VERSION.to_string(),
            statistic: Statistic::MeanDifference,
            adequacy: AdequacyThresholds::default(),
            inference: InferencePolicy::default(),
            resampling: ResamplingPolicy::default(),
            stability: StabilityPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// Every threshold field is required; a missing one is an error rather
    /// than a silent default.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            what: "engine configuration".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the entitlement policy version.
    pub fn policy_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        assert!(!version.trim().is_empty(), "policy_version must not be empty");
        self.policy_version = version;
        self
    }

    /// Set the statistic.
    pub fn statistic(mut self, statistic: Statistic) -> Self {
        self.statistic = statistic;
        self
    }

    /// Set the adequacy thresholds.
    pub fn adequacy(mut self, thresholds: AdequacyThresholds) -> Self {
        if let Err(err) = thresholds.validate() {
            panic!("invalid adequacy thresholds: {}", err);
        }
        self.adequacy = thresholds;
        self
    }

    /// Set the significance level.
    pub fn significance_level(mut self, alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha < 1.0, "significance_level must be in (0, 1)");
        self.inference.significance_level = alpha;
        self
    }

    /// Set the bootstrap confidence level.
    pub fn confidence_level(mut self, level: f64) -> Self {
        assert!(level > 0.0 && level < 1.0, "confidence_level must be in (0, 1)");
        self.inference.confidence_level = level;
        self
    }

    /// Set the null-effect bar that licenses CONCLUSIVE_NEGATIVE.
    pub fn null_effect_bar(mut self, bar: f64) -> Self {
        assert!(bar.is_finite() && bar > 0.0, "null_effect_bar must be positive and finite");
        self.inference.null_effect_bar = Some(bar);
        self
    }

    /// Set the minimum jackknife stability.
    pub fn min_jackknife_stability(mut self, stability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&stability),
            "min_jackknife_stability must be in [0, 1]"
        );
        self.inference.min_jackknife_stability = stability;
        self
    }

    /// Set the jackknife fold cap.
    pub fn jackknife_fold_cap(mut self, cap: usize) -> Self {
        assert!(cap > 0, "jackknife_fold_cap must be positive");
        self.resampling.jackknife_fold_cap = cap;
        self
    }

    /// Set the FRAGILE agreement floor.
    pub fn fragile_agreement_floor(mut self, floor: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&floor),
            "fragile_agreement_floor must be in [0, 1]"
        );
        self.stability.fragile_agreement_floor = floor;
        self
    }

    // =========================================================================
    // Resolution methods
    // =========================================================================

    /// Verdict policy for the classifier.
    pub fn verdict_policy(&self) -> VerdictPolicy {
        VerdictPolicy {
            significance_level: self.inference.significance_level,
            null_effect_bar: self.inference.null_effect_bar,
            min_jackknife_stability: self.inference.min_jackknife_stability,
        }
    }

    /// Resampling configuration for a run of `iterations`.
    pub fn resampling_config(&self, iterations: usize) -> ResamplingConfig {
        ResamplingConfig {
            iterations,
            confidence_level: self.inference.confidence_level,
            jackknife_fold_cap: self.resampling.jackknife_fold_cap,
        }
    }

    /// Check that every threshold is meaningful.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.policy_version.trim().is_empty() {
            return invalid("policy_version must not be empty");
        }
        self.adequacy.validate()?;

        let inf = &self.inference;
        if !(inf.significance_level > 0.0 && inf.significance_level < 1.0) {
            return invalid("significance_level must be in (0, 1)");
        }
        if !(inf.confidence_level > 0.0 && inf.confidence_level < 1.0) {
            return invalid("confidence_level must be in (0, 1)");
        }
        if let Some(bar) = inf.null_effect_bar {
            if !(bar.is_finite() && bar > 0.0) {
                return invalid("null_effect_bar must be positive and finite");
            }
        }
        if !(0.0..=1.0).contains(&inf.min_jackknife_stability) {
            return invalid("min_jackknife_stability must be in [0, 1]");
        }
        if self.resampling.jackknife_fold_cap == 0 {
            return invalid("jackknife_fold_cap must be positive");
        }
        if !(0.0..=1.0).contains(&self.stability.fragile_agreement_floor) {
            return invalid("fragile_agreement_floor must be in [0, 1]");
        }
        Ok(())
    }
}

/// Preset iteration counts. Profiles never change thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Fast sanity run: 200 iterations.
    Smoke,
    /// Default: 2,000 iterations.
    #[default]
    Standard,
    /// Publication-grade: 10,000 iterations.
    Deep,
}

impl Profile {
    /// Bootstrap and permutation iterations for this profile.
    pub fn iterations(self) -> usize {
        match self {
            Profile::Smoke => 200,
            Profile::Standard => 2_000,
            Profile::Deep => 10_000,
        }
    }

    /// Stable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Smoke => "smoke",
            Profile::Standard => "standard",
            Profile::Deep => "deep",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smoke" => Ok(Profile::Smoke),
            "standard" => Ok(Profile::Standard),
            "deep" => Ok(Profile::Deep),
            other => Err(format!(
                "unknown profile '{}' (expected smoke, standard or deep)",
                other
            )),
        }
    }
}
