//! # claimgate
//!
//! Confirmatory statistical verdicts mapped onto bounded claim-entitlement
//! lanes.
//!
//! Given two groups of observations, the engine produces:
//! - An adequacy check of the cohort
//! - A point estimate of the configured effect statistic
//! - A bootstrap confidence interval, a permutation p-value and a jackknife
//!   stability score
//! - A verdict from a closed status set
//! - Fragility diagnostics over a registered lane matrix
//! - The entitlement lane that bounds what may be claimed
//!
//! All of it is written into one [`VerdictArtifact`].
//!
//! ## Determinism
//!
//! Every random draw derives from the caller-supplied seed. Re-running with
//! the same seed, observations, lane matrix and policy version reproduces
//! the artifact exactly, except for `generated_at`.
//!
//! ## Quick Start
//!
//! ```ignore
//! use claimgate::{data, Profile, VerdictEngine};
//!
//! let observations = data::load_observations("observations.json")?;
//! let artifact = VerdictEngine::new()
//!     .seed(42)
//!     .profile(Profile::Standard)
//!     .run(&observations)?;
//!
//! println!("{} -> {}", artifact.verdict, artifact.entitlement.lane);
//! ```
//!
//! Inconclusive and blocked outcomes are artifacts, not errors. An `Err`
//! means the input or configuration was rejected before any computation.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod engine;
mod error;
mod pipeline;
mod provenance;

// Functional modules
pub mod data;
pub mod entitlement;
pub mod output;
pub mod stability;

// Re-exports for public API
pub use config::{
    EngineConfig, InferencePolicy, Profile, ResamplingPolicy, StabilityPolicy,
    DEFAULT_FRAGILE_AGREEMENT_FLOOR, DEFAULT_POLICY_VERSION,
};
pub use engine::VerdictEngine;
pub use entitlement::{ClosureState, EntitlementLane, EntitlementLaneMapper, PolicyRegistry};
pub use error::{ConfigError, EngineError};
pub use output::{ArtifactEmitter, VerdictArtifact};
pub use pipeline::{run_pipeline, RunOutcome};
pub use provenance::{fingerprint, run_id};
pub use stability::{
    DisagreementScope, LaneClass, LaneDefinition, LaneMatrix, RobustnessClass,
    StabilityDiagnostics,
};

pub use claimgate_core::{
    AdequacyResult, AdequacyThresholds, Cohort, EffectEstimate, Group, Observation,
    ObservationGroup, ObservationSet, ResamplingResult, Statistic, StatusReason, ValueKind,
    Verdict, VerdictStatus,
};
