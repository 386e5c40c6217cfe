//! Core statistics for confirmatory verdicts.
//!
//! This crate holds the pure, I/O-free parts of the verdict engine:
//! the observation model, the adequacy gate, effect estimators, the
//! resampling engine and the verdict classifier. Everything here is a
//! deterministic function of its inputs and an explicit seed.
//!
//! # Features
//!
//! - `parallel` (default in the `claimgate` crate): run resampling
//!   iterations on the rayon thread pool. Results are bit-identical with
//!   and without it.
//!
//! # Usage
//!
//! This crate is typically used through the main `claimgate` crate, which
//! adds configuration, lane replays, entitlement mapping and artifacts.
//!
//! ```ignore
//! use claimgate_core::{
//!     adequacy, effect::{PreparedSample, Statistic},
//!     resampling::{resample, ResamplingConfig},
//!     verdict::{classify, VerdictPolicy},
//!     types::{Cohort, ObservationSet},
//! };
//! ```

pub mod adequacy;
pub mod constants;
pub mod effect;
pub mod error;
pub mod resampling;
pub mod statistics;
pub mod types;
pub mod verdict;

// Re-export commonly used items at crate root
pub use adequacy::{AdequacyResult, AdequacyThresholds, FailedThreshold};
pub use effect::{Design, Direction, EffectEstimate, Estimator, PreparedSample, Statistic};
pub use error::{CoherenceError, CohortError, InputError, ThresholdError};
pub use resampling::{ConfidenceInterval, ResamplingConfig, ResamplingResult};
pub use types::{Cohort, Group, Observation, ObservationGroup, ObservationSet, ValueKind};
pub use verdict::{StatusReason, Verdict, VerdictPolicy, VerdictStatus};
