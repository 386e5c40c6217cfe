//! Error types for the engine surface.
//!
//! Every error here is raised before an artifact exists; no partial
//! artifact is ever produced.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use claimgate_core::{CoherenceError, CohortError, InputError, ThresholdError};

use crate::data::DataError;

/// Invalid or missing configuration, detected before any resampling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A configuration document is not valid JSON for its schema.
    #[error("failed to parse {what}: {source}")]
    Parse {
        /// Which document failed.
        what: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A threshold or policy value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The adequacy thresholds contradict each other or are out of range.
    #[error("invalid adequacy thresholds: {0}")]
    Thresholds(#[from] ThresholdError),

    /// No policy table is registered under the requested version.
    #[error("unknown policy version '{0}'")]
    UnknownPolicyVersion(String),

    /// A policy table is malformed or does not cover every key.
    #[error("policy table '{version}' is invalid: {message}")]
    InvalidPolicy {
        /// Version of the offending table.
        version: String,
        /// What is wrong with it.
        message: String,
    },

    /// The lane matrix violates its registration rules.
    #[error("lane matrix is invalid: {0}")]
    InvalidLaneMatrix(String),
}

/// Any error surfaced by [`crate::VerdictEngine::run`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed observations.
    #[error(transparent)]
    Input(#[from] InputError),

    /// Malformed cohort.
    #[error(transparent)]
    Cohort(#[from] CohortError),

    /// Invalid configuration, policy or lane matrix.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Observation file could not be loaded.
    #[error(transparent)]
    Data(#[from] DataError),

    /// A verdict failed its coherence check.
    #[error("incoherent verdict: {0}")]
    Coherence(#[from] CoherenceError),

    /// The artifact could not be serialized.
    #[error("failed to serialize artifact: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl EngineError {
    /// Whether the error stems from the caller's input or configuration.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            EngineError::Input(_)
                | EngineError::Cohort(_)
                | EngineError::Config(_)
                | EngineError::Data(_)
        )
    }
}
