//! Error types.
//!
//! Only malformed input and incoherent verdicts are errors. Insufficient or
//! ambiguous data is a first-class verdict, never an `Err`.

use thiserror::Error;

use crate::types::Group;
use crate::verdict::{StatusReason, VerdictStatus};

/// Malformed observation input, detected before any computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// Neither group holds a single observation.
    #[error("observation set is empty: both groups have zero observations")]
    EmptyObservationSet,

    /// An observation has an empty source-unit identifier.
    #[error("observation {index} in {group} has an empty source_unit_id")]
    MissingSourceUnit {
        /// Group holding the observation.
        group: Group,
        /// 0-based index within the group.
        index: usize,
    },

    /// A scalar observation is NaN or infinite.
    #[error("observation {index} in {group} has a non-finite value")]
    NonFiniteValue {
        /// Group holding the observation.
        group: Group,
        /// 0-based index within the group.
        index: usize,
    },

    /// An identity observation is the empty string.
    #[error("observation {index} in {group} has an empty identity")]
    EmptyIdentity {
        /// Group holding the observation.
        group: Group,
        /// 0-based index within the group.
        index: usize,
    },

    /// Scalar and identity values are mixed in one observation set.
    #[error("observation set mixes scalar and identity values")]
    MixedValueKinds,

    /// The statistic cannot be computed on this kind of value.
    #[error("statistic '{statistic}' requires {expected} observations")]
    StatisticKindMismatch {
        /// Formula tag of the statistic.
        statistic: &'static str,
        /// Value kind the statistic needs.
        expected: &'static str,
    },
}

/// Malformed cohort handed to the adequacy gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CohortError {
    /// The cohort has no observations at all.
    #[error("cannot assess adequacy of an empty cohort")]
    Empty,
}

/// Adequacy thresholds that cannot be met meaningfully.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ThresholdError {
    /// The balance ratio lies outside [0, 1].
    #[error("min_balance_ratio must be in [0, 1], got {0}")]
    BalanceRatioOutOfRange(f64),

    /// More distinct source units than items are required.
    #[error("min_source_units_per_group ({units}) cannot exceed min_items_per_group ({items})")]
    UnitsExceedItems {
        /// Required distinct source units.
        units: usize,
        /// Required items.
        items: usize,
    },
}

/// A verdict whose status, reason and adequacy result contradict each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoherenceError {
    /// The reason code belongs to a different status.
    #[error("status reason '{reason}' cannot accompany status {status}")]
    ReasonStatusMismatch {
        /// Offending status.
        status: VerdictStatus,
        /// Offending reason.
        reason: StatusReason,
    },

    /// INCONCLUSIVE_UNDERPOWERED without a failed adequacy check.
    #[error("INCONCLUSIVE_UNDERPOWERED requires a failed adequacy check")]
    UnderpoweredWithoutFailure,

    /// A failed adequacy check mapped to something other than INCONCLUSIVE_UNDERPOWERED.
    #[error("failed adequacy check must map to INCONCLUSIVE_UNDERPOWERED, not {status}")]
    FailedAdequacyNotUnderpowered {
        /// Offending status.
        status: VerdictStatus,
    },

    /// Adequacy was evaluated for a block that precedes the adequacy gate.
    #[error("'{reason}' is decided before the adequacy gate; adequacy must not be evaluated")]
    AdequacyEvaluatedForGeometry {
        /// Offending reason.
        reason: StatusReason,
    },

    /// A status past the adequacy gate without an adequacy result.
    #[error("status {status} requires an evaluated adequacy check")]
    AdequacyMissing {
        /// Offending status.
        status: VerdictStatus,
    },

    /// A block or INCONCLUSIVE_UNDERPOWERED carrying a resampling result.
    #[error("status {status} cannot carry a resampling result")]
    UnexpectedResampling {
        /// Offending status.
        status: VerdictStatus,
    },

    /// A status decided from resampling without a resampling result.
    #[error("status {status} requires a resampling result")]
    MissingResampling {
        /// Offending status.
        status: VerdictStatus,
    },
}
