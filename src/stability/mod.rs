//! Stability analysis over a registered lane matrix.
//!
//! The publication verdict is replayed under every registered lane
//! (seed, cohort-size cap, method variant) and the per-lane verdicts are
//! aggregated into fragility diagnostics. ENTITLEMENT lanes bear on
//! closure; DIAGNOSTIC and STRESS lanes are monitoring only.

mod analyzer;
mod lanes;

pub use analyzer::{
    analyze, summarize, DisagreementScope, LaneOutcome, LaneReplay, RobustnessClass,
    StabilityDiagnostics,
};
pub use lanes::{LaneClass, LaneDefinition, LaneMatrix, DEFAULT_LANE_MATRIX_JSON};
