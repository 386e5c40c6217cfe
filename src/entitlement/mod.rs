//! Claim-entitlement lanes.
//!
//! A verdict's status, together with the robustness class and disagreement
//! scope of its lane-matrix replay, selects a rule from a versioned policy
//! table. The rule fixes the closure state, the literal claim text that is
//! licensed or forbidden, and the conditions under which the lane must be
//! re-evaluated.

mod mapper;
mod policy;

pub use mapper::{ClaimContext, EntitlementLane, EntitlementLaneMapper};
pub use policy::{
    ClosureState, PolicyRegistry, PolicyRule, PolicyTable, StatusPattern, CLAIM_PLACEHOLDERS,
};
