//! Verdict-to-lane mapping.

use serde::{Deserialize, Serialize};
use tracing::debug;

use claimgate_core::{EffectEstimate, Statistic, Verdict};

use crate::error::ConfigError;
use crate::stability::StabilityDiagnostics;

use super::policy::{ClosureState, PolicyRegistry};

/// Values substituted into claim templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimContext {
    /// Formula tag of the publication statistic.
    pub statistic: String,
    /// Leading identity (rank statistics) or effect direction.
    pub top_identity: String,
}

impl ClaimContext {
    /// Context for a publication run.
    pub fn new(statistic: &Statistic, effect: Option<&EffectEstimate>) -> Self {
        Self {
            statistic: statistic.formula_tag().to_string(),
            top_identity: effect
                .map(|e| e.identity_label())
                .unwrap_or_else(|| "none".to_string()),
        }
    }
}

/// The claim-entitlement lane a verdict lands in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementLane {
    /// Closure state.
    pub lane: ClosureState,
    /// Policy rule that produced this lane.
    pub rule_id: String,
    /// Policy table version.
    pub policy_version: String,
    /// Machine-readable residual reason.
    pub residual_reason: String,
    /// Licensed claim text.
    pub allowed_claim: String,
    /// Forbidden claim text.
    pub disallowed_claim: String,
    /// Conditions under which the lane must be re-evaluated.
    pub reopen_triggers: Vec<String>,
}

/// Looks verdicts up in a policy registry.
#[derive(Debug, Clone, Copy)]
pub struct EntitlementLaneMapper<'a> {
    registry: &'a PolicyRegistry,
}

impl<'a> EntitlementLaneMapper<'a> {
    /// Mapper over `registry`.
    pub fn new(registry: &'a PolicyRegistry) -> Self {
        Self { registry }
    }

    /// Map a verdict and its stability diagnostics onto a lane.
    ///
    /// The first rule of the `policy_version` table whose key matches
    /// wins; claim templates are rendered with `context`.
    pub fn map(
        &self,
        verdict: &Verdict,
        diagnostics: &StabilityDiagnostics,
        policy_version: &str,
        context: &ClaimContext,
    ) -> Result<EntitlementLane, ConfigError> {
        let table = self.registry.get(policy_version)?;
        let status = verdict.status();
        let robustness = diagnostics.robustness_class;
        let scope = diagnostics.disagreement_scope;

        let rule = table
            .lookup(status, robustness, scope)
            .ok_or_else(|| ConfigError::InvalidPolicy {
                version: policy_version.to_string(),
                message: format!("no rule covers ({}, {}, {})", status, robustness, scope),
            })?;
        debug!(
            rule = %rule.rule_id,
            %status,
            %robustness,
            %scope,
            lane = %rule.lane,
            "entitlement rule matched"
        );

        let render = |template: &str| {
            template
                .replace("{status}", status.as_str())
                .replace("{statistic}", &context.statistic)
                .replace("{top_identity}", &context.top_identity)
        };

        Ok(EntitlementLane {
            lane: rule.lane,
            rule_id: rule.rule_id.clone(),
            policy_version: table.version().to_string(),
            residual_reason: rule.residual_reason.clone(),
            allowed_claim: render(&rule.allowed_claim),
            disallowed_claim: render(&rule.disallowed_claim),
            reopen_triggers: rule.reopen_triggers.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stability::{DisagreementScope, RobustnessClass};
    use claimgate_core::verdict::block_geometry;
    use claimgate_core::{AdequacyResult, StatusReason, VerdictStatus};

    fn diagnostics(robustness: RobustnessClass, scope: DisagreementScope) -> StabilityDiagnostics {
        StabilityDiagnostics {
            agreement_ratio: 1.0,
            entitlement_agreement_ratio: 1.0,
            identity_flip_rate: 0.0,
            rank_flip_rate: None,
            rank_stability: None,
            top2_flip_rate: None,
            min_margin_to_runner_up: None,
            robustness_class: robustness,
            disagreement_scope: scope,
            lanes: vec![],
        }
    }

    fn passing() -> AdequacyResult {
        AdequacyResult {
            pass: true,
            failed: vec![],
        }
    }

    fn context() -> ClaimContext {
        ClaimContext {
            statistic: "mean_difference".to_string(),
            top_identity: "above_zero".to_string(),
        }
    }

    fn positive() -> Verdict {
        Verdict::new(
            VerdictStatus::ConclusivePositive,
            StatusReason::EffectAboveZero,
            Some(&passing()),
        )
        .unwrap()
    }

    #[test]
    fn test_robust_conclusive_is_aligned() {
        let registry = PolicyRegistry::builtin().unwrap();
        let lane = EntitlementLaneMapper::new(&registry)
            .map(
                &positive(),
                &diagnostics(RobustnessClass::Robust, DisagreementScope::None),
                "2",
                &context(),
            )
            .unwrap();
        assert_eq!(lane.lane, ClosureState::Aligned);
        assert_eq!(lane.rule_id, "conclusive-robust");
        assert_eq!(lane.policy_version, "2");
        assert!(lane.allowed_claim.contains("CONCLUSIVE_POSITIVE on mean_difference"));
        assert!(lane.allowed_claim.contains("above_zero"));
        assert!(!lane.allowed_claim.contains('{'));
    }

    #[test]
    fn test_mixed_lanes_depend_on_scope() {
        let registry = PolicyRegistry::builtin().unwrap();
        let mapper = EntitlementLaneMapper::new(&registry);
        let map = |scope| {
            mapper
                .map(
                    &positive(),
                    &diagnostics(RobustnessClass::Mixed, scope),
                    "1",
                    &context(),
                )
                .unwrap()
                .lane
        };
        assert_eq!(map(DisagreementScope::DiagnosticOnly), ClosureState::Qualified);
        assert_eq!(map(DisagreementScope::Entitlement), ClosureState::Bounded);
    }

    #[test]
    fn test_blocked_and_inconclusive_ignore_stability() {
        let registry = PolicyRegistry::builtin().unwrap();
        let mapper = EntitlementLaneMapper::new(&registry);
        let blocked = block_geometry(StatusReason::EmptyGroup).unwrap();
        let ambiguous = Verdict::new(
            VerdictStatus::InconclusiveAmbiguity,
            StatusReason::CiSpansZero,
            Some(&passing()),
        )
        .unwrap();

        for version in ["1", "2"] {
            for robustness in RobustnessClass::ALL {
                for scope in DisagreementScope::ALL {
                    let d = diagnostics(robustness, scope);
                    let b = mapper.map(&blocked, &d, version, &context()).unwrap();
                    let a = mapper.map(&ambiguous, &d, version, &context()).unwrap();
                    assert_eq!(b.lane, ClosureState::Blocked);
                    assert_eq!(a.lane, ClosureState::Inconclusive);
                }
            }
        }
    }

    #[test]
    fn test_unknown_policy_version_fails() {
        let registry = PolicyRegistry::builtin().unwrap();
        let err = EntitlementLaneMapper::new(&registry)
            .map(
                &positive(),
                &diagnostics(RobustnessClass::Robust, DisagreementScope::None),
                "0",
                &context(),
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPolicyVersion(_)));
    }
}
