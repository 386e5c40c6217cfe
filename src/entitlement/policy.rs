//! Versioned entitlement policy tables.
//!
//! A policy table is data: an ordered list of rules keyed by verdict
//! status, robustness class and disagreement scope. Revising policy means
//! adding a new table version, never editing the mapper.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use claimgate_core::VerdictStatus;

use crate::error::ConfigError;
use crate::provenance::fingerprint;
use crate::stability::{DisagreementScope, RobustnessClass};

const POLICY_V1_JSON: &str = include_str!("../../policy/entitlement_policy_v1.json");
const POLICY_V2_JSON: &str = include_str!("../../policy/entitlement_policy_v2.json");

/// Placeholders a claim template may reference.
pub const CLAIM_PLACEHOLDERS: [&str; 3] = ["status", "statistic", "top_identity"];

/// Closure state of an entitlement lane, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosureState {
    /// The verdict may be stated without qualification.
    Aligned,
    /// The verdict may be stated with the diagnostic caveats attached.
    Qualified,
    /// Only the publication-lane result may be stated, bounded by its caveats.
    Bounded,
    /// Nothing may be claimed.
    Blocked,
    /// Neither presence nor absence may be claimed.
    Inconclusive,
}

impl ClosureState {
    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            ClosureState::Aligned => "ALIGNED",
            ClosureState::Qualified => "QUALIFIED",
            ClosureState::Bounded => "BOUNDED",
            ClosureState::Blocked => "BLOCKED",
            ClosureState::Inconclusive => "INCONCLUSIVE",
        }
    }
}

impl fmt::Display for ClosureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status selector: an exact status or a prefix glob such as `CONCLUSIVE_*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StatusPattern {
    /// Exactly this status.
    Exact(VerdictStatus),
    /// Every status whose name starts with the prefix.
    Prefix(String),
}

impl StatusPattern {
    /// Whether `status` is selected.
    pub fn matches(&self, status: VerdictStatus) -> bool {
        match self {
            StatusPattern::Exact(exact) => *exact == status,
            StatusPattern::Prefix(prefix) => status.as_str().starts_with(prefix.as_str()),
        }
    }
}

impl TryFrom<String> for StatusPattern {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.strip_suffix('*') {
            Some(prefix) => {
                if prefix.contains('*') {
                    return Err(format!("status pattern '{}' has more than one '*'", raw));
                }
                if !VerdictStatus::ALL
                    .iter()
                    .any(|s| s.as_str().starts_with(prefix))
                {
                    return Err(format!("status pattern '{}' selects no status", raw));
                }
                Ok(StatusPattern::Prefix(prefix.to_string()))
            }
            None => raw.parse().map(StatusPattern::Exact),
        }
    }
}

impl From<StatusPattern> for String {
    fn from(pattern: StatusPattern) -> Self {
        pattern.to_string()
    }
}

impl fmt::Display for StatusPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusPattern::Exact(status) => f.write_str(status.as_str()),
            StatusPattern::Prefix(prefix) => write!(f, "{}*", prefix),
        }
    }
}

/// One row of a policy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRule {
    /// Unique rule identifier, recorded in the artifact.
    pub rule_id: String,
    /// Statuses this rule applies to.
    pub status: StatusPattern,
    /// Robustness class; `None` matches any.
    #[serde(default)]
    pub robustness: Option<RobustnessClass>,
    /// Disagreement scope; `None` matches any.
    #[serde(default)]
    pub scope: Option<DisagreementScope>,
    /// Resulting closure state.
    pub lane: ClosureState,
    /// Machine-readable residual reason.
    pub residual_reason: String,
    /// Claim template that is licensed.
    pub allowed_claim: String,
    /// Claim template that is forbidden.
    pub disallowed_claim: String,
    /// Conditions under which the lane must be re-evaluated.
    pub reopen_triggers: Vec<String>,
}

impl PolicyRule {
    /// Whether this rule covers the key.
    pub fn matches(
        &self,
        status: VerdictStatus,
        robustness: RobustnessClass,
        scope: DisagreementScope,
    ) -> bool {
        self.status.matches(status)
            && self.robustness.map_or(true, |r| r == robustness)
            && self.scope.map_or(true, |s| s == scope)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDocument {
    policy_version: String,
    rules: Vec<PolicyRule>,
}

/// A validated policy table.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    version: String,
    rules: Vec<PolicyRule>,
    fingerprint: String,
}

impl PolicyTable {
    /// Validate and seal a rule list.
    ///
    /// # Errors
    ///
    /// Rejects empty tables, blank or duplicate rule ids, templates with
    /// unknown placeholders, and tables that leave any
    /// (status, robustness, scope) key without a matching rule.
    pub fn new(version: impl Into<String>, rules: Vec<PolicyRule>) -> Result<Self, ConfigError> {
        let version = version.into();
        let invalid = |message: String| ConfigError::InvalidPolicy {
            version: version.clone(),
            message,
        };

        if version.trim().is_empty() {
            return Err(invalid("policy_version must not be empty".to_string()));
        }
        if rules.is_empty() {
            return Err(invalid("at least one rule is required".to_string()));
        }

        let mut seen = HashSet::new();
        for rule in &rules {
            if rule.rule_id.trim().is_empty() {
                return Err(invalid("rule_id must not be empty".to_string()));
            }
            if !seen.insert(rule.rule_id.as_str()) {
                return Err(invalid(format!("duplicate rule_id '{}'", rule.rule_id)));
            }
            for template in [&rule.allowed_claim, &rule.disallowed_claim] {
                check_placeholders(template).map_err(|name| {
                    invalid(format!(
                        "rule '{}' uses unknown placeholder '{{{}}}'",
                        rule.rule_id, name
                    ))
                })?;
            }
        }

        for status in VerdictStatus::ALL {
            for robustness in RobustnessClass::ALL {
                for scope in DisagreementScope::ALL {
                    if !rules.iter().any(|r| r.matches(status, robustness, scope)) {
                        return Err(invalid(format!(
                            "no rule covers ({}, {}, {})",
                            status, robustness, scope
                        )));
                    }
                }
            }
        }

        let document = PolicyDocument {
            policy_version: version,
            rules,
        };
        let fingerprint = fingerprint(&document).map_err(|e| ConfigError::InvalidPolicy {
            version: document.policy_version.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            version: document.policy_version,
            rules: document.rules,
            fingerprint,
        })
    }

    /// Parse and validate a policy document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let doc: PolicyDocument = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            what: "policy table".to_string(),
            source,
        })?;
        Self::new(doc.policy_version, doc.rules)
    }

    /// Read, parse and validate a policy file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Table version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Content fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// First rule covering the key.
    pub fn lookup(
        &self,
        status: VerdictStatus,
        robustness: RobustnessClass,
        scope: DisagreementScope,
    ) -> Option<&PolicyRule> {
        self.rules
            .iter()
            .find(|r| r.matches(status, robustness, scope))
    }
}

/// Returns the first unknown placeholder name, if any.
fn check_placeholders(template: &str) -> Result<(), String> {
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            return Err(after.to_string());
        };
        let name = &after[..close];
        if !CLAIM_PLACEHOLDERS.contains(&name) {
            return Err(name.to_string());
        }
        rest = &after[close + 1..];
    }
    Ok(())
}

/// Policy tables by version.
///
/// Loaded once at startup; lookups of an unregistered version fail before
/// any resampling work is done.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    tables: BTreeMap<String, PolicyTable>,
}

impl PolicyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tables.
    pub fn builtin() -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for raw in [POLICY_V1_JSON, POLICY_V2_JSON] {
            registry.register(PolicyTable::from_json_str(raw)?)?;
        }
        Ok(registry)
    }

    /// Add a table. Versions are write-once.
    pub fn register(&mut self, table: PolicyTable) -> Result<(), ConfigError> {
        if self.tables.contains_key(table.version()) {
            return Err(ConfigError::InvalidPolicy {
                version: table.version().to_string(),
                message: "version is already registered".to_string(),
            });
        }
        self.tables.insert(table.version().to_string(), table);
        Ok(())
    }

    /// Table for `version`.
    pub fn get(&self, version: &str) -> Result<&PolicyTable, ConfigError> {
        self.tables
            .get(version)
            .ok_or_else(|| ConfigError::UnknownPolicyVersion(version.to_string()))
    }

    /// Registered versions, sorted.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}
