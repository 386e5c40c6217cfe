//! Registered lane matrices.
//!
//! A lane matrix is the pre-registered list of perturbations a verdict is
//! replayed under. It is validated and fingerprinted when loaded and is
//! immutable afterwards; the fingerprint is recorded in every artifact so a
//! reader can tell whether two runs used the same registration.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use claimgate_core::{ObservationSet, Statistic, ValueKind};

use crate::error::ConfigError;
use crate::provenance::fingerprint;

/// The lane matrix shipped with the engine.
pub const DEFAULT_LANE_MATRIX_JSON: &str = include_str!("../../lanes/default_lane_matrix.json");

/// Whether a lane bears on closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaneClass {
    /// Closure-bearing.
    Entitlement,
    /// Monitoring only.
    Diagnostic,
    /// Intentionally adversarial; monitoring only.
    Stress,
}

impl LaneClass {
    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            LaneClass::Entitlement => "ENTITLEMENT",
            LaneClass::Diagnostic => "DIAGNOSTIC",
            LaneClass::Stress => "STRESS",
        }
    }

    /// Whether disagreement in this lane can restrict closure.
    pub fn is_closure_bearing(self) -> bool {
        self == LaneClass::Entitlement
    }
}

impl fmt::Display for LaneClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered perturbation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaneDefinition {
    /// Unique lane identifier.
    pub lane_id: String,
    /// Closure role.
    pub lane_class: LaneClass,
    /// Resampling seed; `None` inherits the run seed.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Per-group size cap; over-cap groups are subsampled.
    #[serde(default)]
    pub cohort_size_cap: Option<usize>,
    /// Statistic override; `None` uses the configured statistic.
    #[serde(default)]
    pub method_variant: Option<Statistic>,
    /// Whether this is the publication lane.
    #[serde(default)]
    pub publication: bool,
}

impl LaneDefinition {
    /// Publication lane that inherits everything from the run.
    pub fn publication(lane_id: impl Into<String>) -> Self {
        Self {
            lane_id: lane_id.into(),
            lane_class: LaneClass::Entitlement,
            seed: None,
            cohort_size_cap: None,
            method_variant: None,
            publication: true,
        }
    }

    /// Seed this lane resamples with.
    pub fn resolve_seed(&self, run_seed: u64) -> u64 {
        self.seed.unwrap_or(run_seed)
    }

    /// Statistic this lane estimates.
    pub fn resolve_statistic(&self, configured: &Statistic) -> Statistic {
        self.method_variant.clone().unwrap_or_else(|| configured.clone())
    }

    /// Observations this lane sees.
    pub fn apply_cap(&self, set: &ObservationSet, run_seed: u64) -> ObservationSet {
        match self.cohort_size_cap {
            Some(cap) => set.with_size_cap(cap, self.resolve_seed(run_seed)),
            None => set.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LaneMatrixDocument {
    version: String,
    lanes: Vec<LaneDefinition>,
}

/// A validated, immutable lane matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneMatrix {
    version: String,
    lanes: Vec<LaneDefinition>,
    publication: usize,
    fingerprint: String,
}

impl LaneMatrix {
    /// Validate and seal a lane list.
    ///
    /// # Errors
    ///
    /// The list must be non-empty with unique ids and exactly one
    /// publication lane, which must be an ENTITLEMENT lane; caps must be
    /// positive.
    pub fn new(
        version: impl Into<String>,
        lanes: Vec<LaneDefinition>,
    ) -> Result<Self, ConfigError> {
        let version = version.into();
        let invalid = |msg: String| Err(ConfigError::InvalidLaneMatrix(msg));

        if version.trim().is_empty() {
            return invalid("version must not be empty".to_string());
        }
        if lanes.is_empty() {
            return invalid("at least one lane is required".to_string());
        }

        let mut seen = HashSet::new();
        for lane in &lanes {
            if lane.lane_id.trim().is_empty() {
                return invalid("lane_id must not be empty".to_string());
            }
            if !seen.insert(lane.lane_id.as_str()) {
                return invalid(format!("duplicate lane_id '{}'", lane.lane_id));
            }
            if lane.cohort_size_cap == Some(0) {
                return invalid(format!("lane '{}' has a zero cohort_size_cap", lane.lane_id));
            }
        }

        let publication: Vec<usize> = lanes
            .iter()
            .enumerate()
            .filter(|(_, lane)| lane.publication)
            .map(|(i, _)| i)
            .collect();
        let publication = match publication.as_slice() {
            [single] => *single,
            [] => return invalid("no publication lane".to_string()),
            _ => return invalid(format!("{} publication lanes, expected one", publication.len())),
        };
        if lanes[publication].lane_class != LaneClass::Entitlement {
            return invalid(format!(
                "publication lane '{}' must be ENTITLEMENT",
                lanes[publication].lane_id
            ));
        }

        let document = LaneMatrixDocument { version, lanes };
        let fingerprint =
            fingerprint(&document).map_err(|e| ConfigError::InvalidLaneMatrix(e.to_string()))?;

        Ok(Self {
            version: document.version,
            lanes: document.lanes,
            publication,
            fingerprint,
        })
    }

    /// A matrix holding only a publication lane.
    pub fn publication_only() -> Result<Self, ConfigError> {
        Self::new(
            "publication-only",
            vec![LaneDefinition::publication("publication")],
        )
    }

    /// The lane matrix shipped with the engine.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json_str(DEFAULT_LANE_MATRIX_JSON)
    }

    /// Parse and validate a lane-matrix document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let doc: LaneMatrixDocument =
            serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
                what: "lane matrix".to_string(),
                source,
            })?;
        Self::new(doc.version, doc.lanes)
    }

    /// Read, parse and validate a lane-matrix file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Registered version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Lanes in registration order.
    pub fn lanes(&self) -> &[LaneDefinition] {
        &self.lanes
    }

    /// Index of the publication lane.
    pub fn publication_index(&self) -> usize {
        self.publication
    }

    /// The publication lane.
    pub fn publication(&self) -> &LaneDefinition {
        &self.lanes[self.publication]
    }

    /// Content fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Fail if any lane's statistic cannot run on `kind` observations.
    pub fn check_compatibility(
        &self,
        configured: &Statistic,
        kind: ValueKind,
    ) -> Result<(), ConfigError> {
        for lane in &self.lanes {
            let statistic = lane.resolve_statistic(configured);
            if statistic.check_kind(kind).is_err() {
                return Err(ConfigError::InvalidLaneMatrix(format!(
                    "lane '{}' uses {} which cannot run on {} observations",
                    lane.lane_id,
                    statistic,
                    kind.as_str()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(id: &str, class: LaneClass, publication: bool) -> LaneDefinition {
        LaneDefinition {
            lane_id: id.to_string(),
            lane_class: class,
            seed: None,
            cohort_size_cap: None,
            method_variant: None,
            publication,
        }
    }

    #[test]
    fn test_builtin_matrix_is_valid() {
        let matrix = LaneMatrix::builtin().unwrap();
        assert!(matrix.publication().publication);
        assert_eq!(matrix.publication().lane_class, LaneClass::Entitlement);
        assert!(matrix.fingerprint().starts_with("sha256:"));
        assert!(matrix.lanes().len() > 1);
    }

    #[test]
    fn test_publication_only_is_fingerprinted() {
        let matrix = LaneMatrix::publication_only().unwrap();
        assert_eq!(matrix.lanes().len(), 1);
        assert!(matrix.fingerprint().starts_with("sha256:"));
        assert_eq!(
            matrix.fingerprint(),
            LaneMatrix::publication_only().unwrap().fingerprint()
        );
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = LaneMatrix::new(
            "t",
            vec![
                lane("a", LaneClass::Entitlement, true),
                lane("a", LaneClass::Diagnostic, false),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate lane_id 'a'"));
    }

    #[test]
    fn test_requires_exactly_one_entitlement_publication_lane() {
        assert!(LaneMatrix::new("t", vec![lane("a", LaneClass::Entitlement, false)]).is_err());
        assert!(LaneMatrix::new(
            "t",
            vec![
                lane("a", LaneClass::Entitlement, true),
                lane("b", LaneClass::Entitlement, true)
            ]
        )
        .is_err());
        assert!(LaneMatrix::new("t", vec![lane("a", LaneClass::Stress, true)]).is_err());
        assert!(LaneMatrix::new("t", vec![]).is_err());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = LaneMatrix::new("t", vec![lane("a", LaneClass::Entitlement, true)]).unwrap();
        let b = LaneMatrix::new("t", vec![lane("a", LaneClass::Entitlement, true)]).unwrap();
        let mut changed = lane("a", LaneClass::Entitlement, true);
        changed.seed = Some(9);
        let c = LaneMatrix::new("t", vec![changed]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_incompatible_method_variant() {
        let mut variant = lane("median", LaneClass::Diagnostic, false);
        variant.method_variant = Some(Statistic::MedianDifference);
        let matrix = LaneMatrix::new(
            "t",
            vec![lane("pub", LaneClass::Entitlement, true), variant],
        )
        .unwrap();
        let rank = Statistic::RankPosition {
            target: "x".to_string(),
        };
        assert!(matrix.check_compatibility(&rank, ValueKind::Identity).is_err());
        assert!(matrix
            .check_compatibility(&Statistic::MeanDifference, ValueKind::Scalar)
            .is_ok());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let raw = r#"{ "version": "1", "lanes": [
            { "lane_id": "p", "lane_class": "ENTITLEMENT", "publication": true, "weight": 2 }
        ]}"#;
        assert!(matches!(
            LaneMatrix::from_json_str(raw),
            Err(ConfigError::Parse { .. })
        ));
    }
}
