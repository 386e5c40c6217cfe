//! Observation model and cohort accounting.

use std::collections::{HashMap, HashSet};
use std::fmt;

use rand::seq::index;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Comparison group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    /// First group (e.g. "proximate-to-anchor").
    A,
    /// Second group (e.g. "not proximate").
    B,
}

impl Group {
    /// The other group.
    pub fn other(self) -> Group {
        match self {
            Group::A => Group::B,
            Group::B => Group::A,
        }
    }

    /// Stable label used in failure codes and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Group::A => "group_a",
            Group::B => "group_b",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single measured value: a number or a categorical identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationValue {
    /// Scalar measurement in its natural units.
    Scalar(f64),
    /// Categorical identity (e.g. the nearest-match candidate name).
    Identity(String),
}

impl ObservationValue {
    /// Kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            ObservationValue::Scalar(_) => ValueKind::Scalar,
            ObservationValue::Identity(_) => ValueKind::Identity,
        }
    }
}

/// Kind of the values in an observation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// All values are numbers.
    Scalar,
    /// All values are identities.
    Identity,
}

impl ValueKind {
    /// Human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Scalar => "scalar",
            ValueKind::Identity => "identity",
        }
    }
}

/// One measurement tagged with the source unit (line, page, ...) it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Source-unit identifier used for adequacy accounting.
    pub source_unit_id: String,
    /// The measured value.
    pub value: ObservationValue,
}

impl Observation {
    /// Scalar observation.
    pub fn scalar(source_unit_id: impl Into<String>, value: f64) -> Self {
        Self {
            source_unit_id: source_unit_id.into(),
            value: ObservationValue::Scalar(value),
        }
    }

    /// Identity observation.
    pub fn identity(source_unit_id: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            source_unit_id: source_unit_id.into(),
            value: ObservationValue::Identity(identity.into()),
        }
    }
}

/// A named, ordered sequence of observations belonging to one group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObservationGroup {
    /// Display name of the group.
    #[serde(default)]
    pub name: String,
    /// Observations in their original order.
    pub observations: Vec<Observation>,
}

impl ObservationGroup {
    /// Create a named group.
    pub fn new(name: impl Into<String>, observations: Vec<Observation>) -> Self {
        Self {
            name: name.into(),
            observations,
        }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the group has no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Scalar values in order, skipping identities.
    pub fn scalars(&self) -> Vec<f64> {
        self.observations
            .iter()
            .filter_map(|o| match o.value {
                ObservationValue::Scalar(x) => Some(x),
                ObservationValue::Identity(_) => None,
            })
            .collect()
    }

    /// Identity values in order, skipping scalars.
    pub fn identities(&self) -> Vec<&str> {
        self.observations
            .iter()
            .filter_map(|o| match &o.value {
                ObservationValue::Identity(s) => Some(s.as_str()),
                ObservationValue::Scalar(_) => None,
            })
            .collect()
    }
}

/// The two comparison groups of one run. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    group_a: ObservationGroup,
    group_b: ObservationGroup,
}

impl ObservationSet {
    /// Build a set from its two groups.
    pub fn new(group_a: ObservationGroup, group_b: ObservationGroup) -> Self {
        Self { group_a, group_b }
    }

    /// Access one group.
    pub fn group(&self, group: Group) -> &ObservationGroup {
        match group {
            Group::A => &self.group_a,
            Group::B => &self.group_b,
        }
    }

    /// Total number of observations across both groups.
    pub fn len(&self) -> usize {
        self.group_a.len() + self.group_b.len()
    }

    /// Whether both groups are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate the records and return the (homogeneous) value kind.
    ///
    /// Exactly one empty group is *not* an error here: that is a data
    /// geometry condition reported as a verdict.
    pub fn validate(&self) -> Result<ValueKind, InputError> {
        if self.is_empty() {
            return Err(InputError::EmptyObservationSet);
        }

        let mut kind: Option<ValueKind> = None;
        for group in [Group::A, Group::B] {
            for (index, obs) in self.group(group).observations.iter().enumerate() {
                if obs.source_unit_id.trim().is_empty() {
                    return Err(InputError::MissingSourceUnit { group, index });
                }
                match &obs.value {
                    ObservationValue::Scalar(x) if !x.is_finite() => {
                        return Err(InputError::NonFiniteValue { group, index });
                    }
                    ObservationValue::Identity(s) if s.is_empty() => {
                        return Err(InputError::EmptyIdentity { group, index });
                    }
                    _ => {}
                }
                match kind {
                    None => kind = Some(obs.value.kind()),
                    Some(k) if k != obs.value.kind() => return Err(InputError::MixedValueKinds),
                    Some(_) => {}
                }
            }
        }

        kind.ok_or(InputError::EmptyObservationSet)
    }

    /// The same observations with the group labels exchanged.
    pub fn swapped(&self) -> ObservationSet {
        ObservationSet {
            group_a: self.group_b.clone(),
            group_b: self.group_a.clone(),
        }
    }

    /// Keep at most `cap` observations per group.
    ///
    /// Over-cap groups are reduced to a uniform random subset drawn with a
    /// generator seeded from `seed`; the kept observations stay in their
    /// original order.
    pub fn with_size_cap(&self, cap: usize, seed: u64) -> ObservationSet {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut cap_group = |group: &ObservationGroup| -> ObservationGroup {
            if group.len() <= cap {
                return group.clone();
            }
            let mut keep = index::sample(&mut rng, group.len(), cap).into_vec();
            keep.sort_unstable();
            ObservationGroup {
                name: group.name.clone(),
                observations: keep.into_iter().map(|i| group.observations[i].clone()).collect(),
            }
        };
        let group_a = cap_group(&self.group_a);
        let group_b = cap_group(&self.group_b);
        ObservationSet { group_a, group_b }
    }
}

/// Derived counts for one group of a cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupProfile {
    /// Number of observations.
    pub size: usize,
    /// Number of distinct source units contributing observations.
    pub distinct_source_units: usize,
    /// Distinct identities observed in at least two distinct source units.
    /// Always zero for scalar observations.
    pub recurring_items: usize,
}

impl GroupProfile {
    fn from_group(group: &ObservationGroup) -> Self {
        let distinct_source_units = group
            .observations
            .iter()
            .map(|o| o.source_unit_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        let mut units_per_identity: HashMap<&str, HashSet<&str>> = HashMap::new();
        for obs in &group.observations {
            if let ObservationValue::Identity(id) = &obs.value {
                units_per_identity
                    .entry(id.as_str())
                    .or_default()
                    .insert(obs.source_unit_id.as_str());
            }
        }
        let recurring_items = units_per_identity.values().filter(|u| u.len() >= 2).count();

        Self {
            size: group.len(),
            distinct_source_units,
            recurring_items,
        }
    }
}

/// Partition of an observation set into two groups with derived counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    /// Counts for group A.
    pub group_a: GroupProfile,
    /// Counts for group B.
    pub group_b: GroupProfile,
    /// min(group sizes) / max(group sizes); 0 when a group is empty.
    pub balance_ratio: f64,
}

impl Cohort {
    /// Derive the cohort of an observation set.
    pub fn from_observations(set: &ObservationSet) -> Self {
        let group_a = GroupProfile::from_group(set.group(Group::A));
        let group_b = GroupProfile::from_group(set.group(Group::B));
        let max = group_a.size.max(group_b.size);
        let balance_ratio = if max == 0 {
            0.0
        } else {
            group_a.size.min(group_b.size) as f64 / max as f64
        };
        Self {
            group_a,
            group_b,
            balance_ratio,
        }
    }

    /// Profile of one group.
    pub fn profile(&self, group: Group) -> &GroupProfile {
        match group {
            Group::A => &self.group_a,
            Group::B => &self.group_b,
        }
    }

    /// Total number of observations.
    pub fn total_size(&self) -> usize {
        self.group_a.size + self.group_b.size
    }

    /// The first group (A before B) with zero members, if any.
    pub fn empty_group(&self) -> Option<Group> {
        [Group::A, Group::B]
            .into_iter()
            .find(|g| self.profile(*g).size == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_group(records: &[(&str, &str)]) -> ObservationGroup {
        ObservationGroup::new(
            "g",
            records
                .iter()
                .map(|(unit, id)| Observation::identity(*unit, *id))
                .collect(),
        )
    }

    #[test]
    fn test_validate_rejects_empty_set() {
        let set = ObservationSet::new(ObservationGroup::default(), ObservationGroup::default());
        assert_eq!(set.validate(), Err(InputError::EmptyObservationSet));
    }

    #[test]
    fn test_validate_allows_one_empty_group() {
        let set = ObservationSet::new(
            ObservationGroup::new("a", vec![Observation::scalar("p1", 1.0)]),
            ObservationGroup::default(),
        );
        assert_eq!(set.validate(), Ok(ValueKind::Scalar));
    }

    #[test]
    fn test_validate_rejects_mixed_kinds() {
        let set = ObservationSet::new(
            ObservationGroup::new("a", vec![Observation::scalar("p1", 1.0)]),
            ObservationGroup::new("b", vec![Observation::identity("p2", "x")]),
        );
        assert_eq!(set.validate(), Err(InputError::MixedValueKinds));
    }

    #[test]
    fn test_validate_rejects_non_finite_and_blank_units() {
        let set = ObservationSet::new(
            ObservationGroup::new("a", vec![Observation::scalar("p1", f64::NAN)]),
            ObservationGroup::new("b", vec![Observation::scalar("p2", 1.0)]),
        );
        assert_eq!(
            set.validate(),
            Err(InputError::NonFiniteValue {
                group: Group::A,
                index: 0
            })
        );

        let set = ObservationSet::new(
            ObservationGroup::new("a", vec![Observation::scalar("p1", 1.0)]),
            ObservationGroup::new("b", vec![Observation::scalar("  ", 1.0)]),
        );
        assert_eq!(
            set.validate(),
            Err(InputError::MissingSourceUnit {
                group: Group::B,
                index: 0
            })
        );
    }

    #[test]
    fn test_recurring_items_require_two_source_units() {
        let group = identity_group(&[
            ("line1", "alpha"),
            ("line1", "alpha"),
            ("line2", "beta"),
            ("line3", "beta"),
            ("line4", "gamma"),
        ]);
        let profile = GroupProfile::from_group(&group);
        assert_eq!(profile.size, 5);
        assert_eq!(profile.distinct_source_units, 4);
        // alpha appears twice but in one unit; only beta recurs
        assert_eq!(profile.recurring_items, 1);
    }

    #[test]
    fn test_balance_ratio() {
        let constant = |name: &str, n: usize| {
            ObservationGroup::new(
                name,
                (0..n)
                    .map(|i| Observation::scalar(format!("u{i}"), 1.0))
                    .collect(),
            )
        };
        let set = ObservationSet::new(constant("a", 10), constant("b", 40));
        let cohort = Cohort::from_observations(&set);
        assert!((cohort.balance_ratio - 0.25).abs() < 1e-12);
        assert_eq!(cohort.empty_group(), None);
    }

    #[test]
    fn test_size_cap_is_deterministic_and_order_preserving() {
        let group = ObservationGroup::new(
            "a",
            (0..100).map(|i| Observation::scalar(format!("u{i}"), i as f64)).collect(),
        );
        let set = ObservationSet::new(group.clone(), group);
        let capped1 = set.with_size_cap(20, 9);
        let capped2 = set.with_size_cap(20, 9);
        assert_eq!(capped1, capped2);
        let values = capped1.group(Group::A).scalars();
        assert_eq!(values.len(), 20);
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }
}
