//! Effect estimation: the point statistic a verdict is about.
//!
//! Every estimator exposes a signed *test statistic* whose null value is
//! zero. The resampling engine works exclusively with that statistic:
//!
//! | Statistic             | Design    | Reported value        | Test statistic            |
//! |-----------------------|-----------|-----------------------|---------------------------|
//! | `mean_difference`     | two-group | mean(A) − mean(B)     | same                      |
//! | `median_difference`   | two-group | median(A) − median(B) | same                      |
//! | `rank_position`       | two-group | 1-indexed target rank | target margin over runner-up |
//! | `pearson_correlation` | paired    | r(A, B)               | same                      |
//!
//! All estimators are deterministic pure functions of their inputs.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::ZERO_TOLERANCE;
use crate::error::InputError;
use crate::statistics::{compute_median, mean, pearson_correlation};
use crate::types::{Group, ObservationSet, ObservationValue, ValueKind};

/// The statistic a run estimates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statistic {
    /// Difference of group means. With 0/1 indicator values this is the rate difference.
    MeanDifference,
    /// Difference of group medians (Type 2).
    MedianDifference,
    /// Position of `target` in the nearest-match ranking of identities.
    RankPosition {
        /// Identity whose rank is reported.
        target: String,
    },
    /// Pearson correlation of the two groups paired by position.
    PearsonCorrelation,
}

impl Statistic {
    /// Formula tag recorded in the artifact.
    pub fn formula_tag(&self) -> &'static str {
        match self {
            Statistic::MeanDifference => "mean-difference",
            Statistic::MedianDifference => "median-difference",
            Statistic::RankPosition { .. } => "rank-position",
            Statistic::PearsonCorrelation => "pearson-correlation",
        }
    }

    /// Value kind the statistic consumes.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Statistic::RankPosition { .. } => ValueKind::Identity,
            _ => ValueKind::Scalar,
        }
    }

    /// Sampling design the statistic implies.
    pub fn design(&self) -> Design {
        match self {
            Statistic::PearsonCorrelation => Design::Paired,
            _ => Design::TwoGroup,
        }
    }

    /// Fail if the statistic cannot run on values of `kind`.
    pub fn check_kind(&self, kind: ValueKind) -> Result<(), InputError> {
        if self.value_kind() == kind {
            Ok(())
        } else {
            Err(InputError::StatisticKindMismatch {
                statistic: self.formula_tag(),
                expected: self.value_kind().as_str(),
            })
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::RankPosition { target } => write!(f, "rank-position({})", target),
            other => f.write_str(other.formula_tag()),
        }
    }
}

/// How the two groups relate for resampling purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Design {
    /// Independent groups: resample each group, permute labels.
    TwoGroup,
    /// Position-paired groups: resample pairs, permute the pairing.
    Paired,
}

/// Sign of an effect relative to its null value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Strictly above zero.
    AboveZero,
    /// Strictly below zero.
    BelowZero,
    /// Indistinguishable from zero.
    Zero,
}

impl Direction {
    /// Direction of a test statistic.
    pub fn of(x: f64) -> Direction {
        if x > ZERO_TOLERANCE {
            Direction::AboveZero
        } else if x < -ZERO_TOLERANCE {
            Direction::BelowZero
        } else {
            Direction::Zero
        }
    }

    /// Stable label.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::AboveZero => "above_zero",
            Direction::BelowZero => "below_zero",
            Direction::Zero => "zero",
        }
    }
}

/// What a leave-one-out estimate must share with the full-sample estimate
/// to count as agreeing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgreementKey {
    /// Same sign of the test statistic.
    Direction(Direction),
    /// Same top-ranked identity (interned index).
    Identity(u32),
}

/// Ranking details for rank-type statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSummary {
    /// The identity whose rank is reported.
    pub target: String,
    /// 1-indexed rank of the target.
    pub target_rank: usize,
    /// Top-ranked identity.
    pub top_identity: String,
    /// Second-ranked identity, if any.
    pub runner_up: Option<String>,
    /// Score of the top identity minus score of the second. With a single
    /// candidate the runner-up score is taken as 0.
    pub margin_to_runner_up: f64,
    /// Number of ranked candidates.
    pub candidates: usize,
}

/// Point estimate of the effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectEstimate {
    /// Formula tag (e.g. "mean-difference").
    pub statistic_name: String,
    /// Reported value in the natural units of the statistic.
    pub value: f64,
    /// Signed statistic used for inference; zero under the null.
    pub test_statistic: f64,
    /// Sign of the test statistic.
    pub direction: Direction,
    /// Ranking details (rank-position only).
    pub ranking: Option<RankingSummary>,
}

impl EffectEstimate {
    fn scalar(tag: &'static str, value: f64) -> Self {
        Self {
            statistic_name: tag.to_string(),
            value,
            test_statistic: value,
            direction: Direction::of(value),
            ranking: None,
        }
    }

    /// Identity used for flip-rate comparisons: the top-ranked identity for
    /// rank statistics, the effect direction otherwise.
    pub fn identity_label(&self) -> String {
        match &self.ranking {
            Some(r) => r.top_identity.clone(),
            None => self.direction.as_str().to_string(),
        }
    }

    /// The two leading identities (rank statistics only).
    pub fn leading_pair(&self) -> Option<(String, Option<String>)> {
        self.ranking
            .as_ref()
            .map(|r| (r.top_identity.clone(), r.runner_up.clone()))
    }
}

/// A deterministic estimator over two groups of items.
pub trait Estimator: Sync {
    /// Element type of the groups.
    type Item: Copy + Send + Sync;

    /// Formula tag.
    fn formula_tag(&self) -> &'static str;

    /// Sampling design.
    fn design(&self) -> Design;

    /// Signed test statistic, or `None` where it is undefined.
    fn test_statistic(&self, a: &[Self::Item], b: &[Self::Item]) -> Option<f64>;

    /// Full point estimate, or `None` where it is undefined.
    fn estimate(&self, a: &[Self::Item], b: &[Self::Item]) -> Option<EffectEstimate> {
        self.test_statistic(a, b)
            .map(|t| EffectEstimate::scalar(self.formula_tag(), t))
    }

    /// Key a leave-one-out estimate must share with the full estimate.
    fn agreement_key(&self, a: &[Self::Item], b: &[Self::Item]) -> Option<AgreementKey> {
        self.test_statistic(a, b)
            .map(|t| AgreementKey::Direction(Direction::of(t)))
    }

    /// Label-independent total order on items, used to build canonical pools.
    fn canonical_cmp(&self, x: &Self::Item, y: &Self::Item) -> Ordering;
}

/// Estimators over scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarEstimator {
    /// mean(A) − mean(B)
    MeanDifference,
    /// median(A) − median(B)
    MedianDifference,
    /// r(A, B), paired by position
    PearsonCorrelation,
}

impl Estimator for ScalarEstimator {
    type Item = f64;

    fn formula_tag(&self) -> &'static str {
        match self {
            ScalarEstimator::MeanDifference => "mean-difference",
            ScalarEstimator::MedianDifference => "median-difference",
            ScalarEstimator::PearsonCorrelation => "pearson-correlation",
        }
    }

    fn design(&self) -> Design {
        match self {
            ScalarEstimator::PearsonCorrelation => Design::Paired,
            _ => Design::TwoGroup,
        }
    }

    fn test_statistic(&self, a: &[f64], b: &[f64]) -> Option<f64> {
        match self {
            ScalarEstimator::MeanDifference => Some(mean(a)? - mean(b)?),
            ScalarEstimator::MedianDifference => {
                let mut buffer = Vec::with_capacity(a.len().max(b.len()));
                let ma = compute_median(a, &mut buffer)?;
                let mb = compute_median(b, &mut buffer)?;
                Some(ma - mb)
            }
            ScalarEstimator::PearsonCorrelation => pearson_correlation(a, b),
        }
    }

    fn canonical_cmp(&self, x: &f64, y: &f64) -> Ordering {
        x.total_cmp(y)
    }
}

/// Nearest-match ranking estimator over interned identities.
///
/// Each candidate's score is its rate in group A minus its rate in group B.
/// Candidates are ordered by descending score; ties go to the lowest
/// first-appearance index (group A before group B, then record order).
/// The test statistic is the target's own score; the reported value is its
/// 1-indexed rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankPosition {
    target: u32,
    names: Vec<String>,
}

impl RankPosition {
    /// Interned index of the target.
    pub fn target(&self) -> u32 {
        self.target
    }

    /// Name of an interned identity.
    pub fn name(&self, id: u32) -> &str {
        &self.names[id as usize]
    }

    /// Number of interned identities, including the target.
    pub fn universe(&self) -> usize {
        self.names.len()
    }

    fn scores(&self, a: &[u32], b: &[u32]) -> (Vec<f64>, Vec<bool>) {
        let k = self.names.len();
        let mut count_a = vec![0usize; k];
        let mut count_b = vec![0usize; k];
        for &id in a {
            count_a[id as usize] += 1;
        }
        for &id in b {
            count_b[id as usize] += 1;
        }
        let rate = |count: usize, n: usize| if n == 0 { 0.0 } else { count as f64 / n as f64 };
        let scores = (0..k)
            .map(|i| rate(count_a[i], a.len()) - rate(count_b[i], b.len()))
            .collect();
        let present = (0..k)
            .map(|i| count_a[i] + count_b[i] > 0 || i as u32 == self.target)
            .collect();
        (scores, present)
    }

    /// Ranked candidate ids with their scores.
    pub fn ranking(&self, a: &[u32], b: &[u32]) -> Vec<(u32, f64)> {
        let (scores, present) = self.scores(a, b);
        let mut ranked: Vec<(u32, f64)> = (0..self.names.len() as u32)
            .filter(|&i| present[i as usize])
            .map(|i| (i, scores[i as usize]))
            .collect();
        // Stable sort keeps ascending first-appearance order among equal scores
        ranked.sort_by(|x, y| y.1.total_cmp(&x.1));
        ranked
    }

    /// Enrichment of the target: its rate in A minus its rate in B.
    ///
    /// Swapping the groups negates it exactly, which the ranking margin does
    /// not guarantee because the best other candidate can change.
    pub fn target_score(&self, a: &[u32], b: &[u32]) -> f64 {
        let target = self.target;
        let rate = |items: &[u32]| {
            if items.is_empty() {
                0.0
            } else {
                items.iter().filter(|&&id| id == target).count() as f64 / items.len() as f64
            }
        };
        rate(a) - rate(b)
    }
}

impl Estimator for RankPosition {
    type Item = u32;

    fn formula_tag(&self) -> &'static str {
        "rank-position"
    }

    fn design(&self) -> Design {
        Design::TwoGroup
    }

    fn test_statistic(&self, a: &[u32], b: &[u32]) -> Option<f64> {
        if a.is_empty() && b.is_empty() {
            return None;
        }
        Some(self.target_score(a, b))
    }

    fn estimate(&self, a: &[u32], b: &[u32]) -> Option<EffectEstimate> {
        if a.is_empty() && b.is_empty() {
            return None;
        }
        let ranked = self.ranking(a, b);
        let target_rank = ranked.iter().position(|(id, _)| *id == self.target)? + 1;
        let (top_id, top_score) = *ranked.first()?;
        let runner_up = ranked.get(1).copied();
        let score = self.target_score(a, b);

        Some(EffectEstimate {
            statistic_name: self.formula_tag().to_string(),
            value: target_rank as f64,
            test_statistic: score,
            direction: Direction::of(score),
            ranking: Some(RankingSummary {
                target: self.name(self.target).to_string(),
                target_rank,
                top_identity: self.name(top_id).to_string(),
                runner_up: runner_up.map(|(id, _)| self.name(id).to_string()),
                margin_to_runner_up: runner_up.map_or(top_score, |(_, s)| top_score - s),
                candidates: ranked.len(),
            }),
        })
    }

    fn agreement_key(&self, a: &[u32], b: &[u32]) -> Option<AgreementKey> {
        self.ranking(a, b)
            .first()
            .map(|(id, _)| AgreementKey::Identity(*id))
    }

    fn canonical_cmp(&self, x: &u32, y: &u32) -> Ordering {
        self.name(*x).cmp(self.name(*y))
    }
}

/// Observations converted into the estimator's item type, ready for
/// estimation and resampling.
#[derive(Debug, Clone)]
pub enum PreparedSample {
    /// Scalar observations.
    Scalar {
        /// Estimator.
        estimator: ScalarEstimator,
        /// Group A values in order.
        a: Vec<f64>,
        /// Group B values in order.
        b: Vec<f64>,
    },
    /// Identity observations.
    Ranked {
        /// Estimator with its interned identity table.
        estimator: RankPosition,
        /// Group A identities in order.
        a: Vec<u32>,
        /// Group B identities in order.
        b: Vec<u32>,
    },
}

impl PreparedSample {
    /// Convert an observation set for `statistic`.
    ///
    /// # Errors
    ///
    /// Fails if the observations are malformed or of the wrong kind for the
    /// statistic.
    pub fn prepare(statistic: &Statistic, set: &ObservationSet) -> Result<Self, InputError> {
        let kind = set.validate()?;
        statistic.check_kind(kind)?;

        let sample = match statistic {
            Statistic::MeanDifference => Self::scalar(ScalarEstimator::MeanDifference, set),
            Statistic::MedianDifference => Self::scalar(ScalarEstimator::MedianDifference, set),
            Statistic::PearsonCorrelation => Self::scalar(ScalarEstimator::PearsonCorrelation, set),
            Statistic::RankPosition { target } => {
                let mut names: Vec<String> = Vec::new();
                let mut index: HashMap<String, u32> = HashMap::new();
                let mut intern = |name: &str| -> u32 {
                    if let Some(&id) = index.get(name) {
                        return id;
                    }
                    let id = names.len() as u32;
                    names.push(name.to_string());
                    index.insert(name.to_string(), id);
                    id
                };
                let mut groups: [Vec<u32>; 2] = [Vec::new(), Vec::new()];
                for (slot, group) in [Group::A, Group::B].into_iter().enumerate() {
                    for obs in &set.group(group).observations {
                        if let ObservationValue::Identity(name) = &obs.value {
                            groups[slot].push(intern(name));
                        }
                    }
                }
                let target = intern(target);
                let [a, b] = groups;
                PreparedSample::Ranked {
                    estimator: RankPosition { target, names },
                    a,
                    b,
                }
            }
        };
        Ok(sample)
    }

    fn scalar(estimator: ScalarEstimator, set: &ObservationSet) -> Self {
        PreparedSample::Scalar {
            estimator,
            a: set.group(Group::A).scalars(),
            b: set.group(Group::B).scalars(),
        }
    }

    /// Sampling design.
    pub fn design(&self) -> Design {
        match self {
            PreparedSample::Scalar { estimator, .. } => estimator.design(),
            PreparedSample::Ranked { estimator, .. } => estimator.design(),
        }
    }

    /// Group sizes (A, B).
    pub fn group_sizes(&self) -> (usize, usize) {
        match self {
            PreparedSample::Scalar { a, b, .. } => (a.len(), b.len()),
            PreparedSample::Ranked { a, b, .. } => (a.len(), b.len()),
        }
    }

    /// Full-sample point estimate, or `None` if the statistic is undefined.
    pub fn estimate(&self) -> Option<EffectEstimate> {
        match self {
            PreparedSample::Scalar { estimator, a, b } => estimator.estimate(a, b),
            PreparedSample::Ranked { estimator, a, b } => estimator.estimate(a, b),
        }
    }
}
