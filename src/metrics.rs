//! Metric evaluators for connections and references.
//!
//! Two nodes are scored with up to three factors, then combined:
//!
//! | Factor | Formula | Used by |
//! |--------|---------|---------|
//! | [`proximity`] | `1 / \|w1 - w2\|` | connections |
//! | frequency | `1 - meanAbsDiff(v1, v2)` or identical-concept ratio | both |
//! | [`recency`] | `1 / \|t1 - t2\|`, `max_recency` if equal | both |
//!
//! ```text
//! connection = blend(proximity) * blend(frequency) * blend(recency)
//! reference  =                    blend(frequency) * blend(recency)
//!
//! blend(x)   = (1 - w) + x * w
//! ```
//!
//! A blend weight of `1.0` uses the factor as-is, `0.0` removes it. With a
//! positive weight each combined metric is strictly increasing in every factor
//! while the others are held positive.
//!
//! # Flat vs. subgraph aggregation
//!
//! Every node carries `aggregate_vector`/`aggregate_time` sums filled in when
//! it was merged. [`AggregationMode::Flat`] divides those by `subgraph_size`.
//! [`AggregationMode::Subgraph`] instead walks the leaves currently reachable
//! through `children`, which differs once reference resolution has spliced
//! older subtrees in.
//!
//! # Calibration
//!
//! No weight or threshold here has been calibrated. [`CalibrationStats`]
//! collects the observed range of every factor so callers can tune them.

use std::collections::HashSet;

use ndarray::Array1;

use crate::config::{AggregationMode, FrequencyMode, MetricConfig};
use crate::graph::{ConceptStore, NodeId};

/// Proximity of two word positions: `1 / |w1 - w2|`.
///
/// Callers guarantee `w1 != w2` (adjacent ranges never share a position).
pub fn proximity(w1: f64, w2: f64) -> f64 {
    1.0 / (w1 - w2).abs()
}

/// Recency of two concept times: `1 / |t1 - t2|`, or `max_recency` if equal.
pub fn recency(t1: f64, t2: f64, max_recency: f64) -> f64 {
    let diff = (t1 - t2).abs();
    if diff == 0.0 {
        max_recency
    } else {
        1.0 / diff
    }
}

/// Mean absolute element-wise difference.
pub fn mean_abs_diff(a: &Array1<f32>, b: &Array1<f32>) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let total: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from((x - y).abs()))
        .sum();
    total / a.len() as f64
}

/// Vector similarity: `1 - meanAbsDiff(a, b)`.
pub fn vector_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f64 {
    1.0 - mean_abs_diff(a, b)
}

/// Apply a blend weight: `(1 - w) + value * w`.
pub fn blend(value: f64, weight: f64) -> f64 {
    (1.0 - weight) + value * weight
}

/// `blend(p) * blend(f) * blend(r)`.
pub fn connection_metric(proximity: f64, frequency: f64, recency: f64, config: &MetricConfig) -> f64 {
    blend(proximity, config.proximity_weight)
        * blend(frequency, config.frequency_weight)
        * blend(recency, config.recency_weight)
}

/// `blend(f) * blend(r)`.
pub fn reference_metric(frequency: f64, recency: f64, config: &MetricConfig) -> f64 {
    blend(frequency, config.frequency_weight) * blend(recency, config.recency_weight)
}

/// Mean vector of the leaves reachable from `id`.
pub fn subgraph_vector(store: &ConceptStore, id: NodeId) -> Option<Array1<f32>> {
    let leaves = store.reachable_leaves(id);
    let mut iter = leaves.iter().filter_map(|&l| store.get(l));
    let first = iter.next()?.vector.clone();
    let sum = iter.fold(first, |acc, n| acc + &n.vector);
    Some(sum / leaves.len() as f32)
}

/// Mean concept time of the leaves reachable from `id`.
pub fn subgraph_time(store: &ConceptStore, id: NodeId) -> f64 {
    let leaves = store.reachable_leaves(id);
    if leaves.is_empty() {
        return 0.0;
    }
    let total: f64 = leaves
        .iter()
        .filter_map(|&l| store.get(l))
        .map(|n| n.aggregate_time)
        .sum();
    total / leaves.len() as f64
}

/// Identical-concept frequency of `current` against a historical `candidate`.
///
/// Walks the nodes under `current` that belong to `sentence_index`; for each,
/// counts lemma matches among the nodes under `candidate` that do not. The
/// total is divided by the number of `current`-side nodes visited.
pub fn identical_concepts(
    store: &ConceptStore,
    current: NodeId,
    candidate: NodeId,
    sentence_index: usize,
) -> f64 {
    let mut matches = 0usize;
    let mut traversed = 0usize;
    let mut visited = HashSet::new();
    let mut stack = vec![current];

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(node) = store.get(id) else {
            continue;
        };
        traversed += 1;
        matches += count_lemma(store, &node.lemma, candidate, sentence_index);
        stack.extend(
            node.children
                .iter()
                .copied()
                .filter(|&c| store.get(c).is_some_and(|n| n.sentence_index == sentence_index)),
        );
    }

    if traversed == 0 {
        0.0
    } else {
        matches as f64 / traversed as f64
    }
}

fn count_lemma(store: &ConceptStore, lemma: &str, root: NodeId, sentence_index: usize) -> usize {
    let mut count = 0;
    let mut visited = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(node) = store.get(id) else {
            continue;
        };
        if node.lemma == lemma {
            count += 1;
        }
        stack.extend(
            node.children
                .iter()
                .copied()
                .filter(|&c| store.get(c).is_some_and(|n| n.sentence_index != sentence_index)),
        );
    }
    count
}

/// The three factors and their combination for one evaluated pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Factors {
    /// Proximity factor (1.0 for references).
    pub proximity: f64,
    /// Frequency factor.
    pub frequency: f64,
    /// Recency factor.
    pub recency: f64,
    /// Combined metric.
    pub metric: f64,
}

/// Scores node pairs against one store and sentence.
#[derive(Debug, Clone, Copy)]
pub struct MetricEvaluator<'a> {
    store: &'a ConceptStore,
    config: &'a MetricConfig,
    sentence_index: usize,
}

impl<'a> MetricEvaluator<'a> {
    /// Create an evaluator for the sentence `sentence_index`.
    pub fn new(store: &'a ConceptStore, config: &'a MetricConfig, sentence_index: usize) -> Self {
        Self {
            store,
            config,
            sentence_index,
        }
    }

    /// Frequency factor between two nodes.
    pub fn frequency(&self, n1: NodeId, n2: NodeId, mode: FrequencyMode) -> f64 {
        match mode {
            FrequencyMode::VectorSimilarity(AggregationMode::Flat) => {
                vector_similarity(&self.store[n1].vector, &self.store[n2].vector)
            }
            FrequencyMode::VectorSimilarity(AggregationMode::Subgraph) => {
                match (
                    subgraph_vector(self.store, n1),
                    subgraph_vector(self.store, n2),
                ) {
                    (Some(v1), Some(v2)) => vector_similarity(&v1, &v2),
                    _ => 0.0,
                }
            }
            FrequencyMode::IdenticalConcepts => {
                identical_concepts(self.store, n1, n2, self.sentence_index)
            }
        }
    }

    /// Concept time of a node.
    pub fn concept_time(&self, id: NodeId, mode: AggregationMode) -> f64 {
        match mode {
            AggregationMode::Flat => self.store[id].concept_time(),
            AggregationMode::Subgraph => subgraph_time(self.store, id),
        }
    }

    /// Score a candidate connection between two nodes of this sentence.
    pub fn connection(&self, n1: NodeId, n2: NodeId) -> Factors {
        let p = proximity(self.store[n1].word_index, self.store[n2].word_index);
        let f = self.frequency(n1, n2, self.config.connection_frequency);
        let r = recency(
            self.concept_time(n1, self.config.connection_recency),
            self.concept_time(n2, self.config.connection_recency),
            self.config.max_recency,
        );
        let metric = connection_metric(p, f, r, self.config);
        tracing::trace!(
            n1 = %self.store[n1].lemma,
            n2 = %self.store[n2].lemma,
            proximity = p,
            frequency = f,
            recency = r,
            metric,
            "connection metric"
        );
        Factors {
            proximity: p,
            frequency: f,
            recency: r,
            metric,
        }
    }

    /// Score a current-sentence node against a historical candidate.
    pub fn reference(&self, current: NodeId, candidate: NodeId) -> Factors {
        let f = self.frequency(current, candidate, self.config.reference_frequency);
        let r = recency(
            self.concept_time(current, self.config.reference_recency),
            self.concept_time(candidate, self.config.reference_recency),
            self.config.max_recency,
        );
        let metric = reference_metric(f, r, self.config);
        tracing::trace!(
            lemma = %self.store[current].lemma,
            candidate = self.store[candidate].instance_id,
            frequency = f,
            recency = r,
            metric,
            "reference metric"
        );
        Factors {
            proximity: 1.0,
            frequency: f,
            recency: r,
            metric,
        }
    }
}

/// Running min/mean/max of one factor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FactorStats {
    /// Observations.
    pub count: usize,
    /// Smallest value seen.
    pub min: f64,
    /// Largest value seen.
    pub max: f64,
    /// Sum of values.
    pub sum: f64,
}

impl FactorStats {
    /// Add one observation (non-finite values are skipped).
    pub fn record(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    /// Mean of the observations, if any.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Combine with another set of observations.
    pub fn merge(&mut self, other: &FactorStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count += other.count;
        self.sum += other.sum;
    }
}

/// Observed ranges of every evaluated factor, for tuning weights.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationStats {
    /// Proximity observations.
    pub proximity: FactorStats,
    /// Frequency observations.
    pub frequency: FactorStats,
    /// Recency observations.
    pub recency: FactorStats,
    /// Combined metric observations.
    pub metric: FactorStats,
}

impl CalibrationStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one evaluated pair.
    pub fn record(&mut self, factors: &Factors) {
        self.proximity.record(factors.proximity);
        self.frequency.record(factors.frequency);
        self.recency.record(factors.recency);
        self.metric.record(factors.metric);
    }

    /// Combine with statistics from another stage.
    pub fn merge(&mut self, other: &CalibrationStats) {
        self.proximity.merge(&other.proximity);
        self.frequency.merge(&other.frequency);
        self.recency.merge(&other.recency);
        self.metric.merge(&other.metric);
    }

    /// Number of evaluated pairs.
    pub fn evaluations(&self) -> usize {
        self.metric.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use crate::tokens::PosTag;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_proximity() {
        assert_eq!(proximity(0.0, 1.0), 1.0);
        assert_eq!(proximity(4.0, 2.0), 0.5);
    }

    #[test]
    fn test_recency_equal_times() {
        assert_eq!(recency(3.0, 3.0, 1.0), 1.0);
        assert_eq!(recency(3.0, 3.0, 2.5), 2.5);
        assert_eq!(recency(1.0, 5.0, 1.0), 0.25);
    }

    #[test]
    fn test_vector_similarity() {
        let a = array![0.0f32, 1.0];
        let b = array![0.5f32, 0.5];
        assert!((vector_similarity(&a, &b) - 0.5).abs() < 1e-9);
        assert_eq!(vector_similarity(&a, &a), 1.0);
    }

    #[test]
    fn test_blend_extremes() {
        assert_eq!(blend(0.3, 1.0), 0.3);
        assert_eq!(blend(0.3, 0.0), 1.0);
        assert!((blend(0.5, 0.5) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_deweighted_proximity_ignored() {
        let config = MetricConfig::new().with_proximity_weight(0.0);
        let near = connection_metric(1.0, 0.8, 0.5, &config);
        let far = connection_metric(0.01, 0.8, 0.5, &config);
        assert_eq!(near, far);
    }

    #[test]
    fn test_identical_concepts() {
        let mut store = ConceptStore::new();
        let leaf = |l: &str, w, s| Node::leaf(l, l, PosTag::Noun, array![0.0], w, s, 10.0);

        // Historical "the dog" from sentence 0.
        let old_the = store.insert(leaf("the", 0, 0));
        let old_dog = store.insert(leaf("dog", 1, 0));
        let old = {
            let n = Node::branch([(old_the, &store[old_the]), (old_dog, &store[old_dog])], 0);
            store.insert(n)
        };

        // Current "the dog" in sentence 1.
        let the = store.insert(leaf("the", 0, 1));
        let dog = store.insert(leaf("dog", 1, 1));
        let cur = {
            let n = Node::branch([(the, &store[the]), (dog, &store[dog])], 1);
            store.insert(n)
        };

        // "thedog" matches old branch, "the" and "dog" match old leaves.
        assert_eq!(identical_concepts(&store, cur, old, 1), 1.0);
        // A lone leaf matches one of the three historical nodes.
        assert_eq!(identical_concepts(&store, dog, old, 1), 1.0);
        assert_eq!(identical_concepts(&store, dog, old_the, 1), 0.0);
    }

    #[test]
    fn test_subgraph_aggregation_follows_children() {
        let mut store = ConceptStore::new();
        let a = store.insert(Node::leaf("a", "a", PosTag::Noun, array![0.0, 2.0], 0, 0, 4.0));
        let b = store.insert(Node::leaf("b", "b", PosTag::Noun, array![2.0, 0.0], 1, 0, 2.0));
        let ab = {
            let n = Node::branch([(a, &store[a]), (b, &store[b])], 0);
            store.insert(n)
        };
        assert_eq!(subgraph_vector(&store, ab), Some(array![1.0, 1.0]));
        assert_eq!(subgraph_time(&store, ab), 3.0);

        // Splicing a new child in changes the subgraph view but not the flat one.
        let c = store.insert(Node::leaf("c", "c", PosTag::Noun, array![4.0, 4.0], 2, 1, 0.0));
        store[ab].children.push(c);
        assert_eq!(subgraph_time(&store, ab), 2.0);
        assert_eq!(store[ab].concept_time(), 3.0);
    }

    #[test]
    fn test_calibration_stats() {
        let mut stats = CalibrationStats::new();
        assert_eq!(stats.metric.mean(), None);
        for m in [0.5, 1.5, 1.0] {
            stats.record(&Factors {
                proximity: 1.0,
                frequency: 1.0,
                recency: 1.0,
                metric: m,
            });
        }
        assert_eq!(stats.evaluations(), 3);
        assert_eq!(stats.metric.min, 0.5);
        assert_eq!(stats.metric.max, 1.5);
        assert_eq!(stats.metric.mean(), Some(1.0));

        let mut total = CalibrationStats::new();
        total.merge(&stats);
        total.merge(&stats);
        assert_eq!(total.evaluations(), 6);
        assert_eq!(total.metric.min, 0.5);
    }

    proptest! {
        #[test]
        fn connection_metric_increases_in_each_factor(
            p in 0.01f64..10.0,
            f in 0.01f64..1.0,
            r in 0.01f64..10.0,
            delta in 0.001f64..1.0,
            w in 0.05f64..=1.0,
        ) {
            let config = MetricConfig::new()
                .with_proximity_weight(w)
                .with_frequency_weight(w)
                .with_recency_weight(w);
            let base = connection_metric(p, f, r, &config);
            prop_assert!(connection_metric(p + delta, f, r, &config) > base);
            prop_assert!(connection_metric(p, f + delta, r, &config) > base);
            prop_assert!(connection_metric(p, f, r + delta, &config) > base);
        }

        #[test]
        fn reference_metric_increases_in_each_factor(
            f in 0.01f64..1.0,
            r in 0.01f64..10.0,
            delta in 0.001f64..1.0,
        ) {
            let config = MetricConfig::default();
            let base = reference_metric(f, r, &config);
            prop_assert!(reference_metric(f + delta, r, &config) > base);
            prop_assert!(reference_metric(f, r + delta, &config) > base);
        }
    }
}
