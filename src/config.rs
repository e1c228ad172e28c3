//! Configuration for metrics and the sentence pipeline.
//!
//! None of the default constants below have been calibrated. They are the
//! heuristic starting values of the original design and are exposed so that
//! callers can tune them (see [`crate::metrics::CalibrationStats`]).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a node is scored by its own stored values or by re-walking its subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AggregationMode {
    /// Use the aggregate stored on the node at merge time.
    #[default]
    Flat,
    /// Recompute the aggregate by walking the node's reachable leaves.
    Subgraph,
}

/// How the frequency factor compares two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrequencyMode {
    /// `1 - meanAbsDiff(v1, v2)` over normalized vectors.
    VectorSimilarity(AggregationMode),
    /// Lemma matches between the two subgraphs divided by nodes traversed.
    IdenticalConcepts,
}

impl Default for FrequencyMode {
    fn default() -> Self {
        FrequencyMode::VectorSimilarity(AggregationMode::Flat)
    }
}

/// Weights and thresholds for the connection and reference metrics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricConfig {
    /// Blend weight of the proximity factor (0 = ignored, 1 = full).
    pub proximity_weight: f64,
    /// Blend weight of the frequency factor.
    pub frequency_weight: f64,
    /// Blend weight of the recency factor.
    pub recency_weight: f64,
    /// A connection must score strictly above this to be created.
    pub connection_threshold: f64,
    /// A reference must score strictly above this to be spliced in.
    pub reference_threshold: f64,
    /// Concept time assigned to a lemma with no prior instance (sentences).
    pub max_time_diff: f64,
    /// Recency when both times are identical.
    pub max_recency: f64,
    /// Frequency comparison for the tree builder and acyclic deriver.
    pub connection_frequency: FrequencyMode,
    /// Frequency comparison for reference resolution.
    pub reference_frequency: FrequencyMode,
    /// Concept time source for connection recency.
    pub connection_recency: AggregationMode,
    /// Concept time source for reference recency.
    pub reference_recency: AggregationMode,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            proximity_weight: 1.0,
            frequency_weight: 1.0,
            recency_weight: 1.0,
            connection_threshold: 0.0,
            reference_threshold: 1.0,
            max_time_diff: 10.0,
            max_recency: 1.0,
            connection_frequency: FrequencyMode::default(),
            reference_frequency: FrequencyMode::default(),
            connection_recency: AggregationMode::Flat,
            reference_recency: AggregationMode::Flat,
        }
    }
}

impl MetricConfig {
    /// Create a configuration with default (uncalibrated) values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the proximity blend weight.
    pub fn with_proximity_weight(mut self, weight: f64) -> Self {
        self.proximity_weight = weight;
        self
    }

    /// Set the frequency blend weight.
    pub fn with_frequency_weight(mut self, weight: f64) -> Self {
        self.frequency_weight = weight;
        self
    }

    /// Set the recency blend weight.
    pub fn with_recency_weight(mut self, weight: f64) -> Self {
        self.recency_weight = weight;
        self
    }

    /// Set the connection creation threshold.
    pub fn with_connection_threshold(mut self, threshold: f64) -> Self {
        self.connection_threshold = threshold;
        self
    }

    /// Set the reference splice threshold.
    pub fn with_reference_threshold(mut self, threshold: f64) -> Self {
        self.reference_threshold = threshold;
        self
    }

    /// Set the concept time used for unseen lemmas.
    pub fn with_max_time_diff(mut self, diff: f64) -> Self {
        self.max_time_diff = diff;
        self
    }

    /// Set the recency value used for identical times.
    pub fn with_max_recency(mut self, recency: f64) -> Self {
        self.max_recency = recency;
        self
    }

    /// Set the connection frequency mode.
    pub fn with_connection_frequency(mut self, mode: FrequencyMode) -> Self {
        self.connection_frequency = mode;
        self
    }

    /// Set the reference frequency mode.
    pub fn with_reference_frequency(mut self, mode: FrequencyMode) -> Self {
        self.reference_frequency = mode;
        self
    }

    /// Set the connection recency aggregation.
    pub fn with_connection_recency(mut self, mode: AggregationMode) -> Self {
        self.connection_recency = mode;
        self
    }

    /// Set the reference recency aggregation.
    pub fn with_reference_recency(mut self, mode: AggregationMode) -> Self {
        self.reference_recency = mode;
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("proximity_weight", self.proximity_weight),
            ("frequency_weight", self.frequency_weight),
            ("recency_weight", self.recency_weight),
        ];
        for (name, w) in weights {
            if !(0.0..=1.0).contains(&w) {
                return Err(Error::InvalidParameter {
                    name,
                    message: "blend weight must be within [0, 1]",
                });
            }
        }
        if !self.connection_threshold.is_finite() {
            return Err(Error::InvalidParameter {
                name: "connection_threshold",
                message: "must be finite",
            });
        }
        if !self.reference_threshold.is_finite() {
            return Err(Error::InvalidParameter {
                name: "reference_threshold",
                message: "must be finite",
            });
        }
        if !(self.max_time_diff > 0.0 && self.max_time_diff.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "max_time_diff",
                message: "must be positive and finite",
            });
        }
        if !(self.max_recency > 0.0 && self.max_recency.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "max_recency",
                message: "must be positive and finite",
            });
        }
        if self.connection_frequency == FrequencyMode::IdenticalConcepts {
            // Fresh sentence nodes have no historical subgraph to count against.
            return Err(Error::InvalidParameter {
                name: "connection_frequency",
                message: "identical-concept frequency is only defined for references",
            });
        }
        // Splicing changes the subgraph aggregates of unmatched ancestors, so
        // a second resolution pass would see different scores.
        if self.reference_frequency == FrequencyMode::VectorSimilarity(AggregationMode::Subgraph) {
            return Err(Error::InvalidParameter {
                name: "reference_frequency",
                message: "subgraph aggregation is not stable under reference splicing",
            });
        }
        if self.reference_recency == AggregationMode::Subgraph {
            return Err(Error::InvalidParameter {
                name: "reference_recency",
                message: "subgraph aggregation is not stable under reference splicing",
            });
        }
        Ok(())
    }
}

/// Dependency derivation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DependencyStrategy {
    /// Propagate primary source nodes over the constituency tree.
    PrimarySource,
    /// Build a cycle-free association graph over the leaves, then a tree.
    Acyclic,
}

/// Pipeline configuration for [`crate::ConceptGraph`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GraphConfig {
    /// Metric weights and thresholds.
    pub metric: MetricConfig,
    /// Promote relationship leaves to branch-head children.
    pub semantic_transform: bool,
    /// Fuse adjacent relationship leaves before promotion.
    pub multiword_relationships: bool,
    /// Optional dependency derivation stage.
    pub dependency: Option<DependencyStrategy>,
    /// Splice new subtrees into prior equivalent subtrees.
    pub reference_resolution: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            metric: MetricConfig::default(),
            semantic_transform: false,
            multiword_relationships: true,
            dependency: None,
            reference_resolution: true,
        }
    }
}

impl GraphConfig {
    /// Create a pipeline configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metric configuration.
    pub fn with_metric(mut self, metric: MetricConfig) -> Self {
        self.metric = metric;
        self
    }

    /// Enable or disable the semantic transform stage.
    pub fn with_semantic_transform(mut self, enabled: bool) -> Self {
        self.semantic_transform = enabled;
        self
    }

    /// Enable or disable multiword relationship fusion.
    pub fn with_multiword_relationships(mut self, enabled: bool) -> Self {
        self.multiword_relationships = enabled;
        self
    }

    /// Select a dependency strategy (or `None` to skip the stage).
    pub fn with_dependency(mut self, strategy: Option<DependencyStrategy>) -> Self {
        self.dependency = strategy;
        self
    }

    /// Enable or disable reference resolution.
    pub fn with_reference_resolution(mut self, enabled: bool) -> Self {
        self.reference_resolution = enabled;
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        self.metric.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(MetricConfig::default().validate().is_ok());
        assert!(GraphConfig::default().validate().is_ok());
    }

    #[test]
    fn test_weight_out_of_range() {
        let config = MetricConfig::new().with_recency_weight(1.5);
        assert_eq!(
            config.validate(),
            Err(Error::InvalidParameter {
                name: "recency_weight",
                message: "blend weight must be within [0, 1]",
            })
        );
    }

    #[test]
    fn test_identical_concepts_rejected_for_connections() {
        let config = MetricConfig::new().with_connection_frequency(FrequencyMode::IdenticalConcepts);
        assert!(config.validate().is_err());

        let config = MetricConfig::new().with_reference_frequency(FrequencyMode::IdenticalConcepts);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_subgraph_aggregation_rejected_for_references() {
        let subgraph = FrequencyMode::VectorSimilarity(AggregationMode::Subgraph);
        let config = MetricConfig::new().with_reference_frequency(subgraph);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidParameter {
                name: "reference_frequency",
                ..
            })
        ));

        let config = MetricConfig::new().with_reference_recency(AggregationMode::Subgraph);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidParameter {
                name: "reference_recency",
                ..
            })
        ));

        // Connections are scored once per merge, so subgraph aggregation is fine there.
        let config = MetricConfig::new()
            .with_connection_frequency(subgraph)
            .with_connection_recency(AggregationMode::Subgraph);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = GraphConfig::new()
            .with_semantic_transform(true)
            .with_dependency(Some(DependencyStrategy::Acyclic))
            .with_metric(MetricConfig::new().with_reference_threshold(0.25));
        assert!(config.semantic_transform);
        assert_eq!(config.dependency, Some(DependencyStrategy::Acyclic));
        assert_eq!(config.metric.reference_threshold, 0.25);
    }
}
