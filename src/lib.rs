//! # lexgraph
//!
//! Incremental sentence trees merged into a persistent, cross-sentence concept graph.
//!
//! Each sentence's tokens become leaf nodes that a greedy agglomerative builder joins into a
//! binary tree, scoring adjacent pairs by word proximity, vector similarity ("frequency") and
//! recency of prior use. Optional stages promote relationship words, derive a dependency tree,
//! and splice in equivalent subtrees the [`ConceptStore`] already holds from earlier sentences.
//!
//! ```text
//!   sentence 0:  the dog ran            sentence 1:  the dog ran again
//!
//!        head0                                 head1
//!       /     \                               /     \
//!   thedog    ran          ────────►    thedog(0)   ranagain
//!   /    \                                            /    \
//!  the   dog                                      ran(0)  again
//! ```
//!
//! Start with [`ConceptGraph`]; the individual stages are public for callers that need to run
//! them on their own.

pub mod config;
/// Error types used across `lexgraph`.
pub mod error;
pub mod graph;
pub mod metrics;
pub mod tokens;

pub mod constituency;
pub mod dependency;
pub mod pipeline;
pub mod resolve;
pub mod semantic;
pub mod validate;

#[cfg(test)]
mod pipeline_tests;

pub use config::{AggregationMode, DependencyStrategy, FrequencyMode, GraphConfig, MetricConfig};
pub use error::{Error, Result};
pub use graph::{ConceptStore, Delimiter, Node, NodeId, NodeKind, SourcePosition};
pub use metrics::{CalibrationStats, FactorStats, Factors, MetricEvaluator};
pub use tokens::{PosTag, Token};

pub use constituency::{Merge, MergeHistory, TreeBuild};
pub use dependency::{DependencyArc, DependencyTree};
pub use pipeline::{ConceptGraph, SentenceGraph};
pub use resolve::{Reference, Resolution};
pub use semantic::EntityRole;
pub use validate::{HealthCheck, HealthReport, Severity, ValidationIssue, ValidationReport};
