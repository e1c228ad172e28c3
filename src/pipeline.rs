//! Per-sentence driver over a persistent [`ConceptStore`].
//!
//! ```text
//! tokens ─► leaves ─► constituency ─► [semantic] ─► [dependency] ─► [resolve]
//!                       greedy           promote      primary         splice
//!                       bracketed                     acyclic         stored
//!                                                     formal arcs     subtrees
//! ```
//!
//! Sentence indices start at 0 and advance once per call, including calls
//! that fail. A failed sentence is rolled back: every node it created is
//! discarded and the store is left as it was before the call. Every stage
//! that can fail runs before reference resolution, which is the only stage
//! that touches nodes of earlier sentences.

use crate::config::{DependencyStrategy, GraphConfig};
use crate::constituency::{build_from_bracketing, build_tree, MergeHistory, TreeBuild};
use crate::dependency::{
    derive_acyclic, derive_formal, derive_primary_source, DependencyArc, DependencyTree,
};
use crate::error::{Error, Result};
use crate::graph::{ConceptStore, NodeId};
use crate::metrics::CalibrationStats;
use crate::resolve::{resolve_references, Reference};
use crate::semantic;
use crate::tokens::{check_sentence, create_leaves, Token};

/// What one processed sentence left in the graph.
#[derive(Debug, Clone)]
pub struct SentenceGraph {
    /// Index of the sentence.
    pub sentence_index: usize,
    /// Word layer reachable from the head after resolution, in tree order.
    ///
    /// Reused leaves of earlier sentences appear here in place of the
    /// sentence's own.
    pub leaves: Vec<NodeId>,
    /// Nodes created by this sentence that are still registered.
    pub nodes: Vec<NodeId>,
    /// Constituency head.
    pub head: NodeId,
    /// Dependency tree as derived, before resolution.
    pub dependency: Option<DependencyTree>,
    /// Merge record of the greedy builder.
    pub merges: Option<MergeHistory>,
    /// Relationship units promoted by the semantic transform.
    pub relationships: Vec<NodeId>,
    /// Stored subtrees spliced in by reference resolution.
    pub references: Vec<Reference>,
    /// Factor ranges over every metric evaluated for this sentence.
    pub stats: CalibrationStats,
}

impl SentenceGraph {
    /// Root of the dependency tree, if one was derived.
    pub fn dependency_root(&self) -> Option<NodeId> {
        self.dependency.as_ref().map(|d| d.root)
    }
}

#[derive(Debug, Clone, Copy)]
enum Constituency<'a> {
    Greedy,
    Bracketed(&'a str),
}

/// Cross-sentence concept graph.
///
/// # Example
///
/// ```rust,ignore
/// use lexgraph::{ConceptGraph, GraphConfig, PosTag, Token};
/// use ndarray::array;
///
/// let mut graph = ConceptGraph::new(GraphConfig::default())?;
/// let tokens = vec![
///     Token::new("dogs", "dog", PosTag::Noun, array![0.1, 0.3]),
///     Token::new("bark", "bark", PosTag::Verb, array![0.7, 0.2]),
/// ];
/// let sentence = graph.process_sentence(&tokens)?;
/// assert_eq!(graph.store()[sentence.head].subgraph_size, 2);
/// ```
#[derive(Debug, Clone)]
pub struct ConceptGraph {
    store: ConceptStore,
    config: GraphConfig,
    heads: Vec<NodeId>,
    next_sentence: usize,
    dimension: Option<usize>,
}

impl ConceptGraph {
    /// Create an empty graph. Fails if `config` does not validate.
    pub fn new(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: ConceptStore::new(),
            config,
            heads: Vec::new(),
            next_sentence: 0,
            dimension: None,
        })
    }

    /// The concept store.
    pub fn store(&self) -> &ConceptStore {
        &self.store
    }

    /// Mutable access to the concept store.
    ///
    /// Edits bypass every invariant the pipeline keeps; run
    /// [`validate_store`](crate::validate::validate_store) afterwards.
    pub fn store_mut(&mut self) -> &mut ConceptStore {
        &mut self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Heads of every sentence processed successfully, oldest first.
    pub fn heads(&self) -> &[NodeId] {
        &self.heads
    }

    /// Index the next sentence will receive.
    pub fn next_sentence(&self) -> usize {
        self.next_sentence
    }

    /// Vector dimension fixed by the first successful sentence.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Process a sentence with the greedy tree builder.
    pub fn process_sentence(&mut self, tokens: &[Token]) -> Result<SentenceGraph> {
        self.process(tokens, Constituency::Greedy, None)
    }

    /// Process a sentence whose constituency parse is given as a labeled
    /// bracketing. The semantic transform does not run on these trees.
    pub fn process_bracketed(&mut self, tokens: &[Token], bracketing: &str) -> Result<SentenceGraph> {
        self.process(tokens, Constituency::Bracketed(bracketing), None)
    }

    /// Process a sentence with the greedy tree builder and dependency arcs
    /// supplied by an external parser (one per token).
    pub fn process_with_arcs(
        &mut self,
        tokens: &[Token],
        arcs: &[DependencyArc],
    ) -> Result<SentenceGraph> {
        self.process(tokens, Constituency::Greedy, Some(arcs))
    }

    fn process(
        &mut self,
        tokens: &[Token],
        constituency: Constituency<'_>,
        arcs: Option<&[DependencyArc]>,
    ) -> Result<SentenceGraph> {
        let sentence_index = self.next_sentence;
        self.next_sentence += 1;

        match self.run(tokens, sentence_index, constituency, arcs) {
            Ok(sentence) => {
                self.heads.push(sentence.head);
                tracing::info!(
                    sentence = sentence_index,
                    words = tokens.len(),
                    nodes = sentence.nodes.len(),
                    references = sentence.references.len(),
                    store = self.store.len(),
                    "sentence processed"
                );
                Ok(sentence)
            }
            Err(err) => {
                let discarded = self.store.discard_sentence(sentence_index);
                tracing::warn!(
                    sentence = sentence_index,
                    discarded,
                    error = %err,
                    "sentence rolled back"
                );
                Err(err)
            }
        }
    }

    fn run(
        &mut self,
        tokens: &[Token],
        sentence_index: usize,
        constituency: Constituency<'_>,
        arcs: Option<&[DependencyArc]>,
    ) -> Result<SentenceGraph> {
        let dim = check_sentence(tokens)?;
        if let Some(expected) = self.dimension {
            if dim != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    found: dim,
                });
            }
        }

        let metric = &self.config.metric;
        let store = &mut self.store;
        let leaves = create_leaves(store, tokens, sentence_index, metric.max_time_diff)?;

        let (build, greedy) = match constituency {
            Constituency::Greedy => (build_tree(store, &leaves, metric, sentence_index)?, true),
            Constituency::Bracketed(text) => (
                build_from_bracketing(store, &leaves, text, sentence_index)?,
                false,
            ),
        };
        let TreeBuild {
            head,
            branches,
            history,
            mut stats,
        } = build;

        let transformed = greedy && self.config.semantic_transform;
        let relationships = if transformed {
            semantic::transform(store, &leaves, self.config.multiword_relationships)?
        } else {
            Vec::new()
        };

        let dependency = match (arcs, self.config.dependency) {
            (Some(arcs), _) => Some(derive_formal(store, &leaves, arcs)?),
            (None, Some(DependencyStrategy::PrimarySource)) => {
                Some(derive_primary_source(store, head, transformed)?)
            }
            (None, Some(DependencyStrategy::Acyclic)) => {
                Some(derive_acyclic(store, &leaves, metric, sentence_index)?)
            }
            (None, None) => None,
        };
        if let Some(tree) = &dependency {
            stats.merge(&tree.stats);
        }

        let references = if self.config.reference_resolution {
            let resolution = resolve_references(store, head, metric, sentence_index);
            stats.merge(&resolution.stats);
            resolution.references
        } else {
            Vec::new()
        };

        if let Some(mean) = stats.metric.mean() {
            tracing::debug!(
                sentence = sentence_index,
                evaluations = stats.evaluations(),
                min = stats.metric.min,
                mean,
                max = stats.metric.max,
                "metric range"
            );
        }

        let nodes = leaves
            .iter()
            .chain(&branches)
            .copied()
            .filter(|&id| store.contains(id))
            .collect();
        let sentence = SentenceGraph {
            sentence_index,
            leaves: store.reachable_leaves(head),
            nodes,
            head,
            dependency,
            merges: history,
            relationships,
            references,
            stats,
        };

        self.dimension = Some(dim);
        Ok(sentence)
    }
}
