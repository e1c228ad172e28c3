//! Reference resolution: reuse subtrees the store already holds.
//!
//! The freshly built tree is walked top-down. Each child created in the
//! current sentence is compared against every stored instance of the same
//! lemma that was not activated by this sentence. If the best candidate's
//! reference metric clears `reference_threshold`, the candidate takes the
//! child's place and the child's subtree is deleted:
//!
//! ```text
//!   before                         after
//!
//!     head(2)                        head(2)
//!     /     \                        /     \
//!  the(2)  dogran(2)   ------>    the(2)  dogran(1)   <- stored instance
//!            /  \                           /  \
//!         dog(2) ran(2)                 dog(1) ran(1)
//! ```
//!
//! Children without a match are kept and resolved recursively. A replaced
//! subtree is never walked, and a spliced candidate is marked active in the
//! current sentence, so it can be chosen at most once.

use crate::config::MetricConfig;
use crate::graph::{ConceptStore, NodeId};
use crate::metrics::{CalibrationStats, MetricEvaluator};

/// One spliced reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Lemma shared by the replaced node and the candidate.
    pub lemma: String,
    /// Stored node now attached to the sentence tree.
    pub candidate: NodeId,
    /// Node the candidate was attached under.
    pub parent: NodeId,
    /// Reference metric of the winning candidate.
    pub metric: f64,
    /// Current-sentence nodes deleted with the replaced subtree.
    pub removed: usize,
}

/// Outcome of resolving one sentence tree.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Spliced references in the order they were found.
    pub references: Vec<Reference>,
    /// Factor ranges observed while scoring candidates.
    pub stats: CalibrationStats,
}

impl Resolution {
    /// Total number of nodes deleted from the store.
    pub fn removed(&self) -> usize {
        self.references.iter().map(|r| r.removed).sum()
    }
}

/// Resolve the tree under `head` against the store.
///
/// Only nodes created in `sentence_index` are considered for replacement.
/// Dependency links of deleted nodes are dropped (see
/// [`ConceptStore::delete_branch`]).
pub fn resolve_references(
    store: &mut ConceptStore,
    head: NodeId,
    config: &MetricConfig,
    sentence_index: usize,
) -> Resolution {
    let mut resolution = Resolution::default();
    let mut stack = vec![head];

    while let Some(current) = stack.pop() {
        let Some(node) = store.get(current) else {
            continue;
        };
        let children = node.children.clone();

        for (slot, child) in children.into_iter().enumerate() {
            if store.get(child).map(|c| c.sentence_index) != Some(sentence_index) {
                continue;
            }
            let best = best_candidate(store, child, config, sentence_index, &mut resolution.stats);
            let Some((candidate, metric)) = best else {
                stack.push(child);
                continue;
            };

            let lemma = store[child].lemma.clone();
            store[current].children[slot] = candidate;
            store[candidate].parent = Some(current);
            store[candidate].activation_time = sentence_index;
            let removed = store.delete_branch(child, sentence_index);

            tracing::debug!(
                lemma = %lemma,
                candidate = %candidate,
                metric,
                removed,
                "reference found"
            );
            resolution.references.push(Reference {
                lemma,
                candidate,
                parent: current,
                metric,
                removed,
            });
        }
    }

    resolution
}

/// Highest-scoring stored instance above the threshold. The first instance
/// wins ties.
fn best_candidate(
    store: &ConceptStore,
    child: NodeId,
    config: &MetricConfig,
    sentence_index: usize,
    stats: &mut CalibrationStats,
) -> Option<(NodeId, f64)> {
    let instances = store.lookup(&store[child].lemma)?;
    let evaluator = MetricEvaluator::new(store, config, sentence_index);

    let mut best: Option<(NodeId, f64)> = None;
    for &candidate in instances.values() {
        if candidate == child || store[candidate].activation_time == sentence_index {
            continue;
        }
        let factors = evaluator.reference(child, candidate);
        stats.record(&factors);
        if factors.metric <= config.reference_threshold {
            continue;
        }
        if best.map_or(true, |(_, m)| factors.metric > m) {
            best = Some((candidate, factors.metric));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constituency::build_tree;
    use crate::error::Result;
    use crate::tokens::{create_leaves, PosTag, Token};
    use ndarray::array;

    fn tokens(words: &[(&str, f32)]) -> Vec<Token> {
        words
            .iter()
            .map(|&(w, v)| Token::new(w, w, PosTag::Noun, array![v, v]))
            .collect()
    }

    fn sentence(
        store: &mut ConceptStore,
        words: &[(&str, f32)],
        config: &MetricConfig,
        index: usize,
    ) -> Result<NodeId> {
        let leaves = create_leaves(store, &tokens(words), index, config.max_time_diff)?;
        Ok(build_tree(store, &leaves, config, index)?.head)
    }

    fn permissive() -> MetricConfig {
        MetricConfig::new().with_reference_threshold(0.0)
    }

    #[test]
    fn test_first_sentence_has_no_candidates() -> Result<()> {
        let mut store = ConceptStore::new();
        let config = permissive();
        let head = sentence(&mut store, &[("the", 0.1), ("dog", 0.5), ("ran", 0.9)], &config, 0)?;
        let before = store.len();

        let resolution = resolve_references(&mut store, head, &config, 0);
        assert!(resolution.references.is_empty());
        assert_eq!(store.len(), before);
        Ok(())
    }

    #[test]
    fn test_prior_sentence_is_reused() -> Result<()> {
        let mut store = ConceptStore::new();
        let config = permissive();
        let words = [("the", 0.1), ("dog", 0.5), ("ran", 0.9)];
        let first = sentence(&mut store, &words, &config, 0)?;
        let _ = resolve_references(&mut store, first, &config, 0);
        let old_children = store[first].children.clone();

        let second = sentence(&mut store, &words, &config, 1)?;
        let resolution = resolve_references(&mut store, second, &config, 1);

        // Both top-level children exist in sentence 0 with identical vectors.
        assert_eq!(store[second].children, old_children);
        assert_eq!(resolution.references.len(), 2);
        for r in &resolution.references {
            assert_eq!(store[r.candidate].sentence_index, 0);
            assert_eq!(store[r.candidate].activation_time, 1);
            assert_eq!(store[r.candidate].parent, Some(second));
        }
        // Only the new head remains from sentence 1.
        let left: Vec<_> = store.iter().filter(|(_, n)| n.sentence_index == 1).collect();
        assert_eq!(left.len(), 1);
        assert_eq!(resolution.removed(), 4);
        Ok(())
    }

    #[test]
    fn test_threshold_blocks_reuse() -> Result<()> {
        let mut store = ConceptStore::new();
        let config = MetricConfig::new().with_reference_threshold(1e9);
        let words = [("the", 0.1), ("dog", 0.5)];
        let _ = sentence(&mut store, &words, &config, 0)?;
        let second = sentence(&mut store, &words, &config, 1)?;
        let before = store.len();

        let resolution = resolve_references(&mut store, second, &config, 1);
        assert!(resolution.references.is_empty());
        assert_eq!(store.len(), before);
        // Every sentence-1 node below the head met its sentence-0 twin.
        assert_eq!(resolution.stats.evaluations(), 2);
        Ok(())
    }

    #[test]
    fn test_second_pass_changes_nothing() -> Result<()> {
        let mut store = ConceptStore::new();
        let config = permissive();
        let _ = sentence(&mut store, &[("the", 0.1), ("dog", 0.5), ("ran", 0.9)], &config, 0)?;
        let head = sentence(
            &mut store,
            &[("the", 0.1), ("dog", 0.5), ("ran", 0.9), ("again", 0.3)],
            &config,
            1,
        )?;
        let _ = resolve_references(&mut store, head, &config, 1);
        let snapshot: Vec<_> = store.iter().map(|(id, n)| (id, n.children.clone())).collect();

        let again = resolve_references(&mut store, head, &config, 1);
        assert!(again.references.is_empty());
        let after: Vec<_> = store.iter().map(|(id, n)| (id, n.children.clone())).collect();
        assert_eq!(snapshot, after);
        Ok(())
    }
}
