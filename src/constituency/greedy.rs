//! Greedy agglomerative tree builder.
//!
//! Repeatedly joins the adjacent pair with the highest connection metric
//! until a single node (the sentence head) remains.
//!
//! ```text
//!   the   cat   sat   on   the   mat        stack, sorted by word position
//!    \___/                                  best adjacent pair wins
//!   [the cat] sat  on  the  mat
//!                      \___/
//!   [the cat] sat  on [the mat]
//!   ...
//!   [[the cat] [sat [on [the mat]]]]        head
//! ```
//!
//! Only pairs whose word ranges touch (`left.max + 1 == right.min`) are
//! candidates, so every branch covers a contiguous span. Ties go to the
//! leftmost pair. Direction is always left-to-right: the left node becomes
//! the `First` child.
//!
//! Each step rescans every adjacent pair, giving `O(n^2)` metric evaluations
//! per sentence and `O(n^3)` work once aggregate recomputation is included.

use crate::config::MetricConfig;
use crate::error::{Error, Result};
use crate::graph::{ConceptStore, Node, NodeId, NodeKind, SourcePosition};
use crate::metrics::{CalibrationStats, MetricEvaluator};

use super::history::MergeHistory;
use super::TreeBuild;

/// Build a binary constituency tree over `leaves` (given in word order).
///
/// Creates `n - 1` internal nodes for `n` leaves; the last one is the head.
/// Fails with [`Error::ParseExhausted`] when no adjacent pair scores above
/// `config.connection_threshold`. Nodes created before the failure stay in
/// the store; the caller rolls the sentence back.
pub fn build_tree(
    store: &mut ConceptStore,
    leaves: &[NodeId],
    config: &MetricConfig,
    sentence_index: usize,
) -> Result<TreeBuild> {
    match leaves.len() {
        0 => return Err(Error::EmptyInput),
        1 => return Err(Error::SentenceTooShort { len: 1 }),
        _ => {}
    }
    store.check_registered(leaves)?;

    let mut stack: Vec<NodeId> = leaves.to_vec();
    stack.sort_by_key(|&id| store[id].word_index_min);

    let mut history = MergeHistory::new(stack.clone());
    let mut stats = CalibrationStats::new();
    let mut branches = Vec::with_capacity(leaves.len() - 1);

    while stack.len() > 1 {
        let (index, metric) = {
            let evaluator = MetricEvaluator::new(store, config, sentence_index);
            let mut best: Option<(usize, f64)> = None;
            for (i, pair) in stack.windows(2).enumerate() {
                let (n1, n2) = (pair[0], pair[1]);
                if store[n1].word_index_max + 1 != store[n2].word_index_min {
                    continue;
                }
                let factors = evaluator.connection(n1, n2);
                stats.record(&factors);
                if factors.metric > config.connection_threshold
                    && best.map_or(true, |(_, m)| factors.metric > m)
                {
                    best = Some((i, factors.metric));
                }
            }
            best.ok_or(Error::ParseExhausted {
                sentence_index,
                remaining: stack.len(),
            })?
        };

        let (left, right) = (stack[index], stack[index + 1]);
        let branch = Node::branch([(left, &store[left]), (right, &store[right])], sentence_index);
        let size = branch.subgraph_size;
        let parent = store.insert(branch);

        store[left].parent = Some(parent);
        store[left].source_position = SourcePosition::First;
        store[right].parent = Some(parent);
        store[right].source_position = SourcePosition::Second;

        tracing::debug!(
            sentence = sentence_index,
            left = %store[left].lemma,
            right = %store[right].lemma,
            metric,
            size,
            "merged adjacent pair"
        );

        history.add_merge(left, right, parent, metric, size);
        branches.push(parent);
        stack[index] = parent;
        let _ = stack.remove(index + 1);
    }

    let head = stack[0];
    store[head].kind = NodeKind::Head;

    tracing::debug!(
        sentence = sentence_index,
        evaluations = stats.evaluations(),
        metric_min = stats.metric.min,
        metric_max = stats.metric.max,
        metric_mean = stats.metric.mean().unwrap_or(0.0),
        "greedy parse complete"
    );

    Ok(TreeBuild {
        head,
        branches,
        history: Some(history),
        stats,
    })
}
