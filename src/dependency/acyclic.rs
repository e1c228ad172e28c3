//! Acyclic association graph, then a spanning dependency tree.
//!
//! Unlike the constituency builder, every ordered pair of leaves is a
//! candidate, not just adjacent ones. Candidates are taken best-first; each
//! accepted pair `(n1, n2)` adds the edge `n2 -> n1` unless `n2` is already
//! reachable from `n1` (which would close a cycle). After each insertion the
//! sources above `n2` are checked; the first whose reachable set covers the
//! whole sentence becomes the root, and a
//! depth-first walk from it keeps the first edge into every node.
//!
//! Pair scores never change during the walk, so sorting once is equivalent
//! to rescanning for the best remaining pair after every insertion.

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef, Reversed};
use petgraph::Direction::Incoming;

use crate::config::MetricConfig;
use crate::error::{Error, Result};
use crate::graph::{ConceptStore, NodeId};
use crate::metrics::{CalibrationStats, MetricEvaluator};

use super::{assign_levels, link, DependencyTree};

/// Derive a dependency tree over `leaves` from the connection metric alone.
///
/// Fails with [`Error::ParseExhausted`] if the candidate pairs above
/// `config.connection_threshold` cannot connect the whole sentence.
pub fn derive_acyclic(
    store: &mut ConceptStore,
    leaves: &[NodeId],
    config: &MetricConfig,
    sentence_index: usize,
) -> Result<DependencyTree> {
    let n = leaves.len();
    match n {
        0 => return Err(Error::EmptyInput),
        1 => return Err(Error::SentenceTooShort { len: 1 }),
        _ => {}
    }
    store.check_registered(leaves)?;

    let mut stats = CalibrationStats::new();
    let mut candidates: Vec<(usize, usize, f64)> = Vec::with_capacity(n * (n - 1));
    {
        let evaluator = MetricEvaluator::new(store, config, sentence_index);
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let factors = evaluator.connection(leaves[i], leaves[j]);
                stats.record(&factors);
                if factors.metric > config.connection_threshold {
                    candidates.push((i, j, factors.metric));
                }
            }
        }
    }
    // Stable: equal metrics keep scan order.
    candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut graph: DiGraph<NodeId, f64> = DiGraph::with_capacity(n, n);
    let indices: Vec<NodeIndex> = leaves.iter().map(|&id| graph.add_node(id)).collect();

    let mut root = None;
    let mut best_reach = 0;
    for &(i, j, metric) in &candidates {
        let (n1, n2) = (indices[i], indices[j]);
        if graph.contains_edge(n1, n2) || graph.contains_edge(n2, n1) {
            continue;
        }
        if has_path_connecting(&graph, n1, n2, None) {
            continue;
        }
        let _ = graph.add_edge(n2, n1, metric);
        tracing::trace!(
            governor = %store[leaves[j]].lemma,
            dependent = %store[leaves[i]].lemma,
            metric,
            "association edge"
        );

        if let Some(spanning) = spanning_source(&graph, n2, &mut best_reach) {
            root = Some(spanning);
            break;
        }
    }

    let Some(root) = root else {
        return Err(Error::ParseExhausted {
            sentence_index,
            remaining: n - best_reach,
        });
    };

    let edges = spanning_tree(&graph, root);
    for &(governor, dependent) in &edges {
        link(store, governor, dependent);
    }
    let root_id = graph[root];
    assign_levels(store, root_id);

    tracing::debug!(
        sentence = sentence_index,
        root = %store[root_id].lemma,
        association_edges = graph.edge_count(),
        "acyclic dependency tree"
    );

    Ok(DependencyTree {
        root: root_id,
        edges,
        stats,
    })
}

/// The new edge raised the reach of `governor` and of everything above it.
/// Only a node without incoming edges can reach the whole sentence, so the
/// sources among those ancestors are the only root candidates.
fn spanning_source(
    graph: &DiGraph<NodeId, f64>,
    governor: NodeIndex,
    best_reach: &mut usize,
) -> Option<NodeIndex> {
    let reversed = Reversed(graph);
    let mut ancestors = Dfs::new(reversed, governor);
    while let Some(node) = ancestors.next(reversed) {
        if graph.neighbors_directed(node, Incoming).next().is_some() {
            continue;
        }
        let reach = reachable_count(graph, node);
        *best_reach = (*best_reach).max(reach);
        if reach == graph.node_count() {
            return Some(node);
        }
    }
    None
}

fn reachable_count(graph: &DiGraph<NodeId, f64>, start: NodeIndex) -> usize {
    let mut dfs = Dfs::new(graph, start);
    let mut count = 0;
    while dfs.next(graph).is_some() {
        count += 1;
    }
    count
}

/// Depth-first spanning tree from `root`, following edges in insertion order.
fn spanning_tree(graph: &DiGraph<NodeId, f64>, root: NodeIndex) -> Vec<(NodeId, NodeId)> {
    let mut visited = vec![false; graph.node_count()];
    let mut edges = Vec::new();
    visit(graph, root, &mut visited, &mut edges);
    edges
}

fn visit(
    graph: &DiGraph<NodeId, f64>,
    node: NodeIndex,
    visited: &mut [bool],
    edges: &mut Vec<(NodeId, NodeId)>,
) {
    visited[node.index()] = true;
    let mut outgoing: Vec<_> = graph.edges(node).map(|e| (e.id(), e.target())).collect();
    outgoing.sort_by_key(|&(edge, _)| edge.index());
    for (_, target) in outgoing {
        if !visited[target.index()] {
            edges.push((graph[node], graph[target]));
            visit(graph, target, visited, edges);
        }
    }
}
