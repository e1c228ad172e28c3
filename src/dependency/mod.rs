//! Dependency derivation: governor/dependent trees over a sentence's leaves.
//!
//! | Strategy | Input | How |
//! |----------|-------|-----|
//! | [`derive_primary_source`] | constituency tree | pick a primary child per branch, link representatives |
//! | [`derive_acyclic`] | leaves | greedy cycle-free association graph, then a spanning tree |
//! | [`derive_formal`] | leaves + external arcs | copy the supplied heads |
//!
//! Every strategy produces a tree with a single root (no governor), at most
//! one governor per leaf, and `dependency_level` set to the depth below the
//! root.

mod acyclic;
mod formal;
mod primary;

pub use acyclic::derive_acyclic;
pub use formal::{derive_formal, DependencyArc};
pub use primary::derive_primary_source;

use std::collections::VecDeque;

use crate::graph::{ConceptStore, NodeId};
use crate::metrics::CalibrationStats;

/// Result of deriving one sentence's dependency tree.
#[derive(Debug, Clone)]
pub struct DependencyTree {
    /// Node without a governor.
    pub root: NodeId,
    /// `(governor, dependent)` pairs in creation order.
    pub edges: Vec<(NodeId, NodeId)>,
    /// Factor ranges observed while scoring pairs (acyclic strategy only).
    pub stats: CalibrationStats,
}

impl DependencyTree {
    /// Number of dependency edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True if the tree has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Record `dependent` under `governor`.
pub(crate) fn link(store: &mut ConceptStore, governor: NodeId, dependent: NodeId) {
    store[dependent].governor = Some(governor);
    store[governor].dependents.push(dependent);
}

/// Set `dependency_level` breadth-first from `root`.
pub(crate) fn assign_levels(store: &mut ConceptStore, root: NodeId) {
    let mut queue = VecDeque::from([(root, 0usize)]);
    while let Some((id, level)) = queue.pop_front() {
        store[id].dependency_level = level;
        for &dep in &store[id].dependents {
            queue.push_back((dep, level + 1));
        }
    }
}
