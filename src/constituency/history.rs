//! Merge history of an agglomerative sentence parse.
//!
//! Records, in order, every pair the greedy builder joined together with the
//! metric that won. Replaying the first `n - k` merges splits the sentence
//! into `k` contiguous phrases.

use std::collections::HashMap;

use crate::graph::NodeId;

/// A single merge of two adjacent nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// Left node (`First` source position).
    pub left: NodeId,
    /// Right node (`Second` source position).
    pub right: NodeId,
    /// Branch created by the merge.
    pub parent: NodeId,
    /// Connection metric at which the pair won.
    pub metric: f64,
    /// Leaves under the new branch.
    pub size: usize,
}

/// Ordered merge record for one sentence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeHistory {
    merges: Vec<Merge>,
    leaves: Vec<NodeId>,
}

impl MergeHistory {
    /// Create a history over the sentence's leaves (in word order).
    pub fn new(leaves: Vec<NodeId>) -> Self {
        Self {
            merges: Vec::with_capacity(leaves.len().saturating_sub(1)),
            leaves,
        }
    }

    /// Record a merge.
    pub fn add_merge(&mut self, left: NodeId, right: NodeId, parent: NodeId, metric: f64, size: usize) {
        self.merges.push(Merge {
            left,
            right,
            parent,
            metric,
            size,
        });
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Number of merges recorded.
    pub fn n_merges(&self) -> usize {
        self.merges.len()
    }

    /// Iterate over merges in the order they happened.
    pub fn merges(&self) -> impl Iterator<Item = &Merge> {
        self.merges.iter()
    }

    /// Winning metrics in merge order.
    pub fn metrics(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.metric).collect()
    }

    /// Split the sentence into `k` phrases by replaying the first `n - k` merges.
    ///
    /// Phrases are returned in word order. `k` is clamped to `1..=n`.
    pub fn phrases(&self, k: usize) -> Vec<Vec<NodeId>> {
        let n = self.leaves.len();
        if n == 0 {
            return Vec::new();
        }
        let k = k.clamp(1, n);
        let replay = (n - k).min(self.merges.len());

        // Every node points at the branch that absorbed it.
        let mut absorbed: HashMap<NodeId, NodeId> = HashMap::new();
        for merge in &self.merges[..replay] {
            let _ = absorbed.insert(merge.left, merge.parent);
            let _ = absorbed.insert(merge.right, merge.parent);
        }

        let mut order: Vec<NodeId> = Vec::new();
        let mut groups: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for &leaf in &self.leaves {
            let mut root = leaf;
            while let Some(&up) = absorbed.get(&root) {
                root = up;
            }
            let group = groups.entry(root).or_insert_with(|| {
                order.push(root);
                Vec::new()
            });
            group.push(leaf);
        }

        order
            .into_iter()
            .filter_map(|root| groups.remove(&root))
            .collect()
    }
}
