//! Primary-source propagation over a constituency tree.
//!
//! Every branch designates one child as *primary*. A leaf represents itself;
//! a branch is represented by the representative of its primary child. Each
//! non-primary child's representative then depends on the representative of
//! its parent:
//!
//! ```text
//!            head (rep: cat)
//!           /              \
//!     [the cat] (rep: cat)  [sat down] (rep: sat)
//!      /    \                /     \
//!    the    cat*           sat*    down          * = primary
//!
//!    cat -> the,  cat -> sat,  sat -> down
//! ```
//!
//! The primary child is the one whose vector lies closest (mean absolute
//! difference) to a comparison node: the last sibling of the branch under
//! the grandparent. Ties go to the earlier child. Children of the head have no
//! comparison node, so the first child is primary.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::graph::{ConceptStore, NodeId};
use crate::metrics::mean_abs_diff;

use super::{assign_levels, link, DependencyTree};

/// Derive a dependency tree from the constituency tree under `head`.
///
/// `allow_unary` accepts branches left with a single child (relationship
/// promotion produces these); otherwise such a branch has no comparison
/// sibling and fails with [`Error::MissingGovernor`]. A stale handle anywhere
/// in the tree fails with [`Error::InvalidParameter`].
pub fn derive_primary_source(
    store: &mut ConceptStore,
    head: NodeId,
    allow_unary: bool,
) -> Result<DependencyTree> {
    // Post-order over the sentence tree.
    let mut order = Vec::new();
    let mut stack = vec![(head, false)];
    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        store.check_registered(&[id])?;
        stack.push((id, true));
        for &child in store[id].children.iter().rev() {
            stack.push((child, false));
        }
    }

    let mut representative: HashMap<NodeId, NodeId> = HashMap::new();
    let mut edges = Vec::new();

    for &id in &order {
        let node = &store[id];
        if node.is_leaf() {
            let _ = representative.insert(id, id);
            continue;
        }

        // Branches emptied by promotion have nothing to represent.
        let children: Vec<NodeId> = node
            .children
            .iter()
            .copied()
            .filter(|c| representative.contains_key(c))
            .collect();
        if children.is_empty() {
            continue;
        }
        if children.len() == 1 && !allow_unary {
            return Err(Error::MissingGovernor {
                lemma: node.lemma.clone(),
            });
        }

        let primary = primary_child(store, id, &children);
        let governor = representative[&primary];
        for &child in children.iter().filter(|&&c| c != primary) {
            let dependent = representative[&child];
            edges.push((governor, dependent));
        }
        let _ = representative.insert(id, governor);
    }

    let root = representative
        .get(&head)
        .copied()
        .ok_or_else(|| Error::MissingGovernor {
            lemma: store[head].lemma.clone(),
        })?;

    for &(governor, dependent) in &edges {
        link(store, governor, dependent);
    }
    assign_levels(store, root);

    tracing::debug!(
        root = %store[root].lemma,
        edges = edges.len(),
        "primary-source dependency tree"
    );

    Ok(DependencyTree {
        root,
        edges,
        stats: Default::default(),
    })
}

fn primary_child(store: &ConceptStore, branch: NodeId, children: &[NodeId]) -> NodeId {
    let first = children[0];
    let Some(comparison) = comparison_node(store, branch) else {
        return first;
    };
    let target = &store[comparison].vector;

    let mut best = first;
    let mut best_diff = f64::INFINITY;
    for &child in children {
        let diff = mean_abs_diff(&store[child].vector, target);
        if diff < best_diff {
            best = child;
            best_diff = diff;
        }
    }
    best
}

/// Last sibling of `branch` under its parent.
fn comparison_node(store: &ConceptStore, branch: NodeId) -> Option<NodeId> {
    let parent = store[branch].parent?;
    store[parent]
        .children
        .iter()
        .rev()
        .copied()
        .find(|&c| c != branch)
}
