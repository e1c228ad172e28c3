//! Dependency trees from an external parser's arcs.

use crate::error::{Error, Result};
use crate::graph::{ConceptStore, NodeId};

use super::{assign_levels, link, DependencyTree};

/// One token's arc: the index of its head token (`None` for the root) and
/// the relation label.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DependencyArc {
    /// Word index of the governor, or `None` for the root.
    pub head: Option<usize>,
    /// Relation label (`nsubj`, `obj`, ...).
    pub label: String,
}

impl DependencyArc {
    /// Arc to the token at `head`.
    pub fn new(head: usize, label: impl Into<String>) -> Self {
        Self {
            head: Some(head),
            label: label.into(),
        }
    }

    /// Arc marking the sentence root.
    pub fn root(label: impl Into<String>) -> Self {
        Self {
            head: None,
            label: label.into(),
        }
    }
}

/// Link `leaves` according to `arcs` (one arc per leaf, in word order).
///
/// Requires exactly one root and heads that form a tree.
pub fn derive_formal(
    store: &mut ConceptStore,
    leaves: &[NodeId],
    arcs: &[DependencyArc],
) -> Result<DependencyTree> {
    store.check_registered(leaves)?;
    if arcs.len() != leaves.len() {
        return Err(Error::InvalidParse {
            message: format!("{} arcs for {} words", arcs.len(), leaves.len()),
        });
    }

    let roots: Vec<usize> = arcs
        .iter()
        .enumerate()
        .filter(|(_, a)| a.head.is_none())
        .map(|(i, _)| i)
        .collect();
    let &[root] = roots.as_slice() else {
        return Err(Error::InvalidParse {
            message: format!("expected exactly one root, found {}", roots.len()),
        });
    };

    for (i, arc) in arcs.iter().enumerate() {
        if let Some(h) = arc.head {
            if h >= arcs.len() || h == i {
                return Err(Error::InvalidParse {
                    message: format!("word {i} has invalid head {h}"),
                });
            }
        }
    }

    // Every chain of heads must end at the root within n steps.
    for start in 0..arcs.len() {
        let mut current = start;
        let mut steps = 0;
        while let Some(h) = arcs[current].head {
            current = h;
            steps += 1;
            if steps > arcs.len() {
                return Err(Error::InvalidParse {
                    message: format!("cycle through word {start}"),
                });
            }
        }
    }

    let mut edges = Vec::with_capacity(arcs.len() - 1);
    for (i, arc) in arcs.iter().enumerate() {
        store[leaves[i]].dependency_label = Some(arc.label.clone());
        if let Some(h) = arc.head {
            link(store, leaves[h], leaves[i]);
            edges.push((leaves[h], leaves[i]));
        }
    }
    assign_levels(store, leaves[root]);

    Ok(DependencyTree {
        root: leaves[root],
        edges,
        stats: Default::default(),
    })
}
