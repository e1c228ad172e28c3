//! Concept Store: the persistent cross-sentence graph.
//!
//! Nodes live in an arena addressed by [`NodeId`]; a second index maps each
//! lemma to its instances. Instance numbers come from a per-lemma counter
//! that only moves forward, so removing an instance never renumbers the
//! survivors.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::{Index, IndexMut};

use super::node::{Node, NodeId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
struct ConceptEntry {
    next_instance: usize,
    instances: BTreeMap<usize, NodeId>,
}

/// Lemma-indexed node arena shared by every sentence.
#[derive(Debug, Clone, Default)]
pub struct ConceptStore {
    nodes: Vec<Option<Node>>,
    concepts: HashMap<String, ConceptEntry>,
    live: usize,
}

impl ConceptStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    /// True if no node is registered.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of distinct lemmas with at least one instance.
    pub fn concept_count(&self) -> usize {
        self.concepts.values().filter(|c| !c.instances.is_empty()).count()
    }

    /// Register `node` under its lemma, assigning the next instance id.
    pub fn insert(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.instance_id = self.register(&node.lemma, id);
        self.nodes.push(Some(node));
        self.live += 1;
        id
    }

    fn register(&mut self, lemma: &str, id: NodeId) -> usize {
        let entry = self.concepts.entry(lemma.to_string()).or_default();
        let instance = entry.next_instance;
        entry.next_instance += 1;
        let _ = entry.instances.insert(instance, id);
        instance
    }

    /// Instances registered for `lemma`, by instance id.
    pub fn lookup(&self, lemma: &str) -> Option<&BTreeMap<usize, NodeId>> {
        self.concepts
            .get(lemma)
            .map(|c| &c.instances)
            .filter(|m| !m.is_empty())
    }

    /// Node for `(lemma, instance_id)`.
    pub fn instance(&self, lemma: &str, instance_id: usize) -> Option<NodeId> {
        self.concepts.get(lemma)?.instances.get(&instance_id).copied()
    }

    /// Remove `(lemma, instance_id)` and return the node.
    pub fn remove(&mut self, lemma: &str, instance_id: usize) -> Option<Node> {
        let id = self.concepts.get_mut(lemma)?.instances.remove(&instance_id)?;
        let node = self.nodes.get_mut(id.0)?.take();
        if node.is_some() {
            self.live -= 1;
        }
        node
    }

    /// Remove a node by handle.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let (lemma, instance) = {
            let node = self.get(id)?;
            (node.lemma.clone(), node.instance_id)
        };
        self.remove(&lemma, instance)
    }

    /// The instance of `lemma` activated most recently before `current`.
    ///
    /// Instances activated in `current` itself are skipped. Ties go to the
    /// lowest instance id.
    pub fn newest_instance(&self, lemma: &str, current: usize) -> Option<NodeId> {
        self.lookup(lemma)?
            .values()
            .filter_map(|&id| self.get(id).map(|n| (id, n.activation_time)))
            .filter(|&(_, t)| t != current)
            .min_by_key(|&(_, t)| current.saturating_sub(t))
            .map(|(id, _)| id)
    }

    /// Move a node to a new lemma key. It receives a fresh instance id there.
    pub fn relabel(&mut self, id: NodeId, lemma: String) {
        let Some(node) = self.nodes.get(id.0).and_then(Option::as_ref) else {
            return;
        };
        if node.lemma == lemma {
            return;
        }
        let (old_lemma, old_instance) = (node.lemma.clone(), node.instance_id);
        if let Some(entry) = self.concepts.get_mut(&old_lemma) {
            let _ = entry.instances.remove(&old_instance);
        }
        let instance = self.register(&lemma, id);
        if let Some(node) = self.get_mut(id) {
            node.lemma = lemma;
            node.instance_id = instance;
        }
    }

    /// Node by handle, if still registered.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Mutable node by handle, if still registered.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// True if `id` refers to a registered node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Fail with [`Error::InvalidParameter`] if any handle is stale.
    pub fn check_registered(&self, ids: &[NodeId]) -> Result<()> {
        if ids.iter().all(|&id| self.contains(id)) {
            Ok(())
        } else {
            Err(Error::InvalidParameter {
                name: "node",
                message: "handle is not registered in the concept store",
            })
        }
    }

    /// Iterate over all registered nodes.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i), n)))
    }

    /// Remove `root` and every node below it created in `sentence_index`.
    ///
    /// Nodes from earlier sentences are left in place. Dependency links to a
    /// removed node are dropped from its neighbours. Returns the number of
    /// nodes removed.
    pub fn delete_branch(&mut self, root: NodeId, sentence_index: usize) -> usize {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        let mut removed = 0;
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.get(id) else {
                continue;
            };
            if node.sentence_index != sentence_index {
                continue;
            }
            stack.extend(node.children.iter().copied());
            if let Some(node) = self.remove_node(id) {
                self.unlink_dependencies(id, &node);
                removed += 1;
            }
        }
        removed
    }

    fn unlink_dependencies(&mut self, id: NodeId, node: &Node) {
        if let Some(governor) = node.governor.and_then(|g| self.get_mut(g)) {
            governor.dependents.retain(|&d| d != id);
        }
        for &dep in &node.dependents {
            if let Some(dependent) = self.get_mut(dep) {
                if dependent.governor == Some(id) {
                    dependent.governor = None;
                }
            }
        }
    }

    /// Remove every node created in `sentence_index`.
    ///
    /// Used to roll back a sentence that failed part-way.
    pub fn discard_sentence(&mut self, sentence_index: usize) -> usize {
        let doomed: Vec<NodeId> = self
            .iter()
            .filter(|(_, n)| n.sentence_index == sentence_index)
            .map(|(id, _)| id)
            .collect();
        doomed
            .into_iter()
            .filter(|&id| self.remove_node(id).is_some())
            .count()
    }

    /// Leaves reachable from `root` through `children`, in visiting order.
    pub fn reachable_leaves(&self, root: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        let mut leaves = Vec::new();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.get(id) else {
                continue;
            };
            if node.is_leaf() {
                leaves.push(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        leaves
    }
}

impl Index<NodeId> for ConceptStore {
    type Output = Node;

    /// # Panics
    ///
    /// Panics if `id` has been removed.
    fn index(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("node {id} is not in the concept store"),
        }
    }
}

impl IndexMut<NodeId> for ConceptStore {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("node {id} is not in the concept store"),
        }
    }
}
