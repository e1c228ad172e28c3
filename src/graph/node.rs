//! Concept graph node.

use core::fmt;

use ndarray::Array1;

use crate::semantic::EntityRole;
use crate::tokens::PosTag;

/// Stable handle to a node in a [`ConceptStore`](super::ConceptStore).
///
/// Handles are never reused, so a handle to a removed node stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural role of a node in its sentence tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// Input word.
    Leaf,
    /// Internal merge result.
    Branch,
    /// Sentence root.
    Head,
    /// Verb or preposition promoted to a branch-head child.
    Relationship,
}

/// Which side of its parent's merge a node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourcePosition {
    /// Left (or first) child.
    First,
    /// Right (or last) child.
    Second,
    /// Not yet merged, or a middle child of an n-ary branch.
    #[default]
    Unknown,
}

/// Reference-set boundary marker placed on promoted relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Delimiter {
    /// The relationship sits directly under the sentence head.
    ReferenceSet,
    /// The relationship sits under an inner branch.
    SubreferenceSet,
}

/// A node of both the per-sentence tree and the persistent concept graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Concept Store key.
    pub lemma: String,
    /// Instance number within `lemma`, assigned by the store.
    pub instance_id: usize,
    /// Surface form (concatenated for branches).
    pub word: String,
    /// Word vector; for branches the mean of the merged leaves.
    pub vector: Array1<f32>,
    /// Part-of-speech tag (leaves only).
    pub pos: Option<PosTag>,
    /// Structural role.
    pub kind: NodeKind,

    /// Leaves under this node.
    pub subgraph_size: usize,
    /// Sum of leaf vectors under this node.
    pub aggregate_vector: Array1<f32>,
    /// Sum of leaf concept times under this node.
    pub aggregate_time: f64,

    /// Mean word position of the merged nodes.
    pub word_index: f64,
    /// Leftmost word position covered.
    pub word_index_min: usize,
    /// Rightmost word position covered.
    pub word_index_max: usize,
    /// Height above the leaves (leaves = 0).
    pub tree_level: usize,
    /// Sentence that created this node.
    pub sentence_index: usize,

    /// Ordered constituency children.
    pub children: Vec<NodeId>,
    /// Constituency parent.
    pub parent: Option<NodeId>,
    /// Dependency governor.
    pub governor: Option<NodeId>,
    /// Dependency dependents.
    pub dependents: Vec<NodeId>,
    /// Depth from the dependency root (root = 0).
    pub dependency_level: usize,
    /// Relation label from an external dependency parse.
    pub dependency_label: Option<String>,

    /// Last sentence that created or reused this node.
    pub activation_time: usize,
    /// Semantic role.
    pub entity_role: EntityRole,
    /// Side of the parent's merge this node came from.
    pub source_position: SourcePosition,
    /// Constituent label from an external bracketing.
    pub label: Option<String>,
    /// Reference-set marker for promoted relationships.
    pub delimiter: Option<Delimiter>,
    /// Part of a fused multiword relationship.
    pub multiword: bool,
}

impl Node {
    /// Create a leaf for the word at position `word_index`.
    pub fn leaf(
        lemma: impl Into<String>,
        word: impl Into<String>,
        pos: PosTag,
        vector: Array1<f32>,
        word_index: usize,
        sentence_index: usize,
        concept_time: f64,
    ) -> Self {
        let lemma = lemma.into();
        let entity_role = EntityRole::from_token(&lemma, pos);
        Self {
            lemma,
            instance_id: 0,
            word: word.into(),
            aggregate_vector: vector.clone(),
            vector,
            pos: Some(pos),
            kind: NodeKind::Leaf,
            subgraph_size: 1,
            aggregate_time: concept_time,
            word_index: word_index as f64,
            word_index_min: word_index,
            word_index_max: word_index,
            tree_level: 0,
            sentence_index,
            children: Vec::new(),
            parent: None,
            governor: None,
            dependents: Vec::new(),
            dependency_level: 0,
            dependency_label: None,
            activation_time: sentence_index,
            entity_role,
            source_position: SourcePosition::Unknown,
            label: None,
            delimiter: None,
            multiword: false,
        }
    }

    /// Create a branch over `children` (given in word order).
    ///
    /// Lemma and word are the concatenation of the children's, aggregates are
    /// summed, and `vector` is the normalized aggregate.
    pub fn branch<'a>(
        children: impl IntoIterator<Item = (NodeId, &'a Node)>,
        sentence_index: usize,
    ) -> Self {
        let mut ids = Vec::new();
        let mut lemma = String::new();
        let mut word = String::new();
        let mut aggregate_vector: Option<Array1<f32>> = None;
        let mut aggregate_time = 0.0;
        let mut subgraph_size = 0;
        let mut index_sum = 0.0;
        let mut word_index_min = usize::MAX;
        let mut word_index_max = 0;
        let mut tree_level = 0;

        for (id, child) in children {
            ids.push(id);
            lemma.push_str(&child.lemma);
            word.push_str(&child.word);
            aggregate_vector = Some(match aggregate_vector {
                Some(acc) => acc + &child.aggregate_vector,
                None => child.aggregate_vector.clone(),
            });
            aggregate_time += child.aggregate_time;
            subgraph_size += child.subgraph_size;
            index_sum += child.word_index;
            word_index_min = word_index_min.min(child.word_index_min);
            word_index_max = word_index_max.max(child.word_index_max);
            tree_level = tree_level.max(child.tree_level + 1);
        }

        let aggregate_vector = aggregate_vector.unwrap_or_else(|| Array1::zeros(0));
        let vector = if subgraph_size > 0 {
            &aggregate_vector / subgraph_size as f32
        } else {
            aggregate_vector.clone()
        };
        let word_index = if ids.is_empty() {
            0.0
        } else {
            index_sum / ids.len() as f64
        };

        Self {
            lemma,
            instance_id: 0,
            word,
            vector,
            pos: None,
            kind: NodeKind::Branch,
            subgraph_size,
            aggregate_vector,
            aggregate_time,
            word_index,
            word_index_min: if ids.is_empty() { 0 } else { word_index_min },
            word_index_max,
            tree_level,
            sentence_index,
            children: ids,
            parent: None,
            governor: None,
            dependents: Vec::new(),
            dependency_level: 0,
            dependency_label: None,
            activation_time: sentence_index,
            entity_role: EntityRole::Undefined,
            source_position: SourcePosition::Unknown,
            label: None,
            delimiter: None,
            multiword: false,
        }
    }

    /// True for input-word nodes.
    ///
    /// Promoted relationships keep counting as leaves of the word layer.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && matches!(self.kind, NodeKind::Leaf | NodeKind::Relationship)
    }

    /// True for the sentence root.
    pub fn is_head(&self) -> bool {
        self.kind == NodeKind::Head
    }

    /// Mean concept time (`aggregate_time / subgraph_size`).
    pub fn concept_time(&self) -> f64 {
        if self.subgraph_size == 0 {
            0.0
        } else {
            self.aggregate_time / self.subgraph_size as f64
        }
    }
}
