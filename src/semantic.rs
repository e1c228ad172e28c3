//! Semantic roles and relationship promotion.
//!
//! A binary constituency tree buries verbs and prepositions among their
//! arguments. Promotion lifts each relationship leaf up to the branch that
//! joins its subject and object, exposing a subject-relation-object shape:
//!
//! ```text
//!          head                          head
//!         /    \                       /   |   \
//!   [the cat]  [is happy]    =>  [the cat] is  [happy]
//!               /     \
//!             is      happy
//! ```
//!
//! The walk starts at the relationship and climbs while each visited branch
//! sits on the same side (`First`/`Second`) as the relationship did, stripping
//! the relationship's lemma from each visited branch label. The first branch
//! on the opposite side marks the boundary; its parent is the *branch head*
//! and receives the relationship as a new child, placed next to the subtree
//! it came from. Reaching the tree head first means one argument is missing:
//! allowed for actions, an error for conditions.
//!
//! Before promotion, two sibling leaves that are both relationships (or
//! match [`MULTIWORD_RELATIONSHIPS`]) are fused and promoted as one unit.

use crate::error::{Error, Result};
use crate::graph::{ConceptStore, Delimiter, Node, NodeId, NodeKind, SourcePosition};
use crate::tokens::PosTag;

/// Lemma pairs promoted together even when the second is not a relationship.
pub const MULTIWORD_RELATIONSHIPS: &[(&str, &str)] = &[("be", "a")];

/// Semantic role of a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityRole {
    /// No role assigned.
    #[default]
    Undefined,
    /// Nouns.
    Substance,
    /// Verbs.
    Action,
    /// Prepositions.
    Condition,
    /// Possession (`have`).
    Property,
    /// Copula (`be`).
    Definition,
    /// Adjectives and adverbs.
    Quality,
}

impl EntityRole {
    /// Role of a token from its lemma and part of speech.
    pub fn from_token(lemma: &str, pos: PosTag) -> Self {
        match lemma {
            "have" => return EntityRole::Property,
            "be" => return EntityRole::Definition,
            _ => {}
        }
        match pos {
            PosTag::Noun => EntityRole::Substance,
            PosTag::Verb => EntityRole::Action,
            PosTag::Adp => EntityRole::Condition,
            PosTag::Adv | PosTag::Adj => EntityRole::Quality,
            _ => EntityRole::Undefined,
        }
    }

    /// True for roles that connect a subject to an object.
    pub fn is_relationship(self) -> bool {
        matches!(
            self,
            EntityRole::Action | EntityRole::Condition | EntityRole::Property | EntityRole::Definition
        )
    }
}

/// True if two adjacent leaves form one multiword relationship.
pub fn is_multiword_relationship(first: &Node, second: &Node) -> bool {
    (first.entity_role.is_relationship() && second.entity_role.is_relationship())
        || MULTIWORD_RELATIONSHIPS
            .iter()
            .any(|&(a, b)| first.lemma == a && second.lemma == b)
}

/// Fuse sibling relationship leaves into their parent branch.
///
/// Returns the relationship units in word order: `leaves` with each fused
/// pair replaced by its parent.
///
/// # Panics
///
/// Panics if a handle in `leaves` is not registered; [`transform`] checks
/// this first.
pub fn fuse_multiword_relationships(store: &mut ConceptStore, leaves: &[NodeId]) -> Vec<NodeId> {
    let mut units = Vec::with_capacity(leaves.len());
    let mut skip: Option<NodeId> = None;

    for &leaf in leaves {
        if skip == Some(leaf) {
            skip = None;
            continue;
        }
        let fused = store[leaf].parent.and_then(|parent| {
            let p = store.get(parent)?;
            let &[first, second] = p.children.as_slice() else {
                return None;
            };
            let (a, b) = (store.get(first)?, store.get(second)?);
            let pair_of_leaves = a.kind == NodeKind::Leaf
                && b.kind == NodeKind::Leaf
                && a.children.is_empty()
                && b.children.is_empty();
            (first == leaf && !a.multiword && pair_of_leaves && is_multiword_relationship(a, b))
                .then_some((parent, first, second))
        });

        match fused {
            Some((parent, first, second)) => {
                store[parent].entity_role = store[first].entity_role;
                store[first].multiword = true;
                store[second].multiword = true;
                tracing::debug!(lemma = %store[parent].lemma, "fused multiword relationship");
                units.push(parent);
                skip = Some(second);
            }
            None => units.push(leaf),
        }
    }
    units
}

/// Promote every relationship among `units` (left to right).
///
/// Returns the promoted nodes. A tree without relationships is left untouched.
pub fn promote_relationships(store: &mut ConceptStore, units: &[NodeId]) -> Result<Vec<NodeId>> {
    store.check_registered(units)?;
    let mut promoted = Vec::new();
    for &unit in units {
        if store[unit].entity_role.is_relationship() {
            promote(store, unit)?;
            promoted.push(unit);
        }
    }
    Ok(promoted)
}

/// Fuse multiword relationships (if enabled), then promote.
pub fn transform(store: &mut ConceptStore, leaves: &[NodeId], multiword: bool) -> Result<Vec<NodeId>> {
    store.check_registered(leaves)?;
    let units = if multiword {
        fuse_multiword_relationships(store, leaves)
    } else {
        leaves.to_vec()
    };
    promote_relationships(store, &units)
}

fn promote(store: &mut ConceptStore, rel: NodeId) -> Result<()> {
    let side = store[rel].source_position;
    let from_left = match side {
        SourcePosition::First => true,
        SourcePosition::Second => false,
        SourcePosition::Unknown => {
            return Err(Error::AmbiguousRelationship {
                lemma: store[rel].lemma.clone(),
                reason: "relationship has no source position",
            })
        }
    };
    let rel_lemma = store[rel].lemma.clone();

    let mut current = rel;
    let mut anchor = rel;
    let (branch_head, found) = loop {
        if store[current].is_head() {
            break (current, false);
        }
        let Some(parent) = store[current].parent else {
            break (current, false);
        };
        anchor = current;
        current = parent;

        let position = store[current].source_position;
        if position == SourcePosition::Unknown {
            continue;
        }
        strip_lemma(store, current, &rel_lemma, from_left);
        if position != side {
            match store[current].parent {
                Some(grandparent) => {
                    anchor = current;
                    break (grandparent, true);
                }
                None => break (current, false),
            }
        }
    };

    let role = store[rel].entity_role;
    if !found && role == EntityRole::Condition {
        return Err(Error::AmbiguousRelationship {
            lemma: rel_lemma,
            reason: "condition requires both a subject and an object",
        });
    }

    if anchor != rel {
        if let Some(old_parent) = store[rel].parent {
            store[old_parent].children.retain(|&c| c != rel);
        }
        let children = &mut store[branch_head].children;
        let at = children.iter().position(|&c| c == anchor).unwrap_or(children.len());
        let at = if from_left { at } else { (at + 1).min(children.len()) };
        children.insert(at, rel);
        store[rel].parent = Some(branch_head);
    }

    let delimiter = if store[branch_head].is_head() {
        Delimiter::ReferenceSet
    } else {
        Delimiter::SubreferenceSet
    };
    let node = &mut store[rel];
    node.kind = NodeKind::Relationship;
    node.delimiter = Some(delimiter);

    tracing::debug!(
        lemma = %rel_lemma,
        ?role,
        ?delimiter,
        complete = found,
        "promoted relationship"
    );
    Ok(())
}

fn strip_lemma(store: &mut ConceptStore, id: NodeId, rel_lemma: &str, from_left: bool) {
    let lemma = &store[id].lemma;
    let stripped = if from_left {
        lemma.strip_prefix(rel_lemma)
    } else {
        lemma.strip_suffix(rel_lemma)
    };
    if let Some(stripped) = stripped.map(str::to_string) {
        store.relabel(id, stripped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use ndarray::array;

    fn leaf(store: &mut ConceptStore, lemma: &str, pos: PosTag, w: usize) -> NodeId {
        store.insert(Node::leaf(lemma, lemma, pos, array![0.0], w, 0, 10.0))
    }

    fn join(store: &mut ConceptStore, left: NodeId, right: NodeId) -> NodeId {
        let node = Node::branch([(left, &store[left]), (right, &store[right])], 0);
        let parent = store.insert(node);
        store[left].parent = Some(parent);
        store[left].source_position = SourcePosition::First;
        store[right].parent = Some(parent);
        store[right].source_position = SourcePosition::Second;
        parent
    }

    #[test]
    fn test_entity_roles() {
        assert_eq!(EntityRole::from_token("cat", PosTag::Noun), EntityRole::Substance);
        assert_eq!(EntityRole::from_token("sit", PosTag::Verb), EntityRole::Action);
        assert_eq!(EntityRole::from_token("on", PosTag::Adp), EntityRole::Condition);
        assert_eq!(EntityRole::from_token("red", PosTag::Adj), EntityRole::Quality);
        assert_eq!(EntityRole::from_token("have", PosTag::Verb), EntityRole::Property);
        assert_eq!(EntityRole::from_token("be", PosTag::Aux), EntityRole::Definition);
        assert_eq!(EntityRole::from_token("the", PosTag::Det), EntityRole::Undefined);
        assert!(EntityRole::Definition.is_relationship());
        assert!(!EntityRole::Quality.is_relationship());
    }

    /// [[the cat] [is happy]]
    fn copula(store: &mut ConceptStore) -> (Vec<NodeId>, NodeId) {
        let the = leaf(store, "the", PosTag::Det, 0);
        let cat = leaf(store, "cat", PosTag::Noun, 1);
        let is = leaf(store, "be", PosTag::Aux, 2);
        let happy = leaf(store, "happy", PosTag::Adj, 3);
        let np = join(store, the, cat);
        let vp = join(store, is, happy);
        let head = join(store, np, vp);
        store[head].kind = NodeKind::Head;
        (vec![the, cat, is, happy], head)
    }

    #[test]
    fn test_copula_promoted_between_arguments() -> Result<()> {
        let mut store = ConceptStore::new();
        let (leaves, head) = copula(&mut store);
        let promoted = transform(&mut store, &leaves, true)?;

        let is = leaves[2];
        assert_eq!(promoted, vec![is]);
        assert_eq!(store[is].kind, NodeKind::Relationship);
        assert_eq!(store[is].delimiter, Some(Delimiter::ReferenceSet));
        assert_eq!(store[is].parent, Some(head));

        let children = &store[head].children;
        assert_eq!(children.len(), 3);
        assert_eq!(children[1], is);
        // The object branch lost the relationship from its label.
        assert_eq!(store[children[2]].lemma, "happy");
        assert_eq!(store[children[2]].children, vec![leaves[3]]);
        Ok(())
    }

    #[test]
    fn test_no_relationships_leaves_tree_unchanged() -> Result<()> {
        let mut store = ConceptStore::new();
        let the = leaf(&mut store, "the", PosTag::Det, 0);
        let cat = leaf(&mut store, "cat", PosTag::Noun, 1);
        let head = join(&mut store, the, cat);
        store[head].kind = NodeKind::Head;

        let promoted = transform(&mut store, &[the, cat], true)?;
        assert!(promoted.is_empty());
        assert_eq!(store[head].children, vec![the, cat]);
        assert_eq!(store[head].lemma, "thecat");
        Ok(())
    }

    #[test]
    fn test_stale_leaf_is_an_error() {
        let mut store = ConceptStore::new();
        let cat = leaf(&mut store, "cat", PosTag::Noun, 0);
        let sat = leaf(&mut store, "sit", PosTag::Verb, 1);
        let _ = store.remove_node(sat);

        let err = transform(&mut store, &[cat, sat], true);
        assert!(matches!(err, Err(Error::InvalidParameter { name: "node", .. })));
    }

    #[test]
    fn test_condition_without_object_is_error() {
        let mut store = ConceptStore::new();
        let cat = leaf(&mut store, "cat", PosTag::Noun, 0);
        let on = leaf(&mut store, "on", PosTag::Adp, 1);
        let head = join(&mut store, cat, on);
        store[head].kind = NodeKind::Head;

        let err = transform(&mut store, &[cat, on], true);
        assert!(matches!(err, Err(Error::AmbiguousRelationship { .. })));
    }

    #[test]
    fn test_action_without_subject_allowed() -> Result<()> {
        let mut store = ConceptStore::new();
        let run = leaf(&mut store, "run", PosTag::Verb, 0);
        let fast = leaf(&mut store, "fast", PosTag::Adv, 1);
        let head = join(&mut store, run, fast);
        store[head].kind = NodeKind::Head;

        let promoted = transform(&mut store, &[run, fast], true)?;
        assert_eq!(promoted, vec![run]);
        assert_eq!(store[head].children, vec![run, fast]);
        assert_eq!(store[run].kind, NodeKind::Relationship);
        Ok(())
    }

    #[test]
    fn test_multiword_fusion() -> Result<()> {
        // [cat [[be a] pet]]
        let mut store = ConceptStore::new();
        let cat = leaf(&mut store, "cat", PosTag::Noun, 0);
        let be = leaf(&mut store, "be", PosTag::Aux, 1);
        let a = leaf(&mut store, "a", PosTag::Det, 2);
        let pet = leaf(&mut store, "pet", PosTag::Noun, 3);
        let bea = join(&mut store, be, a);
        let rest = join(&mut store, bea, pet);
        let head = join(&mut store, cat, rest);
        store[head].kind = NodeKind::Head;

        let units = fuse_multiword_relationships(&mut store, &[cat, be, a, pet]);
        assert_eq!(units, vec![cat, bea, pet]);
        assert!(store[be].multiword && store[a].multiword);
        assert_eq!(store[bea].entity_role, EntityRole::Definition);

        let promoted = promote_relationships(&mut store, &units)?;
        assert_eq!(promoted, vec![bea]);
        assert_eq!(store[head].children, vec![cat, bea, rest]);
        assert_eq!(store[rest].lemma, "pet");
        Ok(())
    }
}
