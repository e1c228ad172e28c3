//! Constituency trees from an external labeled bracketing.
//!
//! Accepts Penn-style bracketings such as
//!
//! ```text
//! (S (NP (DT the) (NN cat)) (VP (VBD sat) (PP (IN on) (NP (DT the) (NN mat)))))
//! ```
//!
//! Pre-terminals (`(DT the)`) collapse onto the sentence's leaf nodes in word
//! order. Unary chains collapse onto their single child, keeping every label
//! joined with `+`. The remaining phrases become n-ary branches with the same
//! aggregate bookkeeping the greedy builder uses.

use crate::error::{Error, Result};
use crate::graph::{ConceptStore, Node, NodeId, NodeKind, SourcePosition};
use crate::metrics::CalibrationStats;

use super::TreeBuild;

/// Parsed bracketing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bracket {
    /// A bare word.
    Word(String),
    /// A labeled constituent.
    Phrase {
        /// Constituent label (`NP`, `VP`, ...).
        label: String,
        /// Sub-constituents in order.
        children: Vec<Bracket>,
    },
}

impl Bracket {
    /// Number of words under this constituent.
    pub fn word_count(&self) -> usize {
        match self {
            Bracket::Word(_) => 1,
            Bracket::Phrase { children, .. } => children.iter().map(Bracket::word_count).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme<'a> {
    Open,
    Close,
    Atom(&'a str),
}

fn lex(input: &str) -> Vec<Lexeme<'_>> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in input.char_indices() {
        if c == '(' || c == ')' || c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push(Lexeme::Atom(&input[s..i]));
            }
            match c {
                '(' => out.push(Lexeme::Open),
                ')' => out.push(Lexeme::Close),
                _ => {}
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(Lexeme::Atom(&input[s..]));
    }
    out
}

/// Parse a labeled bracketing.
pub fn parse_bracketing(input: &str) -> Result<Bracket> {
    let lexemes = lex(input);
    let mut pos = 0;
    let tree = parse_phrase(&lexemes, &mut pos)?;
    if pos != lexemes.len() {
        return Err(Error::InvalidParse {
            message: format!("trailing input after bracket {pos}"),
        });
    }
    Ok(tree)
}

fn parse_phrase(lexemes: &[Lexeme<'_>], pos: &mut usize) -> Result<Bracket> {
    if lexemes.get(*pos) != Some(&Lexeme::Open) {
        return Err(Error::InvalidParse {
            message: "expected '('".to_string(),
        });
    }
    *pos += 1;

    // Some treebanks wrap the root in an unlabeled pair: `( (S ...) )`.
    let label = match lexemes.get(*pos) {
        Some(Lexeme::Atom(label)) => {
            *pos += 1;
            (*label).to_string()
        }
        _ => String::new(),
    };

    let mut children = Vec::new();
    loop {
        match lexemes.get(*pos) {
            Some(Lexeme::Close) => {
                *pos += 1;
                break;
            }
            Some(Lexeme::Open) => children.push(parse_phrase(lexemes, pos)?),
            Some(Lexeme::Atom(word)) => {
                children.push(Bracket::Word((*word).to_string()));
                *pos += 1;
            }
            None => {
                return Err(Error::InvalidParse {
                    message: "unbalanced brackets".to_string(),
                })
            }
        }
    }

    if children.is_empty() {
        return Err(Error::InvalidParse {
            message: format!("empty constituent '{label}'"),
        });
    }
    Ok(Bracket::Phrase { label, children })
}

/// Build a constituency tree for `leaves` from a labeled bracketing.
///
/// The bracketing must cover exactly `leaves.len()` words.
pub fn build_from_bracketing(
    store: &mut ConceptStore,
    leaves: &[NodeId],
    bracketing: &str,
    sentence_index: usize,
) -> Result<TreeBuild> {
    match leaves.len() {
        0 => return Err(Error::EmptyInput),
        1 => return Err(Error::SentenceTooShort { len: 1 }),
        _ => {}
    }
    store.check_registered(leaves)?;

    let tree = parse_bracketing(bracketing)?;
    let words = tree.word_count();
    if words != leaves.len() {
        return Err(Error::InvalidParse {
            message: format!("bracketing covers {words} words, sentence has {}", leaves.len()),
        });
    }

    let mut builder = FormalBuilder {
        store: &mut *store,
        leaves,
        next_leaf: 0,
        branches: Vec::new(),
        sentence_index,
    };
    let (head, labels) = builder.build(&tree)?;
    let branches = builder.branches;

    store[head].kind = NodeKind::Head;
    if !labels.is_empty() {
        store[head].label = Some(labels.join("+"));
    }
    tracing::debug!(
        sentence = sentence_index,
        branches = branches.len(),
        "formal parse complete"
    );

    Ok(TreeBuild {
        head,
        branches,
        history: None,
        stats: CalibrationStats::new(),
    })
}

struct FormalBuilder<'a> {
    store: &'a mut ConceptStore,
    leaves: &'a [NodeId],
    next_leaf: usize,
    branches: Vec<NodeId>,
    sentence_index: usize,
}

impl FormalBuilder<'_> {
    /// Returns the node for `tree` and the labels of any collapsed unary chain.
    fn build(&mut self, tree: &Bracket) -> Result<(NodeId, Vec<String>)> {
        let (label, children) = match tree {
            Bracket::Word(_) => return Ok((self.take_leaf()?, Vec::new())),
            Bracket::Phrase { label, children } => (label, children),
        };

        let mut built = Vec::with_capacity(children.len());
        for child in children {
            built.push(self.build(child)?);
        }

        if built.len() == 1 {
            let (id, mut labels) = built.remove(0);
            // Labels directly over a word are dropped; the leaf keeps its POS tag.
            if !self.store[id].is_leaf() && !label.is_empty() {
                labels.insert(0, label.clone());
            }
            return Ok((id, labels));
        }

        let ids: Vec<NodeId> = built
            .into_iter()
            .map(|(id, labels)| {
                if !labels.is_empty() {
                    self.store[id].label = Some(labels.join("+"));
                }
                id
            })
            .collect();

        let last = ids.len() - 1;
        let node = {
            let store = &*self.store;
            Node::branch(ids.iter().map(|&id| (id, &store[id])), self.sentence_index)
        };
        let parent = self.store.insert(node);
        for (i, &id) in ids.iter().enumerate() {
            let child = &mut self.store[id];
            child.parent = Some(parent);
            child.source_position = match i {
                0 => SourcePosition::First,
                i if i == last => SourcePosition::Second,
                _ => SourcePosition::Unknown,
            };
        }
        self.branches.push(parent);

        let labels = if label.is_empty() {
            Vec::new()
        } else {
            vec![label.clone()]
        };
        Ok((parent, labels))
    }

    fn take_leaf(&mut self) -> Result<NodeId> {
        let id = self
            .leaves
            .get(self.next_leaf)
            .copied()
            .ok_or_else(|| Error::InvalidParse {
                message: "bracketing has more words than the sentence".to_string(),
            })?;
        self.next_leaf += 1;
        Ok(id)
    }
}
