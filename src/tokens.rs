//! Token adapter: the boundary with the external NLP pipeline.
//!
//! Tokenization, tagging, lemmatization and embedding all happen upstream.
//! This module only turns the resulting records into leaf nodes.
//!
//! ```text
//!   Token { text, lemma, pos, vector }  --leaf()-->  Node { kind: Leaf, .. }
//! ```
//!
//! Each leaf also receives a *concept time*: the number of sentences since
//! the lemma was last activated, capped at `max_time_diff`. Aggregated over a
//! subgraph, this becomes the recency signal used by the metrics.

use core::fmt;
use core::str::FromStr;

use ndarray::Array1;

use crate::error::{Error, Result};
use crate::graph::{ConceptStore, Node, NodeId};

/// Placeholder lemma some lemmatizers emit for pronouns.
pub const PRONOUN_LEMMA: &str = "-PRON-";

/// Universal part-of-speech tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PosTag {
    /// Adjective.
    Adj,
    /// Adposition (preposition or postposition).
    Adp,
    /// Adverb.
    Adv,
    /// Auxiliary verb.
    Aux,
    /// Coordinating conjunction.
    Cconj,
    /// Determiner.
    Det,
    /// Interjection.
    Intj,
    /// Noun.
    Noun,
    /// Numeral.
    Num,
    /// Particle.
    Part,
    /// Pronoun.
    Pron,
    /// Proper noun.
    Propn,
    /// Punctuation.
    Punct,
    /// Subordinating conjunction.
    Sconj,
    /// Symbol.
    Sym,
    /// Verb.
    Verb,
    /// Other.
    X,
}

impl PosTag {
    /// Canonical upper-case tag name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PosTag::Adj => "ADJ",
            PosTag::Adp => "ADP",
            PosTag::Adv => "ADV",
            PosTag::Aux => "AUX",
            PosTag::Cconj => "CCONJ",
            PosTag::Det => "DET",
            PosTag::Intj => "INTJ",
            PosTag::Noun => "NOUN",
            PosTag::Num => "NUM",
            PosTag::Part => "PART",
            PosTag::Pron => "PRON",
            PosTag::Propn => "PROPN",
            PosTag::Punct => "PUNCT",
            PosTag::Sconj => "SCONJ",
            PosTag::Sym => "SYM",
            PosTag::Verb => "VERB",
            PosTag::X => "X",
        }
    }
}

impl fmt::Display for PosTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PosTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tag = match s.to_ascii_uppercase().as_str() {
            "ADJ" => PosTag::Adj,
            "ADP" => PosTag::Adp,
            "ADV" => PosTag::Adv,
            "AUX" => PosTag::Aux,
            "CCONJ" | "CONJ" => PosTag::Cconj,
            "DET" => PosTag::Det,
            "INTJ" => PosTag::Intj,
            "NOUN" => PosTag::Noun,
            "NUM" => PosTag::Num,
            "PART" => PosTag::Part,
            "PRON" => PosTag::Pron,
            "PROPN" => PosTag::Propn,
            "PUNCT" => PosTag::Punct,
            "SCONJ" => PosTag::Sconj,
            "SYM" => PosTag::Sym,
            "VERB" => PosTag::Verb,
            "X" => PosTag::X,
            _ => {
                return Err(Error::InvalidParse {
                    message: format!("unknown part-of-speech tag '{s}'"),
                })
            }
        };
        Ok(tag)
    }
}

/// One pre-processed token from the external pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Surface form.
    pub text: String,
    /// Lemma (Concept Store key).
    pub lemma: String,
    /// Part-of-speech tag.
    pub pos: PosTag,
    /// Dense word embedding.
    pub vector: Array1<f32>,
}

impl Token {
    /// Create a token.
    pub fn new(
        text: impl Into<String>,
        lemma: impl Into<String>,
        pos: PosTag,
        vector: Array1<f32>,
    ) -> Self {
        Self {
            text: text.into(),
            lemma: lemma.into(),
            pos,
            vector,
        }
    }

    /// Lemma used as the store key; pronoun placeholders fall back to the text.
    pub fn concept_lemma(&self) -> &str {
        if self.lemma == PRONOUN_LEMMA {
            &self.text
        } else {
            &self.lemma
        }
    }
}

/// Check that a sentence is non-empty and uses a single vector dimension.
///
/// Returns the shared dimension.
pub fn check_sentence(tokens: &[Token]) -> Result<usize> {
    let first = tokens.first().ok_or(Error::EmptyInput)?;
    let dim = first.vector.len();
    for token in &tokens[1..] {
        if token.vector.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: token.vector.len(),
            });
        }
    }
    Ok(dim)
}

/// Concept time of a leaf for `lemma`: sentences elapsed since the most
/// recent prior activation, or `max_time_diff` when there is none closer.
pub fn leaf_concept_time(
    store: &ConceptStore,
    lemma: &str,
    sentence_index: usize,
    max_time_diff: f64,
) -> f64 {
    store
        .newest_instance(lemma, sentence_index)
        .map(|id| sentence_index.saturating_sub(store[id].activation_time) as f64)
        .filter(|&diff| diff < max_time_diff)
        .unwrap_or(max_time_diff)
}

/// Create and register one leaf node per token.
///
/// Concept times are read before any leaf of this sentence is inserted, so
/// repeated lemmas within the sentence do not see each other.
pub fn create_leaves(
    store: &mut ConceptStore,
    tokens: &[Token],
    sentence_index: usize,
    max_time_diff: f64,
) -> Result<Vec<NodeId>> {
    let _ = check_sentence(tokens)?;

    let times: Vec<f64> = tokens
        .iter()
        .map(|t| leaf_concept_time(store, t.concept_lemma(), sentence_index, max_time_diff))
        .collect();

    let leaves = tokens
        .iter()
        .zip(times)
        .enumerate()
        .map(|(w, (token, time))| {
            let node = Node::leaf(
                token.concept_lemma(),
                &token.text,
                token.pos,
                token.vector.clone(),
                w,
                sentence_index,
                time,
            );
            store.insert(node)
        })
        .collect();

    Ok(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pos_tag_parse() -> Result<()> {
        assert_eq!("NOUN".parse::<PosTag>()?, PosTag::Noun);
        assert_eq!("adp".parse::<PosTag>()?, PosTag::Adp);
        assert_eq!(PosTag::Verb.to_string(), "VERB");
        assert!("NOPE".parse::<PosTag>().is_err());
        Ok(())
    }

    #[test]
    fn test_pronoun_lemma_replaced() {
        let t = Token::new("she", PRONOUN_LEMMA, PosTag::Pron, array![0.1]);
        assert_eq!(t.concept_lemma(), "she");
    }

    #[test]
    fn test_check_sentence() {
        assert_eq!(check_sentence(&[]), Err(Error::EmptyInput));
        let tokens = vec![
            Token::new("a", "a", PosTag::Det, array![0.1, 0.2]),
            Token::new("b", "b", PosTag::Noun, array![0.1]),
        ];
        assert_eq!(
            check_sentence(&tokens),
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_leaf_concept_time() -> Result<()> {
        let mut store = ConceptStore::new();
        let tokens = vec![Token::new("cat", "cat", PosTag::Noun, array![0.5])];

        // Unseen lemma.
        assert_eq!(leaf_concept_time(&store, "cat", 0, 10.0), 10.0);

        let _ = create_leaves(&mut store, &tokens, 0, 10.0)?;
        // Same sentence instances are ignored.
        assert_eq!(leaf_concept_time(&store, "cat", 0, 10.0), 10.0);
        assert_eq!(leaf_concept_time(&store, "cat", 3, 10.0), 3.0);
        // Older than the cap.
        assert_eq!(leaf_concept_time(&store, "cat", 12, 10.0), 10.0);
        Ok(())
    }

    #[test]
    fn test_create_leaves_positions() -> Result<()> {
        let mut store = ConceptStore::new();
        let tokens = vec![
            Token::new("the", "the", PosTag::Det, array![0.1]),
            Token::new("cat", "cat", PosTag::Noun, array![0.2]),
        ];
        let leaves = create_leaves(&mut store, &tokens, 4, 10.0)?;
        assert_eq!(leaves.len(), 2);
        let cat = &store[leaves[1]];
        assert_eq!(cat.word_index_min, 1);
        assert_eq!(cat.word_index_max, 1);
        assert_eq!(cat.sentence_index, 4);
        assert_eq!(cat.activation_time, 4);
        assert_eq!(cat.subgraph_size, 1);
        Ok(())
    }
}
