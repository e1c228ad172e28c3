use core::fmt;

/// Result alias for `lexgraph`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned while building or transforming a sentence graph.
///
/// Every variant is scoped to the sentence being processed: the concept
/// graph stays usable after any of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// A sentence needs at least two tokens to form a tree.
    SentenceTooShort {
        /// Number of tokens supplied.
        len: usize,
    },

    /// Word vector dimension mismatch.
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// No candidate connection scored above the creation threshold.
    ParseExhausted {
        /// Sentence being parsed.
        sentence_index: usize,
        /// Nodes still unconnected when the search gave up.
        remaining: usize,
    },

    /// A dependency governor could not be determined.
    MissingGovernor {
        /// Lemma of the node lacking a comparison sibling.
        lemma: String,
    },

    /// A relationship node lacks the subject or object it requires.
    AmbiguousRelationship {
        /// Lemma of the relationship node.
        lemma: String,
        /// What was missing.
        reason: &'static str,
    },

    /// Externally supplied parse data was malformed.
    InvalidParse {
        /// Description of the problem.
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::SentenceTooShort { len } => {
                write!(f, "sentence of {len} token(s) is too short to parse")
            }
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::ParseExhausted {
                sentence_index,
                remaining,
            } => write!(
                f,
                "sentence {sentence_index}: no connection above threshold ({remaining} nodes unconnected)"
            ),
            Error::MissingGovernor { lemma } => {
                write!(f, "no governor comparison node for '{lemma}'")
            }
            Error::AmbiguousRelationship { lemma, reason } => {
                write!(f, "relationship '{lemma}': {reason}")
            }
            Error::InvalidParse { message } => write!(f, "invalid parse: {message}"),
        }
    }
}

impl std::error::Error for Error {}
