//! Node model and the persistent Concept Store.
//!
//! Every node of every sentence lives in one [`ConceptStore`]. Sentence trees
//! are views over it: a head [`NodeId`] plus the `children`/`parent` links of
//! the nodes below it. After reference resolution a sentence tree may point
//! into subtrees created by earlier sentences, so the store as a whole is a
//! DAG of shared subtrees rather than a forest.
//!
//! ```text
//!   sentence 0:        head0                 sentence 1:     head1
//!                     /     \                               /     \
//!                 "the dog"  "ran"   <-- reused --   "the dog"    "ran again"
//! ```

mod node;
mod store;

pub use node::{Delimiter, Node, NodeId, NodeKind, SourcePosition};
pub use store::ConceptStore;
