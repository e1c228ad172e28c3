//! Constituency tree construction.
//!
//! | Builder | Input | Shape |
//! |---------|-------|-------|
//! | [`build_tree`] | leaves only | binary, greedy by connection metric |
//! | [`build_from_bracketing`] | leaves + labeled bracketing | n-ary, labeled |
//!
//! Both register every branch they create in the [`ConceptStore`](crate::graph::ConceptStore),
//! set `parent`/`source_position` on the children, and mark the root `Head`.

mod formal;
mod greedy;
mod history;

pub use formal::{build_from_bracketing, parse_bracketing, Bracket};
pub use greedy::build_tree;
pub use history::{Merge, MergeHistory};

use crate::graph::NodeId;
use crate::metrics::CalibrationStats;

/// Result of building one sentence's constituency tree.
#[derive(Debug, Clone)]
pub struct TreeBuild {
    /// Sentence root.
    pub head: NodeId,
    /// Internal nodes created, in creation order (the head is last).
    pub branches: Vec<NodeId>,
    /// Merge record (greedy builder only).
    pub history: Option<MergeHistory>,
    /// Factor ranges observed while scoring pairs.
    pub stats: CalibrationStats,
}
