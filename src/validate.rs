//! Structural validation and health checking.
//!
//! Checks the invariants the builders and the resolver are meant to keep:
//!
//! | Check | Scope |
//! |-------|-------|
//! | [`validate_sentence_tree`] | one head, contiguous adjacent children, every sentence node reachable, parent/child agreement, no cycles |
//! | [`validate_dependency_tree`] | one root, governor/dependent agreement, every leaf reached, no cycles |
//! | [`validate_store`] | no cycle anywhere in the child graph, every node reachable from a head registered |
//!
//! # Example
//!
//! ```rust,ignore
//! use lexgraph::{ConceptGraph, GraphConfig, HealthCheck};
//!
//! let mut graph = ConceptGraph::new(GraphConfig::default())?;
//! // ... process sentences ...
//!
//! let report = graph.health_check();
//! if !report.is_healthy() {
//!     for issue in report.validation.issues {
//!         eprintln!("{}", issue);
//!     }
//! }
//! ```

use std::collections::{HashMap, HashSet};

use crate::graph::{ConceptStore, NodeId, NodeKind};
use crate::pipeline::ConceptGraph;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational, not a problem.
    Info,
    /// Something unusual but not necessarily wrong.
    Warning,
    /// A broken invariant.
    Error,
    /// Structure that traversals cannot handle (cycles).
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single issue found during validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Node involved, if any.
    pub node: Option<NodeId>,
    /// Additional context.
    pub context: Option<String>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            node: None,
            context: None,
        }
    }

    /// Attach the node involved.
    pub fn with_node(mut self, id: NodeId) -> Self {
        self.node = Some(id);
        self
    }

    /// Attach context.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(id) = self.node {
            write!(f, " (node {})", id)?;
        }
        if let Some(ctx) = &self.context {
            write!(f, " - {}", ctx)?;
        }
        Ok(())
    }
}

/// Issues collected by one or more checks.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All issues found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Add an issue.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Add an info-level issue.
    pub fn info(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Info, message));
    }

    /// Add a warning-level issue.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Warning, message));
    }

    /// Add an error-level issue.
    pub fn error(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Error, message));
    }

    /// Add a critical-level issue.
    pub fn critical(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Critical, message));
    }

    /// Append every issue from `other`.
    pub fn extend(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }

    /// True if no issue is an error or worse.
    pub fn is_healthy(&self) -> bool {
        !self.issues.iter().any(|i| i.severity >= Severity::Error)
    }

    /// True if there are no issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues at `min_severity` or higher.
    pub fn issues_at_level(&self, min_severity: Severity) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity >= min_severity)
            .collect()
    }

    /// Count issues by severity.
    pub fn counts(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_default() += 1;
        }
        counts
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_clean() {
            return write!(f, "Validation passed: no issues found");
        }

        let counts = self.counts();
        write!(f, "Validation report: ")?;

        let parts: Vec<String> = [
            (Severity::Critical, "critical"),
            (Severity::Error, "errors"),
            (Severity::Warning, "warnings"),
            (Severity::Info, "info"),
        ]
        .iter()
        .filter_map(|(sev, name)| counts.get(sev).map(|c| format!("{} {}", c, name)))
        .collect();

        writeln!(f, "{}", parts.join(", "))?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// Validation plus store statistics.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Validation issues.
    pub validation: ValidationReport,
    /// Registered nodes.
    pub node_count: usize,
    /// Distinct lemmas with at least one instance.
    pub concept_count: usize,
    /// Sentence heads recorded.
    pub sentence_count: usize,
    /// Registered leaves.
    pub leaf_count: usize,
    /// Highest `tree_level` of any node.
    pub max_tree_level: usize,
}

impl HealthReport {
    /// True if no issue is an error or worse.
    pub fn is_healthy(&self) -> bool {
        self.validation.is_healthy()
    }
}

impl std::fmt::Display for HealthReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Concept Graph Health Report")?;
        writeln!(f, "===========================")?;
        writeln!(
            f,
            "Nodes: {} ({} leaves, {} concepts)",
            self.node_count, self.leaf_count, self.concept_count
        )?;
        writeln!(f, "Sentences: {}", self.sentence_count)?;
        writeln!(f, "Max tree level: {}", self.max_tree_level)?;
        writeln!(f)?;
        write!(f, "{}", self.validation)
    }
}

/// Types that can be health-checked.
pub trait HealthCheck {
    /// Perform a health check and return a report.
    fn health_check(&self) -> HealthReport;

    /// Quick check: returns true if healthy.
    fn is_healthy(&self) -> bool {
        self.health_check().is_healthy()
    }
}

impl HealthCheck for ConceptGraph {
    fn health_check(&self) -> HealthReport {
        let store = self.store();
        let validation = validate_store(store, self.heads());
        HealthReport {
            validation,
            node_count: store.len(),
            concept_count: store.concept_count(),
            sentence_count: self.heads().len(),
            leaf_count: store.iter().filter(|(_, n)| n.is_leaf()).count(),
            max_tree_level: store.iter().map(|(_, n)| n.tree_level).max().unwrap_or(0),
        }
    }
}

/// Check the constituency tree under `head`.
pub fn validate_sentence_tree(store: &ConceptStore, head: NodeId) -> ValidationReport {
    let mut report = ValidationReport::new();
    let Some(head_node) = store.get(head) else {
        report.add(ValidationIssue::new(Severity::Critical, "head is not registered").with_node(head));
        return report;
    };
    if head_node.kind != NodeKind::Head {
        report.add(
            ValidationIssue::new(Severity::Error, "tree root is not marked as head")
                .with_node(head)
                .with_context(format!("kind {:?}", head_node.kind)),
        );
    }
    let sentence = head_node.sentence_index;

    if has_cycle(store, &[head]) {
        report.critical("cycle detected in sentence tree");
        return report;
    }

    let reachable = reachable_from(store, &[head], &mut report);

    let mut heads = 0;
    for &id in &reachable {
        let node = &store[id];
        if node.kind == NodeKind::Head && node.sentence_index == sentence {
            heads += 1;
        }
        check_parents(store, id, &mut report);
        if node.sentence_index == sentence {
            check_contiguity(store, id, &mut report);
        }
    }
    if heads != 1 {
        report.error(format!("expected one head, found {heads}"));
    }

    let orphans: Vec<NodeId> = store
        .iter()
        .filter(|(id, n)| n.sentence_index == sentence && !reachable.contains(id))
        .map(|(id, _)| id)
        .collect();
    if !orphans.is_empty() {
        report.add(
            ValidationIssue::new(
                Severity::Error,
                format!("{} sentence nodes not reachable from head", orphans.len()),
            )
            .with_context(format!("first few: {:?}", &orphans[..orphans.len().min(5)])),
        );
    }

    report
}

/// Every listed child names its parent; a child claimed by another parent
/// that also lists it is shared across sentences.
fn check_parents(store: &ConceptStore, id: NodeId, report: &mut ValidationReport) {
    for &child in &store[id].children {
        let Some(child_node) = store.get(child) else {
            continue;
        };
        match child_node.parent {
            Some(p) if p == id => {}
            Some(p) if store.get(p).map_or(false, |pn| pn.children.contains(&child)) => {
                report.add(
                    ValidationIssue::new(Severity::Info, "node shared with another parent")
                        .with_node(child)
                        .with_context(format!("listed by {id}, parent {p}")),
                );
            }
            other => {
                report.add(
                    ValidationIssue::new(
                        Severity::Error,
                        "parent-child inconsistency: parent lists child but child names another parent",
                    )
                    .with_node(child)
                    .with_context(format!("listed by {id}, parent {other:?}")),
                );
            }
        }
    }
}

/// Adjacent children built in the same sentence cover adjacent word ranges.
fn check_contiguity(store: &ConceptStore, id: NodeId, report: &mut ValidationReport) {
    let node = &store[id];
    let comparable = |c: NodeId| {
        store.get(c).filter(|n| {
            n.sentence_index == node.sentence_index && n.kind != NodeKind::Relationship
        })
    };
    for pair in node.children.windows(2) {
        let (Some(a), Some(b)) = (comparable(pair[0]), comparable(pair[1])) else {
            continue;
        };
        if a.word_index_max + 1 != b.word_index_min {
            report.add(
                ValidationIssue::new(Severity::Error, "adjacent children are not contiguous")
                    .with_node(id)
                    .with_context(format!(
                        "{}..={} then {}..={}",
                        a.word_index_min, a.word_index_max, b.word_index_min, b.word_index_max
                    )),
            );
        }
    }
}

/// Check the dependency tree rooted at `root` over `leaves`.
pub fn validate_dependency_tree(
    store: &ConceptStore,
    root: NodeId,
    leaves: &[NodeId],
) -> ValidationReport {
    let mut report = ValidationReport::new();
    let Some(root_node) = store.get(root) else {
        report.add(ValidationIssue::new(Severity::Critical, "root is not registered").with_node(root));
        return report;
    };
    if let Some(g) = root_node.governor {
        report.add(
            ValidationIssue::new(Severity::Error, "root has a governor")
                .with_node(root)
                .with_context(format!("governor {g}")),
        );
    }

    for &leaf in leaves {
        let Some(node) = store.get(leaf) else {
            report.add(ValidationIssue::new(Severity::Error, "leaf is not registered").with_node(leaf));
            continue;
        };
        match node.governor {
            None if leaf != root => {
                report.add(ValidationIssue::new(Severity::Error, "second root").with_node(leaf));
            }
            Some(g) if !store.get(g).map_or(false, |gn| gn.dependents.contains(&leaf)) => {
                report.add(
                    ValidationIssue::new(Severity::Error, "governor does not list dependent")
                        .with_node(leaf)
                        .with_context(format!("governor {g}")),
                );
            }
            _ => {}
        }
    }

    // Cycles first: the reachability walk below relies on them being absent.
    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();
    if dependency_cycle(store, root, &mut visited, &mut in_stack) {
        report.critical("cycle detected in dependency tree");
        return report;
    }

    let missing: Vec<NodeId> = leaves
        .iter()
        .copied()
        .filter(|l| !visited.contains(l))
        .collect();
    if !missing.is_empty() {
        report.add(
            ValidationIssue::new(
                Severity::Error,
                format!("{} leaves not reached from the dependency root", missing.len()),
            )
            .with_context(format!("first few: {:?}", &missing[..missing.len().min(5)])),
        );
    }

    report
}

fn dependency_cycle(
    store: &ConceptStore,
    node: NodeId,
    visited: &mut HashSet<NodeId>,
    in_stack: &mut HashSet<NodeId>,
) -> bool {
    if in_stack.contains(&node) {
        return true;
    }
    if !visited.insert(node) {
        return false;
    }
    let _ = in_stack.insert(node);
    if let Some(n) = store.get(node) {
        for &dep in &n.dependents {
            if dependency_cycle(store, dep, visited, in_stack) {
                return true;
            }
        }
    }
    let _ = in_stack.remove(&node);
    false
}

/// Check store-wide invariants: the child graph is acyclic, every node
/// reachable from `heads` is registered under its own `(lemma, instance)`.
pub fn validate_store(store: &ConceptStore, heads: &[NodeId]) -> ValidationReport {
    let mut report = ValidationReport::new();

    let all: Vec<NodeId> = store.iter().map(|(id, _)| id).collect();
    if has_cycle(store, &all) {
        report.critical("cycle detected in concept store");
        return report;
    }

    for &head in heads {
        if !store.contains(head) {
            report.add(ValidationIssue::new(Severity::Error, "sentence head is not registered").with_node(head));
        }
    }
    let reachable = reachable_from(store, heads, &mut report);

    for id in reachable {
        let node = &store[id];
        if store.instance(&node.lemma, node.instance_id) != Some(id) {
            report.add(
                ValidationIssue::new(Severity::Error, "node is not registered under its lemma")
                    .with_node(id)
                    .with_context(format!("{}#{}", node.lemma, node.instance_id)),
            );
        }
    }

    report
}

/// Registered nodes reachable from `roots`. Dangling child ids are reported.
fn reachable_from(
    store: &ConceptStore,
    roots: &[NodeId],
    report: &mut ValidationReport,
) -> HashSet<NodeId> {
    let mut reachable = HashSet::new();
    let mut stack: Vec<NodeId> = roots.iter().copied().filter(|&r| store.contains(r)).collect();
    while let Some(id) = stack.pop() {
        if !reachable.insert(id) {
            continue;
        }
        for &child in &store[id].children {
            if store.contains(child) {
                stack.push(child);
            } else {
                report.add(
                    ValidationIssue::new(Severity::Error, "child id does not exist")
                        .with_node(id)
                        .with_context(format!("missing child {child}")),
                );
            }
        }
    }
    reachable
}

/// DFS with coloring over `children`, starting from each of `roots`.
fn has_cycle(store: &ConceptStore, roots: &[NodeId]) -> bool {
    fn detect(
        store: &ConceptStore,
        node: NodeId,
        visited: &mut HashSet<NodeId>,
        in_stack: &mut HashSet<NodeId>,
    ) -> bool {
        if in_stack.contains(&node) {
            return true;
        }
        if visited.contains(&node) {
            return false;
        }
        let _ = visited.insert(node);
        let _ = in_stack.insert(node);
        if let Some(n) = store.get(node) {
            for &child in &n.children {
                if detect(store, child, visited, in_stack) {
                    return true;
                }
            }
        }
        let _ = in_stack.remove(&node);
        false
    }

    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();
    roots
        .iter()
        .any(|&r| detect(store, r, &mut visited, &mut in_stack))
}
