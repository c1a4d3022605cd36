//! File ↔ node reference index used to decide what a change invalidates

use crate::model::{EdgeKind, NodeId, RelationshipEdge};
use dashmap::DashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Bidirectional index: file → node ids referenced from it, and node id →
/// files referencing it.
///
/// Only the update pipeline writes to the tracker. The two maps are kept as
/// mutual inverses: `file ∈ dependent_files(n)` iff `n ∈ referenced_nodes(file)`.
pub struct DependencyTracker {
    references: DashMap<PathBuf, HashSet<NodeId>>,
    dependents: DashMap<NodeId, HashSet<PathBuf>>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        DependencyTracker {
            references: DashMap::new(),
            dependents: DashMap::new(),
        }
    }

    /// Record that `file` references `target`. Repeated calls are no-ops.
    pub fn record_reference(&self, file: &Path, target: &NodeId) {
        self.references
            .entry(file.to_path_buf())
            .or_default()
            .insert(target.clone());
        self.dependents
            .entry(target.clone())
            .or_default()
            .insert(file.to_path_buf());
    }

    /// Files that reference `node`.
    pub fn dependent_files(&self, node: &NodeId) -> HashSet<PathBuf> {
        self.dependents
            .get(node)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Union of [`DependencyTracker::dependent_files`] over `nodes`.
    pub fn dependent_files_for_nodes<'a>(
        &self,
        nodes: impl IntoIterator<Item = &'a NodeId>,
    ) -> HashSet<PathBuf> {
        let mut files = HashSet::new();
        for node in nodes {
            if let Some(r) = self.dependents.get(node) {
                files.extend(r.value().iter().cloned());
            }
        }
        files
    }

    /// Node ids referenced from `file`.
    pub fn referenced_nodes(&self, file: &Path) -> HashSet<NodeId> {
        self.references
            .get(file)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Drop every entry sourced from `file`, in both directions.
    pub fn remove_references_from_file(&self, file: &Path) {
        let Some((_, targets)) = self.references.remove(file) else {
            return;
        };
        for target in targets {
            if let Some(mut files) = self.dependents.get_mut(&target) {
                files.remove(file);
            }
            self.dependents.remove_if(&target, |_, files| files.is_empty());
        }
    }

    /// Record every non-containment edge that carries an origin file.
    pub fn record_edges<'a>(&self, edges: impl IntoIterator<Item = &'a RelationshipEdge>) {
        for edge in edges {
            if edge.kind == EdgeKind::Contains {
                continue;
            }
            if let Some(file) = &edge.file_path {
                self.record_reference(file, &edge.target_id);
            }
        }
    }

    /// Reset the tracker to exactly the references carried by `edges`.
    pub fn rebuild_from_edges<'a>(&self, edges: impl IntoIterator<Item = &'a RelationshipEdge>) {
        self.clear();
        self.record_edges(edges);
    }

    /// Number of files with at least one recorded reference.
    pub fn file_count(&self) -> usize {
        self.references.len()
    }

    pub fn clear(&self) {
        self.references.clear();
        self.dependents.clear();
    }
}

impl Default for DependencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn assert_inverse(tracker: &DependencyTracker) {
        for entry in tracker.references.iter() {
            for node in entry.value() {
                assert!(tracker.dependent_files(node).contains(entry.key()));
            }
        }
        for entry in tracker.dependents.iter() {
            for file in entry.value() {
                assert!(tracker.referenced_nodes(file).contains(entry.key()));
            }
        }
    }

    #[test]
    fn test_record_reference_is_idempotent() {
        let tracker = DependencyTracker::new();
        tracker.record_reference(Path::new("b.cs"), &id("A.M"));
        tracker.record_reference(Path::new("b.cs"), &id("A.M"));

        assert_eq!(tracker.referenced_nodes(Path::new("b.cs")).len(), 1);
        assert_eq!(tracker.dependent_files(&id("A.M")).len(), 1);
        assert_inverse(&tracker);
    }

    #[test]
    fn test_dependent_files_for_nodes_is_a_union() {
        let tracker = DependencyTracker::new();
        tracker.record_reference(Path::new("b.cs"), &id("A.M"));
        tracker.record_reference(Path::new("c.cs"), &id("A.N"));
        tracker.record_reference(Path::new("c.cs"), &id("A.M"));

        let files = tracker.dependent_files_for_nodes([&id("A.M"), &id("A.N"), &id("Z")]);
        assert_eq!(files.len(), 2);
        assert!(files.contains(Path::new("b.cs")));
        assert!(files.contains(Path::new("c.cs")));
    }

    #[test]
    fn test_remove_references_collects_empty_reverse_entries() {
        let tracker = DependencyTracker::new();
        tracker.record_reference(Path::new("b.cs"), &id("A.M"));
        tracker.record_reference(Path::new("b.cs"), &id("A.N"));
        tracker.record_reference(Path::new("c.cs"), &id("A.M"));

        tracker.remove_references_from_file(Path::new("b.cs"));

        assert!(tracker.referenced_nodes(Path::new("b.cs")).is_empty());
        assert_eq!(tracker.dependent_files(&id("A.M")).len(), 1);
        assert!(!tracker.dependents.contains_key(&id("A.N")));
        assert_inverse(&tracker);
    }

    #[test]
    fn test_rebuild_skips_containment_edges() {
        let tracker = DependencyTracker::new();
        tracker.record_reference(Path::new("stale.cs"), &id("X"));

        let edges = vec![
            RelationshipEdge::new("A", "A.M", EdgeKind::Contains).observed_at("a.cs", 1),
            RelationshipEdge::new("B.Run", "A.M", EdgeKind::Calls).observed_at("b.cs", 4),
            RelationshipEdge::new("B", "A", EdgeKind::Inherits),
        ];
        tracker.rebuild_from_edges(&edges);

        assert_eq!(tracker.file_count(), 1);
        assert!(tracker.referenced_nodes(Path::new("a.cs")).is_empty());
        assert!(tracker.dependent_files(&id("A.M")).contains(Path::new("b.cs")));
        assert!(tracker.dependent_files(&id("X")).is_empty());
        assert_inverse(&tracker);
    }
}
