//! In-memory graph store with id, adjacency, kind and file indices

use crate::model::*;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// The declaration graph: nodes keyed by id, edges indexed by endpoint and
/// origin file.
///
/// Every collection is a sharded concurrent map, so readers never block on
/// each other and observe writes as soon as they land. There is no snapshot
/// isolation between calls.
pub struct GraphStore {
    nodes: DashMap<NodeId, DeclarationNode>,
    edges: DashMap<EdgeId, RelationshipEdge>,
    outgoing: DashMap<NodeId, BTreeSet<EdgeId>>,
    incoming: DashMap<NodeId, BTreeSet<EdgeId>>,
    file_nodes: DashMap<PathBuf, BTreeSet<NodeId>>,
    file_edges: DashMap<PathBuf, BTreeSet<EdgeId>>,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("node_count", &self.nodes.len())
            .field("edge_count", &self.edges.len())
            .finish()
    }
}

/// Node and edge counts, broken down by kind.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub file_count: usize,
    pub nodes_by_kind: BTreeMap<NodeKind, usize>,
    pub edges_by_kind: BTreeMap<EdgeKind, usize>,
}

impl GraphStore {
    pub fn new() -> Self {
        GraphStore {
            nodes: DashMap::new(),
            edges: DashMap::new(),
            outgoing: DashMap::new(),
            incoming: DashMap::new(),
            file_nodes: DashMap::new(),
            file_edges: DashMap::new(),
        }
    }

    /// Build a store holding everything in `snapshot`.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let store = GraphStore::new();
        store.load_snapshot(snapshot);
        store
    }

    /// Replace the whole store content with `snapshot`.
    pub fn load_snapshot(&self, snapshot: GraphSnapshot) {
        self.clear();
        self.add_nodes(snapshot.nodes);
        self.add_edges(snapshot.edges);
    }

    /// Copy the current content, nodes and edges ordered by id.
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut nodes = self.all_nodes();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let mut edges = self.all_edges();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        GraphSnapshot { nodes, edges }
    }

    // ── Nodes ───────────────────────────────────────────────

    /// Insert a node, replacing any node with the same id.
    pub fn add_node(&self, node: DeclarationNode) {
        let id = node.id.clone();
        let file = node.file_path.clone();
        if let Some(previous) = self.nodes.insert(id.clone(), node) {
            if previous.file_path != file {
                unindex(&self.file_nodes, &previous.file_path, &id);
            }
        }
        self.file_nodes.entry(file).or_default().insert(id);
    }

    pub fn add_nodes(&self, nodes: impl IntoIterator<Item = DeclarationNode>) {
        for node in nodes {
            self.add_node(node);
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<DeclarationNode> {
        self.nodes.get(id).map(|r| r.value().clone())
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes of a kind, ordered by id.
    pub fn nodes_by_kind(&self, kind: NodeKind) -> Vec<DeclarationNode> {
        let mut nodes: Vec<DeclarationNode> = self
            .nodes
            .iter()
            .filter(|r| r.value().kind == kind)
            .map(|r| r.value().clone())
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Nodes declared in a file, ordered by id.
    pub fn nodes_by_file(&self, path: &Path) -> Vec<DeclarationNode> {
        let ids = indexed(&self.file_nodes, path);
        ids.iter().filter_map(|id| self.node(id)).collect()
    }

    /// Remove a node. Its edges stay until [`GraphStore::remove_edges_by_node_id`].
    pub fn remove_node(&self, id: &NodeId) -> Option<DeclarationNode> {
        let (_, node) = self.nodes.remove(id)?;
        unindex(&self.file_nodes, &node.file_path, id);
        Some(node)
    }

    pub fn remove_nodes<'a>(&self, ids: impl IntoIterator<Item = &'a NodeId>) -> usize {
        ids.into_iter()
            .filter(|id| self.remove_node(id).is_some())
            .count()
    }

    /// Remove every node declared in `path`; returns the removed ids.
    pub fn remove_nodes_by_file(&self, path: &Path) -> Vec<NodeId> {
        let Some((_, ids)) = self.file_nodes.remove(path) else {
            return Vec::new();
        };
        ids.into_iter()
            .filter(|id| self.nodes.remove(id).is_some())
            .collect()
    }

    // ── Edges ───────────────────────────────────────────────

    /// Append an edge. An edge with the same id is replaced.
    pub fn add_edge(&self, edge: RelationshipEdge) {
        let id = edge.id.clone();
        self.outgoing
            .entry(edge.source_id.clone())
            .or_default()
            .insert(id.clone());
        self.incoming
            .entry(edge.target_id.clone())
            .or_default()
            .insert(id.clone());
        if let Some(file) = &edge.file_path {
            self.file_edges
                .entry(file.clone())
                .or_default()
                .insert(id.clone());
        }
        if let Some(previous) = self.edges.insert(id, edge) {
            self.unindex_replaced_edge(&previous);
        }
    }

    pub fn add_edges(&self, edges: impl IntoIterator<Item = RelationshipEdge>) {
        for edge in edges {
            self.add_edge(edge);
        }
    }

    pub fn edge(&self, id: &EdgeId) -> Option<RelationshipEdge> {
        self.edges.get(id).map(|r| r.value().clone())
    }

    /// Edges whose source is `id`, ordered by edge id.
    pub fn outgoing_edges(&self, id: &NodeId) -> Vec<RelationshipEdge> {
        self.resolve_edges(&indexed(&self.outgoing, id))
    }

    /// Edges whose target is `id`, ordered by edge id.
    pub fn incoming_edges(&self, id: &NodeId) -> Vec<RelationshipEdge> {
        self.resolve_edges(&indexed(&self.incoming, id))
    }

    pub fn edges_by_kind(&self, kind: EdgeKind) -> Vec<RelationshipEdge> {
        let mut edges: Vec<RelationshipEdge> = self
            .edges
            .iter()
            .filter(|r| r.value().kind == kind)
            .map(|r| r.value().clone())
            .collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        edges
    }

    /// Edges observed in `path`.
    pub fn edges_by_source_file(&self, path: &Path) -> Vec<RelationshipEdge> {
        self.resolve_edges(&indexed(&self.file_edges, path))
    }

    /// Check if an edge of `kind` exists between two nodes.
    pub fn has_edge_between(&self, source: &NodeId, target: &NodeId, kind: EdgeKind) -> bool {
        self.outgoing_edges(source)
            .iter()
            .any(|e| &e.target_id == target && e.kind == kind)
    }

    pub fn remove_edge(&self, id: &EdgeId) -> Option<RelationshipEdge> {
        let (_, edge) = self.edges.remove(id)?;
        unindex(&self.outgoing, &edge.source_id, id);
        unindex(&self.incoming, &edge.target_id, id);
        if let Some(file) = &edge.file_path {
            unindex(&self.file_edges, file, id);
        }
        Some(edge)
    }

    /// Remove every edge observed in `path`; returns how many were removed.
    pub fn remove_edges_by_source_file(&self, path: &Path) -> usize {
        let ids = indexed(&self.file_edges, path);
        ids.iter()
            .filter(|id| self.remove_edge(id).is_some())
            .count()
    }

    /// Remove every edge with `id` as source or target.
    pub fn remove_edges_by_node_id(&self, id: &NodeId) -> usize {
        let mut ids = indexed(&self.outgoing, id);
        ids.extend(indexed(&self.incoming, id));
        ids.iter()
            .filter(|edge_id| self.remove_edge(edge_id).is_some())
            .count()
    }

    // ── Whole graph ─────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn all_nodes(&self) -> Vec<DeclarationNode> {
        self.nodes.iter().map(|r| r.value().clone()).collect()
    }

    pub fn all_edges(&self) -> Vec<RelationshipEdge> {
        self.edges.iter().map(|r| r.value().clone()).collect()
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            file_count: self.file_nodes.len(),
            ..GraphStats::default()
        };
        for node in self.nodes.iter() {
            *stats.nodes_by_kind.entry(node.value().kind).or_insert(0) += 1;
        }
        for edge in self.edges.iter() {
            *stats.edges_by_kind.entry(edge.value().kind).or_insert(0) += 1;
        }
        stats
    }

    pub fn clear(&self) {
        self.nodes.clear();
        self.edges.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.file_nodes.clear();
        self.file_edges.clear();
    }

    fn resolve_edges(&self, ids: &BTreeSet<EdgeId>) -> Vec<RelationshipEdge> {
        ids.iter().filter_map(|id| self.edge(id)).collect()
    }

    /// Drop index entries of an edge that was overwritten under the same id
    /// but no longer shares an endpoint or origin file with its replacement.
    fn unindex_replaced_edge(&self, previous: &RelationshipEdge) {
        let Some(current) = self.edge(&previous.id) else {
            return;
        };
        if current.source_id != previous.source_id {
            unindex(&self.outgoing, &previous.source_id, &previous.id);
        }
        if current.target_id != previous.target_id {
            unindex(&self.incoming, &previous.target_id, &previous.id);
        }
        if let Some(file) = &previous.file_path {
            if current.file_path.as_ref() != Some(file) {
                unindex(&self.file_edges, file, &previous.id);
            }
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Clone the set stored under `key`, releasing the shard lock before returning.
fn indexed<K, Q, V>(index: &DashMap<K, BTreeSet<V>>, key: &Q) -> BTreeSet<V>
where
    K: Eq + Hash + std::borrow::Borrow<Q>,
    Q: Eq + Hash + ?Sized,
    V: Clone + Ord,
{
    index.get(key).map(|r| r.value().clone()).unwrap_or_default()
}

/// Remove `value` from the set under `key`, dropping the entry once empty.
fn unindex<K, Q, V>(index: &DashMap<K, BTreeSet<V>>, key: &Q, value: &V)
where
    K: Eq + Hash + std::borrow::Borrow<Q>,
    Q: Eq + Hash + ?Sized,
    V: Ord,
{
    if let Some(mut set) = index.get_mut(key) {
        set.remove(value);
    }
    index.remove_if(key, |_, set| set.is_empty());
}
