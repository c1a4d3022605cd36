//! Lookup, search and one-hop queries over the graph store

use crate::types::*;
use arbor_core::{DeclarationNode, EdgeKind, GraphStats, GraphStore, NodeId, NodeKind};
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Read-only query engine over a shared graph store.
///
/// Every walk keeps its own visited set, so concurrent callers never share
/// traversal state and cyclic graphs terminate.
#[derive(Clone)]
pub struct Navigator {
    pub(crate) store: Arc<GraphStore>,
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("store", &self.store)
            .finish()
    }
}

impl Navigator {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Navigator { store }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn node(&self, id: &NodeId) -> Option<DeclarationNode> {
        self.store.node(id)
    }

    pub fn stats(&self) -> GraphStats {
        self.store.stats()
    }

    /// Search by name or fully qualified name.
    pub fn search(&self, query: &SearchQuery) -> Page<DeclarationNode> {
        let candidates = match query.kind {
            Some(kind) => self.store.nodes_by_kind(kind),
            None => self.store.all_nodes(),
        };

        let mut matches: Vec<DeclarationNode> = candidates
            .into_iter()
            .filter(|n| query.matches(&n.name) || query.matches(&n.fully_qualified_name))
            .collect();
        matches.sort_by(|a, b| {
            a.fully_qualified_name
                .cmp(&b.fully_qualified_name)
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(text = %query.text, hits = matches.len(), "search");
        Page::new(matches, query.limit)
    }

    /// Direct containment children, in source order.
    pub fn children(
        &self,
        id: &NodeId,
        kind: Option<NodeKind>,
        limit: usize,
    ) -> Option<Page<DeclarationNode>> {
        if !self.store.contains_node(id) {
            return None;
        }

        let mut children: Vec<DeclarationNode> = self
            .contained(id)
            .into_iter()
            .filter_map(|child| self.store.node(&child))
            .filter(|child| kind.is_none_or(|k| child.kind == k))
            .collect();
        children.sort_by(source_order);

        Some(Page::new(children, limit))
    }

    /// Containment chain above a node, root first. Empty for a root.
    pub fn ancestors(&self, id: &NodeId) -> Option<Vec<DeclarationNode>> {
        if !self.store.contains_node(id) {
            return None;
        }

        let mut chain = Vec::new();
        let mut visited = HashSet::from([id.clone()]);
        let mut current = id.clone();

        while let Some(parent) = self.container(&current) {
            if !visited.insert(parent.clone()) {
                break;
            }
            let Some(node) = self.store.node(&parent) else {
                break;
            };
            chain.push(node);
            current = parent;
        }

        chain.reverse();
        Some(chain)
    }

    /// Non-containment edges around a node, capped per direction.
    pub fn relationships(
        &self,
        id: &NodeId,
        kind: Option<EdgeKind>,
        direction: EdgeDirection,
        limit: usize,
    ) -> Option<Relationships> {
        let node = self.store.node(id)?;
        let wanted = |edge_kind: EdgeKind| {
            edge_kind != EdgeKind::Contains && kind.is_none_or(|k| edge_kind == k)
        };

        let outgoing = if direction != EdgeDirection::Incoming {
            self.store
                .outgoing_edges(id)
                .into_iter()
                .filter(|e| wanted(e.kind))
                .map(|edge| RelatedEdge {
                    node: self.store.node(&edge.target_id),
                    edge,
                })
                .collect()
        } else {
            Vec::new()
        };

        let incoming = if direction != EdgeDirection::Outgoing {
            self.store
                .incoming_edges(id)
                .into_iter()
                .filter(|e| wanted(e.kind))
                .map(|edge| RelatedEdge {
                    node: self.store.node(&edge.source_id),
                    edge,
                })
                .collect()
        } else {
            Vec::new()
        };

        Some(Relationships {
            node,
            outgoing: Page::new(sorted_by_line(outgoing), limit),
            incoming: Page::new(sorted_by_line(incoming), limit),
        })
    }

    /// Every node of `kind`, optionally only those transitively contained in
    /// `scope`. `None` when the scope node does not exist.
    pub fn list_by_kind(
        &self,
        kind: NodeKind,
        scope: Option<&NodeId>,
        limit: usize,
    ) -> Option<Page<DeclarationNode>> {
        let scope_set = match scope {
            Some(scope) if !self.store.contains_node(scope) => return None,
            Some(scope) => Some(self.descendants(scope)),
            None => None,
        };

        let mut nodes: Vec<DeclarationNode> = self
            .store
            .nodes_by_kind(kind)
            .into_iter()
            .filter(|n| scope_set.as_ref().is_none_or(|set| set.contains(&n.id)))
            .collect();
        nodes.sort_by(|a, b| {
            a.fully_qualified_name
                .cmp(&b.fully_qualified_name)
                .then_with(|| a.id.cmp(&b.id))
        });

        Some(Page::new(nodes, limit))
    }

    /// Targets of a node's `Contains` edges.
    pub(crate) fn contained(&self, id: &NodeId) -> Vec<NodeId> {
        self.store
            .outgoing_edges(id)
            .into_iter()
            .filter(|e| e.kind == EdgeKind::Contains)
            .map(|e| e.target_id)
            .collect()
    }

    /// Source of the node's `Contains` edge, if any.
    pub(crate) fn container(&self, id: &NodeId) -> Option<NodeId> {
        self.store
            .incoming_edges(id)
            .into_iter()
            .find(|e| e.kind == EdgeKind::Contains)
            .map(|e| e.source_id)
    }

    /// Transitive containment descendants, excluding `root` itself.
    fn descendants(&self, root: &NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root.clone()]);

        while let Some(current) = queue.pop_front() {
            for child in self.contained(&current) {
                if child != *root && seen.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }

        seen
    }
}

/// Declarations without a line sort after those with one.
pub(crate) fn source_order(a: &DeclarationNode, b: &DeclarationNode) -> Ordering {
    let key = |n: &DeclarationNode| {
        (
            n.start_line.unwrap_or(u32::MAX),
            n.start_column.unwrap_or(u32::MAX),
        )
    };
    key(a)
        .cmp(&key(b))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

fn sorted_by_line(mut related: Vec<RelatedEdge>) -> Vec<RelatedEdge> {
    related.sort_by(|a, b| {
        (&a.edge.file_path, a.edge.line.unwrap_or(u32::MAX), &a.edge.id).cmp(&(
            &b.edge.file_path,
            b.edge.line.unwrap_or(u32::MAX),
            &b.edge.id,
        ))
    });
    related
}
