//! Containment trees, per file and from a root

use crate::navigator::{Navigator, source_order};
use crate::types::*;
use arbor_core::{DeclarationNode, NodeId, NodeKind};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

impl Navigator {
    /// Declarations of one file arranged by containment.
    ///
    /// A node's parent is its nearest containing ancestor declared in the
    /// same file; nodes with none are roots. `None` when the file holds no
    /// declarations.
    pub fn file_declarations(&self, path: &Path) -> Option<FileDeclarations> {
        let nodes = self.store.nodes_by_file(path);
        if nodes.is_empty() {
            return None;
        }

        let in_file: HashSet<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
        let mut children: HashMap<NodeId, Vec<DeclarationNode>> = HashMap::new();
        let mut roots = Vec::new();

        for node in &nodes {
            match self.in_file_parent(&node.id, &in_file) {
                Some(parent) => children.entry(parent).or_default().push(node.clone()),
                None => roots.push(node.clone()),
            }
        }

        roots.sort_by(source_order);
        let total_count = nodes.len();
        Some(FileDeclarations {
            file_path: path.to_path_buf(),
            roots: assemble(roots, children),
            total_count,
        })
    }

    /// Containment tree below `root`, or below every parentless node when no
    /// root is given, down to `max_depth` levels.
    ///
    /// With a kind filter, children of other kinds are left out together with
    /// their subtrees; the roots themselves are always kept. `None` when the
    /// root does not exist.
    pub fn tree(
        &self,
        root: Option<&NodeId>,
        max_depth: u32,
        kind: Option<NodeKind>,
    ) -> Option<ContainmentTree> {
        let mut roots = match root {
            Some(id) => vec![self.store.node(id)?],
            None => self.roots(),
        };
        roots.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| source_order(a, b))
        });

        let mut visited: HashSet<NodeId> = roots.iter().map(|n| n.id.clone()).collect();
        let mut queue: VecDeque<(NodeId, u32)> = roots.iter().map(|n| (n.id.clone(), 0)).collect();
        let mut children: HashMap<NodeId, Vec<DeclarationNode>> = HashMap::new();
        let mut depth_reached = 0;

        while let Some((current, level)) = queue.pop_front() {
            depth_reached = depth_reached.max(level);
            if level >= max_depth {
                continue;
            }
            for child_id in self.contained(&current) {
                let Some(child) = self.store.node(&child_id) else {
                    continue;
                };
                if kind.is_some_and(|k| child.kind != k) {
                    continue;
                }
                if !visited.insert(child_id.clone()) {
                    continue;
                }
                queue.push_back((child_id, level + 1));
                children.entry(current.clone()).or_default().push(child);
            }
        }

        let total_nodes = visited.len();
        Some(ContainmentTree {
            roots: assemble(roots, children),
            total_nodes,
            max_depth,
            depth_reached,
        })
    }

    /// Nodes without an existing containing node.
    fn roots(&self) -> Vec<DeclarationNode> {
        self.store
            .all_nodes()
            .into_iter()
            .filter(|n| {
                self.container(&n.id)
                    .is_none_or(|parent| !self.store.contains_node(&parent))
            })
            .collect()
    }

    fn in_file_parent(&self, id: &NodeId, in_file: &HashSet<NodeId>) -> Option<NodeId> {
        let mut visited = HashSet::from([id.clone()]);
        let mut current = id.clone();

        while let Some(parent) = self.container(&current) {
            if !visited.insert(parent.clone()) {
                return None;
            }
            if in_file.contains(&parent) {
                return Some(parent);
            }
            current = parent;
        }
        None
    }
}

/// Build trees bottom-up with an explicit stack.
///
/// Each child list is sorted by source position. A node reachable twice is
/// placed under whichever parent finishes first.
fn assemble(
    roots: Vec<DeclarationNode>,
    mut children: HashMap<NodeId, Vec<DeclarationNode>>,
) -> Vec<TreeNode> {
    for list in children.values_mut() {
        list.sort_by(source_order);
    }

    let root_ids: Vec<NodeId> = roots.iter().map(|n| n.id.clone()).collect();
    let mut nodes: HashMap<NodeId, DeclarationNode> =
        roots.into_iter().map(|n| (n.id.clone(), n)).collect();
    for list in children.values() {
        for child in list {
            nodes.entry(child.id.clone()).or_insert_with(|| child.clone());
        }
    }

    let mut built: HashMap<NodeId, TreeNode> = HashMap::new();
    let mut expanded: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<(NodeId, bool)> = root_ids.iter().rev().map(|id| (id.clone(), false)).collect();

    while let Some((id, finished)) = stack.pop() {
        if finished {
            let kids = children
                .get(&id)
                .map(|list| list.iter().filter_map(|c| built.remove(&c.id)).collect())
                .unwrap_or_default();
            if let Some(node) = nodes.remove(&id) {
                built.insert(id, TreeNode { node, children: kids });
            }
            continue;
        }

        if !expanded.insert(id.clone()) {
            continue;
        }
        stack.push((id.clone(), true));
        if let Some(list) = children.get(&id) {
            for child in list.iter().rev() {
                if !expanded.contains(&child.id) {
                    stack.push((child.id.clone(), false));
                }
            }
        }
    }

    root_ids.iter().filter_map(|id| built.remove(id)).collect()
}
