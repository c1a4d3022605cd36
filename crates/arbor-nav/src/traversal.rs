//! Multi-hop walks: call graphs, inheritance chains, dependency closures

use crate::navigator::Navigator;
use crate::types::*;
use arbor_core::{EdgeKind, NodeId, RelationshipEdge};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Towards {
    /// Follow edges source → target.
    Targets,
    /// Follow edges target → source.
    Sources,
}

impl Navigator {
    /// Methods called by `id`, breadth first.
    pub fn callees(&self, id: &NodeId, depth: u32, limit: usize) -> Option<CallGraph> {
        self.call_graph(id, depth, limit, Towards::Targets)
    }

    /// Methods calling `id`, breadth first.
    pub fn callers(&self, id: &NodeId, depth: u32, limit: usize) -> Option<CallGraph> {
        self.call_graph(id, depth, limit, Towards::Sources)
    }

    fn call_graph(
        &self,
        id: &NodeId,
        depth: u32,
        limit: usize,
        towards: Towards,
    ) -> Option<CallGraph> {
        let root = self.store.node(id)?;
        let max_depth = depth.clamp(1, MAX_CALL_DEPTH);

        let mut graph = CallGraph {
            root,
            entries: Vec::new(),
            max_depth,
            depth_limited: false,
            truncated: false,
        };
        let mut visited = HashSet::from([id.clone()]);
        let mut queue = VecDeque::from([(id.clone(), 0u32)]);

        'walk: while let Some((current, level)) = queue.pop_front() {
            let next = self.neighbors(&current, &[EdgeKind::Calls], towards);

            if level == max_depth {
                if next.iter().any(|(n, _)| !visited.contains(n)) {
                    graph.depth_limited = true;
                }
                continue;
            }

            for (neighbor, _) in next {
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                // Unresolved call targets are not reported.
                let Some(node) = self.store.node(&neighbor) else {
                    continue;
                };
                if graph.entries.len() >= limit {
                    graph.truncated = true;
                    break 'walk;
                }
                graph.entries.push(CallEntry {
                    node,
                    depth: level + 1,
                });
                queue.push_back((neighbor, level + 1));
            }
        }

        debug!(
            root = %id,
            found = graph.entries.len(),
            depth_limited = graph.depth_limited,
            "call graph walk"
        );
        Some(graph)
    }

    /// Base types (`Ancestors`) or derived types (`Descendants`) of `id`,
    /// following `Inherits` and `Implements` up to `depth` levels.
    ///
    /// Entries are in depth-first preorder; each node appears once.
    pub fn inheritance(
        &self,
        id: &NodeId,
        direction: HierarchyDirection,
        depth: u32,
    ) -> Option<Inheritance> {
        let root = self.store.node(id)?;
        let towards = match direction {
            HierarchyDirection::Ancestors => Towards::Targets,
            HierarchyDirection::Descendants => Towards::Sources,
        };
        let kinds = [EdgeKind::Inherits, EdgeKind::Implements];

        let mut entries = Vec::new();
        let mut visited = HashSet::from([id.clone()]);
        let mut stack: Vec<(NodeId, EdgeKind, u32)> = Vec::new();

        if depth > 0 {
            push_unvisited(&mut stack, &mut visited, self.neighbors(id, &kinds, towards), 1);
        }

        while let Some((current, relationship, level)) = stack.pop() {
            let Some(node) = self.store.node(&current) else {
                continue;
            };
            entries.push(InheritanceEntry {
                node,
                relationship,
                depth: level,
            });
            if level < depth {
                let next = self.neighbors(&current, &kinds, towards);
                push_unvisited(&mut stack, &mut visited, next, level + 1);
            }
        }

        Some(Inheritance {
            root,
            direction,
            entries,
        })
    }

    /// What `id` depends on through `DependsOn` edges.
    pub fn dependencies(&self, id: &NodeId, transitive: bool, limit: usize) -> Option<Dependencies> {
        self.dependency_walk(id, transitive, limit, Towards::Targets)
    }

    /// What depends on `id` through `DependsOn` edges.
    pub fn dependents(&self, id: &NodeId, transitive: bool, limit: usize) -> Option<Dependencies> {
        self.dependency_walk(id, transitive, limit, Towards::Sources)
    }

    fn dependency_walk(
        &self,
        id: &NodeId,
        transitive: bool,
        limit: usize,
        towards: Towards,
    ) -> Option<Dependencies> {
        let root = self.store.node(id)?;
        let kinds = [EdgeKind::DependsOn];

        let mut result = Dependencies {
            root,
            transitive,
            entries: Vec::new(),
            truncated: false,
        };
        let mut visited = HashSet::from([id.clone()]);
        let mut queue: VecDeque<(NodeId, u32, Option<NodeId>)> = VecDeque::new();
        for (next, _) in self.neighbors(id, &kinds, towards) {
            if visited.insert(next.clone()) {
                queue.push_back((next, 1, None));
            }
        }

        while let Some((current, level, via)) = queue.pop_front() {
            let Some(node) = self.store.node(&current) else {
                continue;
            };
            if result.entries.len() >= limit {
                result.truncated = true;
                break;
            }
            result.entries.push(DependencyEntry {
                node,
                depth: level,
                via,
            });

            if transitive {
                for (next, _) in self.neighbors(&current, &kinds, towards) {
                    if visited.insert(next.clone()) {
                        queue.push_back((next, level + 1, Some(current.clone())));
                    }
                }
            }
        }

        Some(result)
    }

    /// Far ends of the node's edges of the given kinds, ordered by edge kind
    /// and then by node id.
    fn neighbors(&self, id: &NodeId, kinds: &[EdgeKind], towards: Towards) -> Vec<(NodeId, EdgeKind)> {
        let edges: Vec<RelationshipEdge> = match towards {
            Towards::Targets => self.store.outgoing_edges(id),
            Towards::Sources => self.store.incoming_edges(id),
        };

        let mut next: Vec<(NodeId, EdgeKind)> = edges
            .into_iter()
            .filter(|e| kinds.contains(&e.kind))
            .map(|e| match towards {
                Towards::Targets => (e.target_id, e.kind),
                Towards::Sources => (e.source_id, e.kind),
            })
            .collect();
        next.sort_by(|a, b| (a.1.as_str(), &a.0).cmp(&(b.1.as_str(), &b.0)));
        next.dedup_by(|a, b| a.0 == b.0);
        next
    }
}

/// Push in reverse so the first neighbor is popped first.
fn push_unvisited(
    stack: &mut Vec<(NodeId, EdgeKind, u32)>,
    visited: &mut HashSet<NodeId>,
    next: Vec<(NodeId, EdgeKind)>,
    level: u32,
) {
    let fresh: Vec<_> = next
        .into_iter()
        .filter(|(id, _)| visited.insert(id.clone()))
        .collect();
    for (id, kind) in fresh.into_iter().rev() {
        stack.push((id, kind, level));
    }
}
