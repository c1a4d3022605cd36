//! Query parameters and result shapes of the navigation engine

use arbor_core::{ArborError, DeclarationNode, EdgeKind, NodeId, NodeKind, RelationshipEdge};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

/// Hard cap on call-graph traversal depth.
pub const MAX_CALL_DEPTH: u32 = 5;

/// Result cap used when a caller does not pick one.
pub const DEFAULT_LIMIT: usize = 100;

/// How search text is compared against names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MatchMode {
    #[default]
    Contains,
    StartsWith,
    EndsWith,
    Exact,
}

impl FromStr for MatchMode {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contains" => Ok(MatchMode::Contains),
            "startswith" | "starts_with" | "prefix" => Ok(MatchMode::StartsWith),
            "endswith" | "ends_with" | "suffix" => Ok(MatchMode::EndsWith),
            "exact" => Ok(MatchMode::Exact),
            _ => Err(ArborError::invalid_parameter(
                "match mode",
                s,
                "contains, startswith, endswith or exact",
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub kind: Option<NodeKind>,
    pub mode: MatchMode,
    pub case_sensitive: bool,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        SearchQuery {
            text: text.into(),
            kind: None,
            mode: MatchMode::default(),
            case_sensitive: false,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether `candidate` satisfies the text match.
    pub fn matches(&self, candidate: &str) -> bool {
        if self.case_sensitive {
            compare(self.mode, candidate, &self.text)
        } else {
            compare(
                self.mode,
                &candidate.to_lowercase(),
                &self.text.to_lowercase(),
            )
        }
    }
}

fn compare(mode: MatchMode, candidate: &str, needle: &str) -> bool {
    match mode {
        MatchMode::Contains => candidate.contains(needle),
        MatchMode::StartsWith => candidate.starts_with(needle),
        MatchMode::EndsWith => candidate.ends_with(needle),
        MatchMode::Exact => candidate == needle,
    }
}

/// A capped list with the size of the uncapped result.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub truncated: bool,
}

impl<T> Page<T> {
    pub fn new(mut all: Vec<T>, limit: usize) -> Self {
        let total_count = all.len();
        let truncated = total_count > limit;
        all.truncate(limit);
        Page {
            items: all,
            total_count,
            truncated,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Which side of a node's edges to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

impl FromStr for EdgeDirection {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outgoing" | "out" => Ok(EdgeDirection::Outgoing),
            "incoming" | "in" => Ok(EdgeDirection::Incoming),
            "both" => Ok(EdgeDirection::Both),
            _ => Err(ArborError::invalid_parameter(
                "direction",
                s,
                "outgoing, incoming or both",
            )),
        }
    }
}

/// An edge plus the node on its far end, when that node is in the graph.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RelatedEdge {
    pub edge: RelationshipEdge,
    pub node: Option<DeclarationNode>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Relationships {
    pub node: DeclarationNode,
    pub outgoing: Page<RelatedEdge>,
    pub incoming: Page<RelatedEdge>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CallEntry {
    pub node: DeclarationNode,
    /// Hops from the queried node.
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CallGraph {
    pub root: DeclarationNode,
    pub entries: Vec<CallEntry>,
    /// Effective depth limit, after the hard cap.
    pub max_depth: u32,
    /// Unvisited calls remained beyond `max_depth`.
    pub depth_limited: bool,
    /// The result cap stopped the walk.
    pub truncated: bool,
}

/// Direction of an inheritance walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HierarchyDirection {
    /// Base types and implemented interfaces.
    Ancestors,
    /// Derived types and implementors.
    Descendants,
}

impl FromStr for HierarchyDirection {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ancestors" | "up" | "base" => Ok(HierarchyDirection::Ancestors),
            "descendants" | "down" | "derived" => Ok(HierarchyDirection::Descendants),
            _ => Err(ArborError::invalid_parameter(
                "direction",
                s,
                "ancestors or descendants",
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InheritanceEntry {
    pub node: DeclarationNode,
    /// `Inherits` or `Implements`.
    pub relationship: EdgeKind,
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Inheritance {
    pub root: DeclarationNode,
    pub direction: HierarchyDirection,
    pub entries: Vec<InheritanceEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DependencyEntry {
    pub node: DeclarationNode,
    pub depth: u32,
    /// Immediate predecessor on the path from the queried node; `None` for
    /// direct entries.
    pub via: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Dependencies {
    pub root: DeclarationNode,
    pub transitive: bool,
    pub entries: Vec<DependencyEntry>,
    pub truncated: bool,
}

/// A node with its containment children, ordered by source position.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TreeNode {
    pub node: DeclarationNode,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Number of nodes in this subtree, itself included.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            count += 1;
            stack.extend(tree.children.iter());
        }
        count
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileDeclarations {
    pub file_path: PathBuf,
    pub roots: Vec<TreeNode>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContainmentTree {
    pub roots: Vec<TreeNode>,
    pub total_nodes: usize,
    pub max_depth: u32,
    pub depth_reached: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_truncation() {
        let page = Page::new(vec![1, 2, 3], 2);
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.total_count, 3);
        assert!(page.truncated);

        let page = Page::new(vec![1], 5);
        assert!(!page.truncated);
    }

    #[test]
    fn test_match_modes() {
        let query = SearchQuery::new("cart");
        assert!(query.matches("ShoppingCart"));
        assert!(!query.clone().case_sensitive(true).matches("ShoppingCart"));
        assert!(query.clone().mode(MatchMode::EndsWith).matches("ShoppingCart"));
        assert!(!query.clone().mode(MatchMode::StartsWith).matches("ShoppingCart"));
        assert!(query.clone().mode(MatchMode::Exact).matches("CART"));
    }

    #[test]
    fn test_parse_parameters() {
        assert_eq!("StartsWith".parse::<MatchMode>().unwrap(), MatchMode::StartsWith);
        assert_eq!("in".parse::<EdgeDirection>().unwrap(), EdgeDirection::Incoming);
        assert_eq!(
            "Descendants".parse::<HierarchyDirection>().unwrap(),
            HierarchyDirection::Descendants
        );
        assert!(matches!(
            "fuzzy".parse::<MatchMode>(),
            Err(ArborError::InvalidParameter { .. })
        ));
    }
}
