//! Structural navigation over the declaration graph

pub mod navigator;
pub mod traversal;
pub mod tree;
pub mod types;

#[cfg(test)]
pub mod test_utils;


pub use navigator::Navigator;
pub use types::{
    CallEntry, CallGraph, ContainmentTree, DEFAULT_LIMIT, Dependencies, DependencyEntry,
    EdgeDirection, FileDeclarations, HierarchyDirection, Inheritance, InheritanceEntry,
    MAX_CALL_DEPTH, MatchMode, Page, RelatedEdge, Relationships, SearchQuery, TreeNode,
};
