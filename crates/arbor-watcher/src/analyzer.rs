//! File analyzer collaborator interface

use arbor_core::{DeclarationNode, NodeId, RelationshipEdge};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Everything the analyzer needs to process one file.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Path relative to the project root; produced nodes carry this path.
    pub path: PathBuf,
    pub absolute_path: PathBuf,
    /// Symbol keys resolved so far, for cross-file references.
    pub existing_symbols: HashMap<String, NodeId>,
    /// Ids already in the graph, so re-analysis can keep them stable.
    pub existing_node_ids: HashSet<NodeId>,
    pub include_locals: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisOutput {
    pub nodes: Vec<DeclarationNode>,
    pub edges: Vec<RelationshipEdge>,
    /// New symbol key → node id mappings contributed by this file.
    pub symbol_mappings: HashMap<String, NodeId>,
}

/// Extracts declarations and relationships from a single source file.
///
/// Implementations must be deterministic: the same file content and
/// symbol table yield the same nodes, edges and ids.
#[async_trait]
pub trait FileAnalyzer: Send + Sync {
    async fn analyze_file(&self, request: AnalysisRequest) -> anyhow::Result<AnalysisOutput>;

    /// Get provider name
    fn name(&self) -> &str {
        "analyzer"
    }
}
