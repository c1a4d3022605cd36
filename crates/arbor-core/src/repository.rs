//! Durable graph storage behind the update pipeline

use crate::model::*;
use crate::store::GraphStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Graph snapshot file inside the cache directory.
pub const GRAPH_SNAPSHOT: &str = "graph.json";

/// Storage collaborator of the update pipeline.
///
/// Failures surface as per-file errors in the orchestrator; they never abort
/// a whole batch.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Prepare the backing storage (create directories, open files).
    async fn initialize(&self) -> Result<()>;

    /// Everything currently persisted.
    async fn load_graph(&self) -> Result<GraphSnapshot>;

    async fn node(&self, id: &NodeId) -> Result<Option<DeclarationNode>>;

    async fn nodes_by_kind(&self, kind: NodeKind) -> Result<Vec<DeclarationNode>>;

    async fn nodes_by_file(&self, path: &Path) -> Result<Vec<DeclarationNode>>;

    async fn outgoing_edges(&self, id: &NodeId) -> Result<Vec<RelationshipEdge>>;

    async fn incoming_edges(&self, id: &NodeId) -> Result<Vec<RelationshipEdge>>;

    async fn save_nodes(&self, nodes: &[DeclarationNode]) -> Result<()>;

    async fn save_edges(&self, edges: &[RelationshipEdge]) -> Result<()>;

    /// Delete the nodes declared in `path` along with every edge touching them.
    async fn delete_nodes_by_file(&self, path: &Path) -> Result<usize>;

    async fn delete_edges_by_source_file(&self, path: &Path) -> Result<usize>;

    /// Make buffered writes durable. Called once per update batch.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Get repository name
    fn name(&self) -> &str;
}

/// Repository kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    store: GraphStore,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: GraphSnapshot) -> Self {
        MemoryRepository {
            store: GraphStore::from_snapshot(snapshot),
        }
    }

    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.store.edge_count()
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn load_graph(&self) -> Result<GraphSnapshot> {
        Ok(self.store.snapshot())
    }

    async fn node(&self, id: &NodeId) -> Result<Option<DeclarationNode>> {
        Ok(self.store.node(id))
    }

    async fn nodes_by_kind(&self, kind: NodeKind) -> Result<Vec<DeclarationNode>> {
        Ok(self.store.nodes_by_kind(kind))
    }

    async fn nodes_by_file(&self, path: &Path) -> Result<Vec<DeclarationNode>> {
        Ok(self.store.nodes_by_file(path))
    }

    async fn outgoing_edges(&self, id: &NodeId) -> Result<Vec<RelationshipEdge>> {
        Ok(self.store.outgoing_edges(id))
    }

    async fn incoming_edges(&self, id: &NodeId) -> Result<Vec<RelationshipEdge>> {
        Ok(self.store.incoming_edges(id))
    }

    async fn save_nodes(&self, nodes: &[DeclarationNode]) -> Result<()> {
        self.store.add_nodes(nodes.iter().cloned());
        Ok(())
    }

    async fn save_edges(&self, edges: &[RelationshipEdge]) -> Result<()> {
        self.store.add_edges(edges.iter().cloned());
        Ok(())
    }

    async fn delete_nodes_by_file(&self, path: &Path) -> Result<usize> {
        let removed = self.store.remove_nodes_by_file(path);
        for id in &removed {
            self.store.remove_edges_by_node_id(id);
        }
        Ok(removed.len())
    }

    async fn delete_edges_by_source_file(&self, path: &Path) -> Result<usize> {
        Ok(self.store.remove_edges_by_source_file(path))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// On-disk layout of the snapshot file.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: String,
    saved_at: String,
    node_count: usize,
    edge_count: usize,
    #[serde(flatten)]
    graph: GraphSnapshot,
}

/// Memory repository persisted as a JSON snapshot under the cache directory.
///
/// Writes are buffered in memory and written out by [`Repository::flush`].
#[derive(Debug)]
pub struct JsonRepository {
    inner: MemoryRepository,
    path: PathBuf,
    dirty: AtomicBool,
}

impl JsonRepository {
    pub fn new(root: &Path, cache_dir: &str) -> Self {
        JsonRepository {
            inner: MemoryRepository::new(),
            path: snapshot_path(root, cache_dir),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    async fn write_snapshot(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let graph = self.inner.store.snapshot();
        let file = SnapshotFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            node_count: graph.nodes.len(),
            edge_count: graph.edges.len(),
            graph,
        };
        let json = serde_json::to_string_pretty(&file)?;

        // Readers only ever see a complete file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Graph snapshot saved: {}", self.path.display());
        Ok(())
    }
}

#[async_trait::async_trait]
impl Repository for JsonRepository {
    async fn initialize(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating cache directory {}", dir.display()))?;
        }
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }

        let text = tokio::fs::read_to_string(&self.path).await?;
        let file: SnapshotFile = serde_json::from_str(&text)
            .with_context(|| format!("parsing snapshot {}", self.path.display()))?;
        tracing::debug!(
            "Graph snapshot v{} ({} nodes, {} edges, saved {}) loaded from {}",
            file.version,
            file.node_count,
            file.edge_count,
            file.saved_at,
            self.path.display()
        );
        self.inner.store.load_snapshot(file.graph);
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }

    async fn load_graph(&self) -> Result<GraphSnapshot> {
        self.inner.load_graph().await
    }

    async fn node(&self, id: &NodeId) -> Result<Option<DeclarationNode>> {
        self.inner.node(id).await
    }

    async fn nodes_by_kind(&self, kind: NodeKind) -> Result<Vec<DeclarationNode>> {
        self.inner.nodes_by_kind(kind).await
    }

    async fn nodes_by_file(&self, path: &Path) -> Result<Vec<DeclarationNode>> {
        self.inner.nodes_by_file(path).await
    }

    async fn outgoing_edges(&self, id: &NodeId) -> Result<Vec<RelationshipEdge>> {
        self.inner.outgoing_edges(id).await
    }

    async fn incoming_edges(&self, id: &NodeId) -> Result<Vec<RelationshipEdge>> {
        self.inner.incoming_edges(id).await
    }

    async fn save_nodes(&self, nodes: &[DeclarationNode]) -> Result<()> {
        self.inner.save_nodes(nodes).await?;
        self.mark_dirty();
        Ok(())
    }

    async fn save_edges(&self, edges: &[RelationshipEdge]) -> Result<()> {
        self.inner.save_edges(edges).await?;
        self.mark_dirty();
        Ok(())
    }

    async fn delete_nodes_by_file(&self, path: &Path) -> Result<usize> {
        let removed = self.inner.delete_nodes_by_file(path).await?;
        if removed > 0 {
            self.mark_dirty();
        }
        Ok(removed)
    }

    async fn delete_edges_by_source_file(&self, path: &Path) -> Result<usize> {
        let removed = self.inner.delete_edges_by_source_file(path).await?;
        if removed > 0 {
            self.mark_dirty();
        }
        Ok(removed)
    }

    async fn flush(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let written = self.write_snapshot().await;
        if written.is_err() {
            self.mark_dirty();
        }
        written
    }

    fn name(&self) -> &str {
        "json"
    }
}

/// Get cache directory path
pub fn cache_dir(root: &Path, cache_dir: &str) -> PathBuf {
    root.join(cache_dir)
}

/// Get graph snapshot file path
pub fn snapshot_path(root: &Path, cache_dir_name: &str) -> PathBuf {
    cache_dir(root, cache_dir_name).join(GRAPH_SNAPSHOT)
}

/// Clear cache directory
pub fn clear_cache(root: &Path, cache_dir_name: &str) -> std::io::Result<()> {
    let cache = cache_dir(root, cache_dir_name);
    if cache.exists() {
        std::fs::remove_dir_all(&cache)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> (Vec<DeclarationNode>, Vec<RelationshipEdge>) {
        let nodes = vec![
            DeclarationNode::new("A", NodeKind::Class, "A", "a.cs"),
            DeclarationNode::new("A.M", NodeKind::Method, "M", "a.cs"),
            DeclarationNode::new("B", NodeKind::Class, "B", "b.cs"),
        ];
        let edges = vec![
            RelationshipEdge::new("A", "A.M", EdgeKind::Contains).observed_at("a.cs", 2),
            RelationshipEdge::new("B", "A.M", EdgeKind::Calls).observed_at("b.cs", 5),
        ];
        (nodes, edges)
    }

    #[tokio::test]
    async fn test_memory_delete_by_file_drops_touching_edges() {
        let repo = MemoryRepository::new();
        let (nodes, edges) = sample();
        repo.save_nodes(&nodes).await.unwrap();
        repo.save_edges(&edges).await.unwrap();

        assert_eq!(repo.delete_nodes_by_file(Path::new("a.cs")).await.unwrap(), 2);
        assert_eq!(repo.node_count(), 1);
        assert_eq!(repo.edge_count(), 0);
        assert!(repo.node(&NodeId::new("A")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_repository_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let (nodes, edges) = sample();

        let repo = JsonRepository::new(temp_dir.path(), ".arbor");
        repo.initialize().await.unwrap();
        repo.save_nodes(&nodes).await.unwrap();
        repo.save_edges(&edges).await.unwrap();
        repo.flush().await.unwrap();
        assert!(repo.path().exists());

        let reopened = JsonRepository::new(temp_dir.path(), ".arbor");
        reopened.initialize().await.unwrap();
        let graph = reopened.load_graph().await.unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(
            reopened.nodes_by_kind(NodeKind::Class).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_failed_flush_is_retried() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join(".arbor");
        std::fs::write(&blocker, "").unwrap();

        let repo = JsonRepository::new(temp_dir.path(), ".arbor");
        repo.save_nodes(&sample().0).await.unwrap();
        assert!(repo.flush().await.is_err());

        std::fs::remove_file(&blocker).unwrap();
        repo.flush().await.unwrap();
        assert!(repo.path().exists());
    }

    #[tokio::test]
    async fn test_clear_cache_removes_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let repo = JsonRepository::new(temp_dir.path(), ".arbor");
        repo.initialize().await.unwrap();
        repo.save_nodes(&sample().0).await.unwrap();
        repo.flush().await.unwrap();

        clear_cache(temp_dir.path(), ".arbor").unwrap();
        assert!(!cache_dir(temp_dir.path(), ".arbor").exists());
    }
}
