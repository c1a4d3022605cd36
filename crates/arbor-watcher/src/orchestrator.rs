//! Incremental graph maintenance: applies change batches with cascade

use crate::analyzer::{AnalysisRequest, FileAnalyzer};
use anyhow::Context;
use arbor_core::{
    ArborConfig, ArborError, ChangeSet, DependencyTracker, EdgeId, EdgeKind, FileChange,
    GraphStats, GraphStore, NodeId, ProjectRoot, RelationshipEdge, Repository, SymbolTable,
    UpdateEvent, UpdateSummary,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrchestratorState {
    Stopped,
    Watching,
    Updating,
}

/// Sole writer of the graph store, dependency tracker and symbol table.
///
/// Batches run one at a time under the update lock; the watcher and manual
/// updates compete for it.
pub struct UpdateOrchestrator {
    root: ProjectRoot,
    config: ArborConfig,
    store: Arc<GraphStore>,
    tracker: Arc<DependencyTracker>,
    symbols: Arc<SymbolTable>,
    analyzer: Arc<dyn FileAnalyzer>,
    repository: Arc<dyn Repository>,
    events: broadcast::Sender<UpdateEvent>,
    state: watch::Sender<OrchestratorState>,
    update_lock: Mutex<()>,
    watching: AtomicBool,
    cancel: AtomicBool,
    sequence: AtomicU64,
}

impl std::fmt::Debug for UpdateOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOrchestrator")
            .field("root", &self.root.path())
            .field("analyzer", &self.analyzer.name())
            .field("repository", &self.repository.name())
            .field("state", &self.state())
            .finish()
    }
}

impl UpdateOrchestrator {
    pub fn new(
        root: ProjectRoot,
        config: ArborConfig,
        analyzer: Arc<dyn FileAnalyzer>,
        repository: Arc<dyn Repository>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(OrchestratorState::Stopped);
        UpdateOrchestrator {
            root,
            config,
            store: Arc::new(GraphStore::new()),
            tracker: Arc::new(DependencyTracker::new()),
            symbols: Arc::new(SymbolTable::new()),
            analyzer,
            repository,
            events,
            state,
            update_lock: Mutex::new(()),
            watching: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &ProjectRoot {
        &self.root
    }

    pub fn config(&self) -> &ArborConfig {
        &self.config
    }

    /// The graph store, for readers such as the navigation engine.
    pub fn store(&self) -> Arc<GraphStore> {
        self.store.clone()
    }

    pub fn tracker(&self) -> Arc<DependencyTracker> {
        self.tracker.clone()
    }

    pub fn symbols(&self) -> Arc<SymbolTable> {
        self.symbols.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<OrchestratorState> {
        self.state.subscribe()
    }

    /// Mark whether a watcher is feeding this orchestrator.
    pub fn set_watching(&self, watching: bool) {
        self.watching.store(watching, Ordering::SeqCst);
        if self.state() != OrchestratorState::Updating {
            self.state.send_replace(self.idle_state());
        }
    }

    /// Ask the running batch to stop before its next file. The file in
    /// flight is finished first, so the store and the repository agree.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    fn idle_state(&self) -> OrchestratorState {
        if self.watching.load(Ordering::SeqCst) {
            OrchestratorState::Watching
        } else {
            OrchestratorState::Stopped
        }
    }

    /// Load the persisted graph into memory and rebuild the derived indices.
    pub async fn hydrate(&self) -> anyhow::Result<GraphStats> {
        let _guard = self.update_lock.lock().await;

        self.repository
            .initialize()
            .await
            .with_context(|| format!("failed to initialize {} repository", self.repository.name()))?;
        let snapshot = self
            .repository
            .load_graph()
            .await
            .context("failed to load persisted graph")?;

        self.store.load_snapshot(snapshot);
        let edges = self.store.all_edges();
        self.tracker.rebuild_from_edges(&edges);

        self.symbols.clear();
        for node in self.store.all_nodes() {
            self.symbols
                .insert(node.fully_qualified_name.clone(), node.id.clone(), &node.file_path);
        }

        let stats = self.store.stats();
        info!(
            "Hydrated {} nodes and {} edges across {} files",
            stats.node_count, stats.edge_count, stats.file_count
        );
        Ok(stats)
    }

    /// Re-analyze `paths` as modified, cascading when configured to.
    pub async fn update_files(&self, paths: &[PathBuf]) -> UpdateSummary {
        let changes = paths.iter().map(FileChange::modified).collect();
        self.process_changes(changes, self.config.cascade).await
    }

    /// Index `paths` as new files, without cascade.
    pub async fn index_files(&self, paths: &[PathBuf]) -> UpdateSummary {
        let changes = paths.iter().map(FileChange::created).collect();
        self.process_changes(changes, false).await
    }

    /// Apply one batch of file changes.
    ///
    /// Per-file failures are published as [`UpdateEvent::Error`] and do not
    /// stop the batch. A [`UpdateEvent::Completed`] is published when at
    /// least one file was processed.
    pub async fn process_changes(&self, changes: Vec<FileChange>, cascade: bool) -> UpdateSummary {
        let _guard = self.update_lock.lock().await;
        self.cancel.store(false, Ordering::SeqCst);
        self.state.send_replace(OrchestratorState::Updating);
        let _idle = IdleOnDrop(self);

        let started = Instant::now();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let mut summary = UpdateSummary::new(sequence);
        info!("Update #{} started with {} changes", sequence, changes.len());

        let changes: ChangeSet = changes.into_iter().map(|c| self.normalize(c)).collect();
        let mut queue: VecDeque<(FileChange, bool)> = changes
            .into_changes()
            .into_iter()
            .map(|change| (change, false))
            .collect();
        let mut queued: HashSet<PathBuf> = queue.iter().map(|(c, _)| c.path.clone()).collect();
        let mut processed: HashSet<PathBuf> = HashSet::new();

        while let Some((change, cascaded)) = queue.pop_front() {
            if self.cancel.load(Ordering::SeqCst) {
                summary.cancelled = true;
                break;
            }
            if !processed.insert(change.path.clone()) {
                continue;
            }

            match self.process_file(&change, &mut summary).await {
                Ok(seed) => {
                    summary.updated_files.push(change.path.clone());
                    if cascaded {
                        summary.cascaded_files.push(change.path.clone());
                    }
                    if !cascade {
                        continue;
                    }

                    let mut dependents: Vec<PathBuf> = self
                        .tracker
                        .dependent_files_for_nodes(seed.iter())
                        .into_iter()
                        .filter(|f| !processed.contains(f) && !queued.contains(f))
                        .collect();
                    dependents.sort();
                    for file in dependents {
                        debug!("Cascading {} from {}", file.display(), change.path.display());
                        queued.insert(file.clone());
                        queue.push_back((FileChange::modified(file), true));
                    }
                }
                Err(error) => {
                    warn!("Failed to update {}: {:?}", change.path.display(), error);
                    summary.failed_files.push(change.path.clone());
                    let _ = self.events.send(UpdateEvent::Error {
                        file_path: change.path.clone(),
                        error: Arc::new(error),
                    });
                }
            }
        }

        if !summary.updated_files.is_empty() {
            if let Err(e) = self.repository.flush().await {
                error!("Failed to persist graph after update #{}: {:#}", sequence, e);
                for path in std::mem::take(&mut summary.updated_files) {
                    let error = ArborError::persistence(&path, anyhow::anyhow!("{e:#}"));
                    let _ = self.events.send(UpdateEvent::Error {
                        file_path: path.clone(),
                        error: Arc::new(error),
                    });
                    summary.failed_files.push(path);
                }
            }
        }

        summary.duration = started.elapsed();
        info!(
            "Update #{} finished: {} updated ({} cascaded), {} failed, +{}/-{} nodes, +{}/-{} edges in {:?}{}",
            sequence,
            summary.updated_files.len(),
            summary.cascaded_files.len(),
            summary.failed_files.len(),
            summary.nodes_added,
            summary.nodes_removed,
            summary.edges_added,
            summary.edges_removed,
            summary.duration,
            if summary.cancelled { " (cancelled)" } else { "" }
        );

        if !summary.is_empty() {
            let _ = self.events.send(UpdateEvent::Completed(summary.clone()));
        }
        summary
    }

    fn normalize(&self, change: FileChange) -> FileChange {
        let path = self.root.relative(&change.path);
        match change.old_path() {
            Some(from) => FileChange::renamed(self.root.relative(from), path),
            None => FileChange::new(path, change.kind),
        }
    }

    /// Remove stale data for one change and, unless it is a deletion,
    /// re-analyze the file. Returns the cascade seed: every removed id plus
    /// every newly produced id.
    async fn process_file(
        &self,
        change: &FileChange,
        summary: &mut UpdateSummary,
    ) -> Result<Vec<NodeId>, ArborError> {
        let path = &change.path;
        let mut seed = Vec::new();
        let mut orphaned = Vec::new();

        if let Some(from) = change.old_path() {
            let removal = self.remove_file(from, summary).await?;
            seed.extend(removal.nodes);
            orphaned.extend(removal.orphaned);
        }
        let removal = self.remove_file(path, summary).await?;
        seed.extend(removal.nodes);
        orphaned.extend(removal.orphaned);

        if change.is_deletion() {
            return Ok(seed);
        }

        let request = AnalysisRequest {
            path: path.clone(),
            absolute_path: self.root.absolute(path),
            existing_symbols: self.symbols.to_map(),
            existing_node_ids: self.store.all_nodes().into_iter().map(|n| n.id).collect(),
            include_locals: self.config.include_locals,
        };
        let mut output = self
            .analyzer
            .analyze_file(request)
            .await
            .map_err(|e| ArborError::analysis(path, e))?;

        for edge in &mut output.edges {
            if edge.file_path.is_none() {
                edge.file_path = Some(path.clone());
            }
        }

        let new_ids: Vec<NodeId> = output.nodes.iter().map(|n| n.id.clone()).collect();
        summary.nodes_added += output.nodes.len();
        summary.edges_added += output.edges.len();

        self.store.add_nodes(output.nodes.iter().cloned());
        self.store.add_edges(output.edges.iter().cloned());
        self.symbols.merge(output.symbol_mappings, path);
        for edge in output.edges.iter().filter(|e| e.kind != EdgeKind::Contains) {
            self.tracker.record_reference(path, &edge.target_id);
        }
        debug!(
            "Analyzed {}: {} nodes, {} edges",
            path.display(),
            output.nodes.len(),
            output.edges.len()
        );

        // Edges from other files come back when both ends exist again.
        let restored: Vec<RelationshipEdge> = orphaned
            .into_iter()
            .filter(|e| self.store.contains_node(&e.source_id) && self.store.contains_node(&e.target_id))
            .collect();
        if !restored.is_empty() {
            debug!("Restored {} edges into {}", restored.len(), path.display());
            summary.edges_removed = summary.edges_removed.saturating_sub(restored.len());
            self.store.add_edges(restored.iter().cloned());
        }

        self.repository
            .save_nodes(&output.nodes)
            .await
            .map_err(|e| ArborError::persistence(path, e))?;
        output.edges.extend(restored);
        self.repository
            .save_edges(&output.edges)
            .await
            .map_err(|e| ArborError::persistence(path, e))?;

        seed.extend(new_ids);
        Ok(seed)
    }

    /// Drop everything the graph holds for `path`, including edges from other
    /// files that point at its nodes.
    async fn remove_file(
        &self,
        path: &Path,
        summary: &mut UpdateSummary,
    ) -> Result<Removal, ArborError> {
        let nodes = self.store.remove_nodes_by_file(path);
        let mut edges_removed = self.store.remove_edges_by_source_file(path);

        let mut orphaned: HashMap<EdgeId, RelationshipEdge> = HashMap::new();
        for id in &nodes {
            for edge in self
                .store
                .incoming_edges(id)
                .into_iter()
                .chain(self.store.outgoing_edges(id))
            {
                orphaned.insert(edge.id.clone(), edge);
            }
            edges_removed += self.store.remove_edges_by_node_id(id);
        }
        self.tracker.remove_references_from_file(path);
        self.symbols.remove_file(path);

        summary.nodes_removed += nodes.len();
        summary.edges_removed += edges_removed;
        if !nodes.is_empty() || edges_removed > 0 {
            debug!(
                "Removed {} nodes and {} edges for {}",
                nodes.len(),
                edges_removed,
                path.display()
            );
        }

        self.repository
            .delete_nodes_by_file(path)
            .await
            .map_err(|e| ArborError::persistence(path, e))?;
        self.repository
            .delete_edges_by_source_file(path)
            .await
            .map_err(|e| ArborError::persistence(path, e))?;

        Ok(Removal {
            nodes,
            orphaned: orphaned.into_values().collect(),
        })
    }
}

/// Restores the idle state when a batch ends, including when its future is
/// dropped mid-file.
struct IdleOnDrop<'a>(&'a UpdateOrchestrator);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.state.send_replace(self.0.idle_state());
    }
}

/// What removing one file took out of the graph.
struct Removal {
    nodes: Vec<NodeId>,
    /// Edges declared in other files that touched the removed nodes.
    orphaned: Vec<RelationshipEdge>,
}
