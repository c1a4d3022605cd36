//! CLI command implementations

use anyhow::{Context, bail};
use arbor_core::{
    ArborConfig, EdgeKind, GraphStore, JsonRepository, NodeId, NodeKind, ProjectRoot, Repository,
    clear_cache, snapshot_path,
};
use arbor_nav::{EdgeDirection, HierarchyDirection, MatchMode, Navigator, SearchQuery};
use clap::Subcommand;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum QueryCommand {
    /// Find declarations by name
    Search {
        text: String,
        #[arg(short, long)]
        kind: Option<NodeKind>,
        /// contains, startswith, endswith or exact
        #[arg(short, long, default_value = "contains")]
        mode: MatchMode,
        #[arg(long)]
        case_sensitive: bool,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show one declaration
    Node { id: String },
    /// Direct children in source order
    Children {
        id: String,
        #[arg(short, long)]
        kind: Option<NodeKind>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Containment chain from the outermost container down to the parent
    Ancestors { id: String },
    /// Non-containment edges around a declaration
    Relationships {
        id: String,
        #[arg(short, long)]
        kind: Option<EdgeKind>,
        /// outgoing, incoming or both
        #[arg(short, long, default_value = "both")]
        direction: EdgeDirection,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Transitive callers
    Callers {
        id: String,
        #[arg(short, long, default_value_t = 3)]
        depth: u32,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Transitive callees
    Callees {
        id: String,
        #[arg(short, long, default_value_t = 3)]
        depth: u32,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Base types or derived types
    Inheritance {
        id: String,
        /// ancestors or descendants
        #[arg(short, long, default_value = "ancestors")]
        direction: HierarchyDirection,
        #[arg(long, default_value_t = 10)]
        depth: u32,
    },
    /// Every declaration of a kind, optionally inside a scope
    List {
        kind: NodeKind,
        #[arg(short, long)]
        scope: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Declarations this one depends on
    Dependencies {
        id: String,
        #[arg(short, long)]
        transitive: bool,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Declarations depending on this one
    Dependents {
        id: String,
        #[arg(short, long)]
        transitive: bool,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Declarations of one file as a tree
    File { path: PathBuf },
    /// Containment tree from a node, or from every top-level node
    Tree {
        #[arg(long)]
        from: Option<String>,
        #[arg(short, long, default_value_t = 3)]
        depth: u32,
        #[arg(short, long)]
        kind: Option<NodeKind>,
    },
    /// Node and edge counts
    Stats,
}

pub async fn query(root: PathBuf, command: QueryCommand) -> anyhow::Result<()> {
    let root = ProjectRoot::discover(&root)?;
    let config = ArborConfig::load(root.path())?;
    let navigator = load_navigator(&root, &config).await?;
    let limit = |requested: Option<usize>| requested.unwrap_or(config.default_limit);

    match command {
        QueryCommand::Search {
            text,
            kind,
            mode,
            case_sensitive,
            limit: requested,
        } => {
            let mut query = SearchQuery::new(text)
                .mode(mode)
                .case_sensitive(case_sensitive)
                .limit(limit(requested));
            if let Some(kind) = kind {
                query = query.kind(kind);
            }
            print_json(&navigator.search(&query))
        }
        QueryCommand::Node { id } => print_found(&id, navigator.node(&NodeId::new(&id))),
        QueryCommand::Children {
            id,
            kind,
            limit: requested,
        } => print_found(
            &id,
            navigator.children(&NodeId::new(&id), kind, limit(requested)),
        ),
        QueryCommand::Ancestors { id } => {
            print_found(&id, navigator.ancestors(&NodeId::new(&id)))
        }
        QueryCommand::Relationships {
            id,
            kind,
            direction,
            limit: requested,
        } => print_found(
            &id,
            navigator.relationships(&NodeId::new(&id), kind, direction, limit(requested)),
        ),
        QueryCommand::Callers {
            id,
            depth,
            limit: requested,
        } => print_found(
            &id,
            navigator.callers(&NodeId::new(&id), depth, limit(requested)),
        ),
        QueryCommand::Callees {
            id,
            depth,
            limit: requested,
        } => print_found(
            &id,
            navigator.callees(&NodeId::new(&id), depth, limit(requested)),
        ),
        QueryCommand::Inheritance {
            id,
            direction,
            depth,
        } => print_found(
            &id,
            navigator.inheritance(&NodeId::new(&id), direction, depth),
        ),
        QueryCommand::List {
            kind,
            scope,
            limit: requested,
        } => {
            let scope = scope.map(NodeId::new);
            let listed = navigator.list_by_kind(kind, scope.as_ref(), limit(requested));
            match scope {
                Some(scope) => print_found(scope.as_str(), listed),
                None => print_json(&listed),
            }
        }
        QueryCommand::Dependencies {
            id,
            transitive,
            limit: requested,
        } => print_found(
            &id,
            navigator.dependencies(&NodeId::new(&id), transitive, limit(requested)),
        ),
        QueryCommand::Dependents {
            id,
            transitive,
            limit: requested,
        } => print_found(
            &id,
            navigator.dependents(&NodeId::new(&id), transitive, limit(requested)),
        ),
        QueryCommand::File { path } => {
            let relative = root.relative(&path);
            let declarations = navigator.file_declarations(&relative);
            print_found(&relative.display().to_string(), declarations)
        }
        QueryCommand::Tree { from, depth, kind } => {
            let from = from.map(NodeId::new);
            let tree = navigator.tree(from.as_ref(), depth, kind);
            match from {
                Some(from) => print_found(from.as_str(), tree),
                None => print_json(&tree),
            }
        }
        QueryCommand::Stats => print_json(&navigator.stats()),
    }
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    let root = ProjectRoot::discover(&root)?;
    let config = ArborConfig::load(root.path())?;
    tracing::info!("Clearing cache for: {}", root.path().display());

    clear_cache(root.path(), &config.cache_dir)?;

    tracing::info!("Cache cleared");
    Ok(())
}

/// Load the persisted graph into a fresh store.
async fn load_navigator(root: &ProjectRoot, config: &ArborConfig) -> anyhow::Result<Navigator> {
    let path = snapshot_path(root.path(), &config.cache_dir);
    if !path.exists() {
        bail!(
            "no graph snapshot at {}; index the project first",
            path.display()
        );
    }

    let repository = JsonRepository::new(root.path(), &config.cache_dir);
    repository.initialize().await?;
    let snapshot = repository
        .load_graph()
        .await
        .with_context(|| format!("loading graph from {}", path.display()))?;
    if snapshot.is_empty() {
        tracing::warn!("Graph snapshot at {} holds no declarations", path.display());
    }
    let store = GraphStore::from_snapshot(snapshot);
    tracing::debug!(
        "Loaded {} nodes, {} edges from {}",
        store.node_count(),
        store.edge_count(),
        path.display()
    );
    Ok(Navigator::new(Arc::new(store)))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a lookup result; a missing subject prints `null`.
fn print_found<T: Serialize>(subject: &str, value: Option<T>) -> anyhow::Result<()> {
    if value.is_none() {
        tracing::warn!("'{}' not found in the graph", subject);
    }
    print_json(&value)
}
