//! Integration tests for Arbor
//!
//! These tests verify that multiple systems work together correctly: an
//! analyzer reading real files, the update orchestrator, the JSON snapshot,
//! the navigator and the CLI.

use arbor_core::{
    ArborConfig, DeclarationNode, EdgeKind, FileChange, GraphStore, JsonRepository, NodeId,
    NodeKind, ProjectRoot, RelationshipEdge, Repository, snapshot_path,
};
use arbor_nav::{HierarchyDirection, MatchMode, Navigator, SearchQuery};
use arbor_watcher::{AnalysisOutput, AnalysisRequest, FileAnalyzer, UpdateOrchestrator};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

/// Reads a one-declaration-per-line format:
///
/// ```text
/// <kind> <qualified.name> [<edge kind> <qualified.name>]...
/// ```
///
/// A declaration is contained in the one named by its qualifier when that
/// one is declared earlier in the same file.
struct LineAnalyzer;

fn id(kind: NodeKind, fqn: &str) -> NodeId {
    NodeId::derive(kind, fqn)
}

#[async_trait]
impl FileAnalyzer for LineAnalyzer {
    async fn analyze_file(&self, request: AnalysisRequest) -> anyhow::Result<AnalysisOutput> {
        let text = tokio::fs::read_to_string(&request.absolute_path).await?;
        let mut output = AnalysisOutput::default();
        let mut local: HashMap<String, NodeId> = HashMap::new();
        let mut pending = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line_no = index as u32 + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                continue;
            }
            let kind: NodeKind = tokens[0].parse()?;
            let fqn = tokens[1];
            let node_id = id(kind, fqn);
            let name = fqn.rsplit('.').next().unwrap_or(fqn);

            if let Some(parent) = fqn.rsplit_once('.').and_then(|(p, _)| local.get(p)) {
                output.edges.push(
                    RelationshipEdge::new(parent.clone(), node_id.clone(), EdgeKind::Contains)
                        .observed_at(&request.path, line_no),
                );
            }
            output.nodes.push(
                DeclarationNode::new(node_id.clone(), kind, name, &request.path)
                    .with_qualified_name(fqn)
                    .with_lines(line_no, line_no),
            );
            local.insert(fqn.to_string(), node_id.clone());
            output.symbol_mappings.insert(fqn.to_string(), node_id.clone());

            for pair in tokens[2..].chunks(2) {
                if let [edge_kind, target] = pair {
                    pending.push((node_id.clone(), edge_kind.parse::<EdgeKind>()?, target.to_string(), line_no));
                }
            }
        }

        for (source, kind, target, line_no) in pending {
            let resolved = local
                .get(&target)
                .or_else(|| request.existing_symbols.get(&target));
            if let Some(target) = resolved {
                output.edges.push(
                    RelationshipEdge::new(source, target.clone(), kind)
                        .observed_at(&request.path, line_no),
                );
            }
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "lines"
    }
}

const CART: &str = "\
namespace Shop
class Shop.Cart
field Shop.Cart.Items
method Shop.Cart.Add calls Shop.Cart.Total
method Shop.Cart.Total references Shop.Cart.Items
";

const ORDER: &str = "\
class Shop.Order inherits Shop.Cart
method Shop.Order.Checkout calls Shop.Cart.Add
";

const INVOICE: &str = "\
namespace Billing
class Billing.Invoice
method Billing.Invoice.Print calls Shop.Cart.Total
";

struct Project {
    dir: TempDir,
    root: ProjectRoot,
    config: ArborConfig,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("arbor.toml"), "cache_dir = \".graph\"\n").unwrap();
        let project = Project {
            root: ProjectRoot::new(dir.path()).unwrap(),
            config: ArborConfig::load(dir.path()).unwrap(),
            dir,
        };
        project.write("shop/cart.cs", CART);
        project.write("shop/order.cs", ORDER);
        project.write("billing/invoice.cs", INVOICE);
        project
    }

    fn write(&self, path: &str, text: &str) {
        let path = self.dir.path().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn orchestrator(&self) -> Arc<UpdateOrchestrator> {
        let repository = JsonRepository::new(self.root.path(), &self.config.cache_dir);
        Arc::new(UpdateOrchestrator::new(
            self.root.clone(),
            self.config.clone(),
            Arc::new(LineAnalyzer),
            Arc::new(repository),
        ))
    }

    async fn indexed(&self) -> Arc<UpdateOrchestrator> {
        let orchestrator = self.orchestrator();
        orchestrator.hydrate().await.unwrap();
        let summary = orchestrator
            .index_files(&paths(&["shop/cart.cs", "shop/order.cs", "billing/invoice.cs"]))
            .await;
        assert!(summary.failed_files.is_empty(), "{:?}", summary.failed_files);
        orchestrator
    }

    fn arbor(&self, args: &[&str]) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_arbor"))
            .arg("--root")
            .arg(self.dir.path())
            .args(args)
            .output()
            .expect("Failed to execute arbor")
    }
}

fn paths(list: &[&str]) -> Vec<PathBuf> {
    list.iter().map(PathBuf::from).collect()
}

fn ids(nodes: impl IntoIterator<Item = DeclarationNode>) -> Vec<NodeId> {
    nodes.into_iter().map(|n| n.id).collect()
}

#[tokio::test]
async fn test_index_then_navigate() {
    let project = Project::new();
    let orchestrator = project.indexed().await;
    let navigator = Navigator::new(orchestrator.store());

    let stats = navigator.stats();
    assert_eq!(stats.node_count, 10);
    assert_eq!(stats.file_count, 3);

    let found = navigator.search(&SearchQuery::new("checkout").mode(MatchMode::Exact));
    assert_eq!(ids(found.items), vec![id(NodeKind::Method, "Shop.Order.Checkout")]);

    let cart = id(NodeKind::Class, "Shop.Cart");
    let children = navigator.children(&cart, None, 10).unwrap();
    assert_eq!(
        ids(children.items),
        vec![
            id(NodeKind::Field, "Shop.Cart.Items"),
            id(NodeKind::Method, "Shop.Cart.Add"),
            id(NodeKind::Method, "Shop.Cart.Total"),
        ]
    );

    let total = id(NodeKind::Method, "Shop.Cart.Total");
    let callers = navigator.callers(&total, 2, 10).unwrap();
    let mut seen: Vec<(String, u32)> = callers
        .entries
        .iter()
        .map(|e| (e.node.fully_qualified_name.clone(), e.depth))
        .collect();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("Billing.Invoice.Print".to_string(), 1),
            ("Shop.Cart.Add".to_string(), 1),
            ("Shop.Order.Checkout".to_string(), 2),
        ]
    );

    let derived = navigator
        .inheritance(&cart, HierarchyDirection::Descendants, 5)
        .unwrap();
    assert_eq!(derived.entries.len(), 1);
    assert_eq!(derived.entries[0].node.id, id(NodeKind::Class, "Shop.Order"));

    let file = navigator.file_declarations(Path::new("shop/cart.cs")).unwrap();
    assert_eq!(file.total_count, 5);
    assert_eq!(file.roots.len(), 1);
    assert_eq!(file.roots[0].node.id, id(NodeKind::Namespace, "Shop"));
    assert_eq!(file.roots[0].size(), 5);
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let project = Project::new();
    let first = project.indexed().await;
    let before = first.store().stats();

    let path = snapshot_path(project.root.path(), ".graph");
    assert!(path.exists(), "snapshot missing at {}", path.display());

    let repository = JsonRepository::new(project.root.path(), &project.config.cache_dir);
    repository.initialize().await.unwrap();
    let store = GraphStore::from_snapshot(repository.load_graph().await.unwrap());
    assert_eq!(store.stats(), before);

    let second = project.orchestrator();
    let hydrated = second.hydrate().await.unwrap();
    assert_eq!(hydrated, before);
    assert_eq!(
        second.symbols().lookup("Shop.Cart.Total"),
        Some(id(NodeKind::Method, "Shop.Cart.Total"))
    );
}

#[tokio::test]
async fn test_edit_cascades_after_hydration() {
    let project = Project::new();
    drop(project.indexed().await);

    let orchestrator = project.orchestrator();
    orchestrator.hydrate().await.unwrap();

    project.write(
        "shop/cart.cs",
        "namespace Shop\nclass Shop.Cart\nfield Shop.Cart.Items\nmethod Shop.Cart.Add calls Shop.Cart.Sum\nmethod Shop.Cart.Sum\n",
    );
    let summary = orchestrator.update_files(&paths(&["shop/cart.cs"])).await;

    assert!(summary.failed_files.is_empty());
    assert_eq!(
        summary.cascaded_files,
        paths(&["billing/invoice.cs", "shop/order.cs"])
    );

    let navigator = Navigator::new(orchestrator.store());
    let print = id(NodeKind::Method, "Billing.Invoice.Print");
    assert!(navigator.callees(&print, 1, 10).unwrap().entries.is_empty());
    assert!(navigator.node(&id(NodeKind::Method, "Shop.Cart.Total")).is_none());

    let add = id(NodeKind::Method, "Shop.Cart.Add");
    let callees = navigator.callees(&add, 1, 10).unwrap();
    assert_eq!(
        ids(callees.entries.into_iter().map(|e| e.node)),
        vec![id(NodeKind::Method, "Shop.Cart.Sum")]
    );

    let checkout = id(NodeKind::Method, "Shop.Order.Checkout");
    let callees = navigator.callees(&checkout, 1, 10).unwrap();
    assert_eq!(callees.entries.len(), 1);
}

#[tokio::test]
async fn test_deleted_file_leaves_the_graph() {
    let project = Project::new();
    let orchestrator = project.indexed().await;

    std::fs::remove_file(project.dir.path().join("shop/order.cs")).unwrap();
    let summary = orchestrator
        .process_changes(vec![FileChange::deleted("shop/order.cs")], true)
        .await;
    assert_eq!(summary.nodes_removed, 2);

    let navigator = Navigator::new(orchestrator.store());
    let cart = id(NodeKind::Class, "Shop.Cart");
    let derived = navigator
        .inheritance(&cart, HierarchyDirection::Descendants, 5)
        .unwrap();
    assert!(derived.entries.is_empty());
    assert!(navigator.node(&id(NodeKind::Class, "Shop.Order")).is_none());
    assert!(navigator.file_declarations(Path::new("shop/order.cs")).is_none());
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let output = Command::new(env!("CARGO_BIN_EXE_arbor"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("arbor"));
    assert!(stdout.contains("query"));

    let output = Command::new(env!("CARGO_BIN_EXE_arbor"))
        .arg("version")
        .output()
        .expect("Failed to execute command");
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn test_cli_queries_the_snapshot() {
    let project = Project::new();
    drop(project.indexed().await);

    let output = project.arbor(&["query", "stats"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["node_count"], 10);

    let output = project.arbor(&["query", "search", "Cart", "--kind", "class"]);
    assert!(output.status.success());
    let page: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(page["total_count"], 1);
    assert_eq!(page["items"][0]["fully_qualified_name"], "Shop.Cart");

    let output = project.arbor(&["query", "node", "missing"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "null");

    let output = project.arbor(&["query", "list", "nonsense"]);
    assert!(!output.status.success());

    let output = project.arbor(&["clear"]);
    assert!(output.status.success());
    assert!(!project.dir.path().join(".graph").exists());

    let output = project.arbor(&["query", "stats"]);
    assert!(!output.status.success());
}
