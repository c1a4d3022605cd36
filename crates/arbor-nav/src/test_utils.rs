//! Graph fixtures for navigation tests

use arbor_core::{DeclarationNode, EdgeKind, GraphStore, NodeKind, RelationshipEdge};
use std::sync::Arc;

pub fn decl(id: &str, kind: NodeKind, file: &str, line: u32) -> DeclarationNode {
    let name = id.rsplit('.').next().unwrap_or(id);
    DeclarationNode::new(id, kind, name, file)
        .with_qualified_name(id)
        .with_lines(line, line + 1)
}

pub fn edge(source: &str, target: &str, kind: EdgeKind, file: &str, line: u32) -> RelationshipEdge {
    RelationshipEdge::new(source, target, kind).observed_at(file, line)
}

pub fn contains(parent: &str, child: &str, file: &str) -> RelationshipEdge {
    edge(parent, child, EdgeKind::Contains, file, 0)
}

/// A solution with three projects.
///
/// ```text
/// Sln
/// ├── P1 ── Shop ── Shop.Cart { Items, Add, Total }
/// ├── P2 ── Billing ── Billing.Invoice { Print }
/// └── Core
/// ```
///
/// Calls form a cycle: `Add → Total → Print → Add`.
/// Dependencies: `P2 → P1 → Core`.
pub fn sample_store() -> Arc<GraphStore> {
    let store = GraphStore::new();

    store.add_nodes([
        decl("Sln", NodeKind::Solution, "App.sln", 1),
        decl("P1", NodeKind::Project, "P1/P1.csproj", 1),
        decl("P2", NodeKind::Project, "P2/P2.csproj", 1),
        decl("Core", NodeKind::Project, "Core/Core.csproj", 1),
        decl("Shop", NodeKind::Namespace, "P1/cart.cs", 1),
        decl("Shop.Cart", NodeKind::Class, "P1/cart.cs", 3),
        decl("Shop.Cart.Items", NodeKind::Property, "P1/cart.cs", 4),
        decl("Shop.Cart.Total", NodeKind::Method, "P1/cart.cs", 12),
        decl("Shop.Cart.Add", NodeKind::Method, "P1/cart.cs", 6),
        decl("Billing", NodeKind::Namespace, "P2/invoice.cs", 1),
        decl("Billing.Invoice", NodeKind::Class, "P2/invoice.cs", 3),
        decl("Billing.Invoice.Print", NodeKind::Method, "P2/invoice.cs", 8),
    ]);

    store.add_edges([
        contains("Sln", "P1", "App.sln"),
        contains("Sln", "P2", "App.sln"),
        contains("Sln", "Core", "App.sln"),
        contains("P1", "Shop", "P1/P1.csproj"),
        contains("Shop", "Shop.Cart", "P1/cart.cs"),
        contains("Shop.Cart", "Shop.Cart.Total", "P1/cart.cs"),
        contains("Shop.Cart", "Shop.Cart.Add", "P1/cart.cs"),
        contains("Shop.Cart", "Shop.Cart.Items", "P1/cart.cs"),
        contains("P2", "Billing", "P2/P2.csproj"),
        contains("Billing", "Billing.Invoice", "P2/invoice.cs"),
        contains("Billing.Invoice", "Billing.Invoice.Print", "P2/invoice.cs"),
        edge("Shop.Cart.Add", "Shop.Cart.Total", EdgeKind::Calls, "P1/cart.cs", 8),
        edge("Shop.Cart.Total", "Billing.Invoice.Print", EdgeKind::Calls, "P1/cart.cs", 14),
        edge("Billing.Invoice.Print", "Shop.Cart.Add", EdgeKind::Calls, "P2/invoice.cs", 10),
        edge("Billing.Invoice.Print", "Shop.Cart.Items", EdgeKind::References, "P2/invoice.cs", 9),
        edge("P2", "P1", EdgeKind::DependsOn, "P2/P2.csproj", 5),
        edge("P1", "Core", EdgeKind::DependsOn, "P1/P1.csproj", 5),
    ]);

    Arc::new(store)
}
