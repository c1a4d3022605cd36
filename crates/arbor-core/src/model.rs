//! Core data structures for the declaration graph

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ArborError;

/// Unique, stable identifier for a declaration node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    /// Derive an id from the symbol's kind and fully qualified name.
    ///
    /// The file path is not part of the id; a declaration moved to another
    /// file keeps it.
    pub fn derive(kind: NodeKind, fully_qualified_name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        fully_qualified_name.hash(&mut hasher);
        NodeId(format!("{}:{:016x}", kind.as_str(), hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

/// Unique edge identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        EdgeId(id.into())
    }

    /// Hash of source + target + kind + origin line.
    pub fn derive(source: &NodeId, target: &NodeId, kind: EdgeKind, line: Option<u32>) -> Self {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        target.hash(&mut hasher);
        kind.hash(&mut hasher);
        line.hash(&mut hasher);
        EdgeId(format!("{}:{:016x}", kind.as_str(), hasher.finish()))
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        EdgeId(id.to_string())
    }
}

/// Discriminates what kind of code entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    // ── Structural ──────────────────────────────────────────
    Solution,
    Project,
    File,
    Namespace,

    // ── Types ───────────────────────────────────────────────
    Class,
    Interface,
    Struct,
    Enum,
    Record,
    Delegate,

    // ── Members ─────────────────────────────────────────────
    Method,
    Constructor,
    Property,
    Field,
    Event,

    // ── Locals ──────────────────────────────────────────────
    Parameter,
    LocalVariable,
    TypeParameter,
}

impl NodeKind {
    pub const ALL: [NodeKind; 18] = [
        NodeKind::Solution,
        NodeKind::Project,
        NodeKind::File,
        NodeKind::Namespace,
        NodeKind::Class,
        NodeKind::Interface,
        NodeKind::Struct,
        NodeKind::Enum,
        NodeKind::Record,
        NodeKind::Delegate,
        NodeKind::Method,
        NodeKind::Constructor,
        NodeKind::Property,
        NodeKind::Field,
        NodeKind::Event,
        NodeKind::Parameter,
        NodeKind::LocalVariable,
        NodeKind::TypeParameter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Solution => "Solution",
            NodeKind::Project => "Project",
            NodeKind::File => "File",
            NodeKind::Namespace => "Namespace",
            NodeKind::Class => "Class",
            NodeKind::Interface => "Interface",
            NodeKind::Struct => "Struct",
            NodeKind::Enum => "Enum",
            NodeKind::Record => "Record",
            NodeKind::Delegate => "Delegate",
            NodeKind::Method => "Method",
            NodeKind::Constructor => "Constructor",
            NodeKind::Property => "Property",
            NodeKind::Field => "Field",
            NodeKind::Event => "Event",
            NodeKind::Parameter => "Parameter",
            NodeKind::LocalVariable => "LocalVariable",
            NodeKind::TypeParameter => "TypeParameter",
        }
    }

}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ArborError::invalid_parameter("kind", s, "a declaration kind"))
    }
}

/// What kind of relationship this edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    // ── Containment skeleton ────────────────────────────────
    Contains,

    // ── Type hierarchy ──────────────────────────────────────
    Inherits,
    Implements,
    Overrides,

    // ── Usage ───────────────────────────────────────────────
    Calls,
    Constructs,
    References,
    Uses,

    // ── Module level ────────────────────────────────────────
    DependsOn,
    Imports,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 10] = [
        EdgeKind::Contains,
        EdgeKind::Inherits,
        EdgeKind::Implements,
        EdgeKind::Overrides,
        EdgeKind::Calls,
        EdgeKind::Constructs,
        EdgeKind::References,
        EdgeKind::Uses,
        EdgeKind::DependsOn,
        EdgeKind::Imports,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Contains => "Contains",
            EdgeKind::Inherits => "Inherits",
            EdgeKind::Implements => "Implements",
            EdgeKind::Overrides => "Overrides",
            EdgeKind::Calls => "Calls",
            EdgeKind::Constructs => "Constructs",
            EdgeKind::References => "References",
            EdgeKind::Uses => "Uses",
            EdgeKind::DependsOn => "DependsOn",
            EdgeKind::Imports => "Imports",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ArborError::invalid_parameter("relationship", s, "a relationship kind"))
    }
}

/// A single declaration in the code graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeclarationNode {
    pub id: NodeId,
    pub name: String,
    pub fully_qualified_name: String,
    pub kind: NodeKind,
    /// Path relative to the project root.
    pub file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
    /// Architectural level tag (e.g. "domain", "infrastructure").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Opaque JSON blob; see [`DeclarationNode::signature`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl DeclarationNode {
    pub fn new(
        id: impl Into<NodeId>,
        kind: NodeKind,
        name: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        DeclarationNode {
            id: id.into(),
            fully_qualified_name: name.clone(),
            name,
            kind,
            file_path: file_path.into(),
            start_line: None,
            start_column: None,
            end_line: None,
            end_column: None,
            layer: None,
            description: None,
            metadata: None,
        }
    }

    pub fn with_qualified_name(mut self, fully_qualified_name: impl Into<String>) -> Self {
        self.fully_qualified_name = fully_qualified_name.into();
        self
    }

    pub fn with_lines(mut self, start_line: u32, end_line: u32) -> Self {
        self.start_line = Some(start_line);
        self.end_line = Some(end_line);
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// Parse the metadata blob as signature info.
    ///
    /// Missing or malformed metadata yields `None`.
    pub fn signature(&self) -> Option<SignatureInfo> {
        let raw = self.metadata.as_deref()?;
        match serde_json::from_str(raw) {
            Ok(signature) => Some(signature),
            Err(e) => {
                tracing::debug!("Ignoring malformed metadata on {}: {}", self.id, e);
                None
            }
        }
    }

}

/// Structured signature carried in a node's metadata blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SignatureInfo {
    #[serde(default)]
    pub accessibility: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(default)]
    pub type_name: Option<String>,
}

/// A directed edge in the declaration graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipEdge {
    pub id: EdgeId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub kind: EdgeKind,
    /// Where in source this relationship is expressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl RelationshipEdge {
    /// Create an edge whose id is derived from its endpoints and kind.
    pub fn new(source_id: impl Into<NodeId>, target_id: impl Into<NodeId>, kind: EdgeKind) -> Self {
        let source_id = source_id.into();
        let target_id = target_id.into();
        RelationshipEdge {
            id: EdgeId::derive(&source_id, &target_id, kind, None),
            source_id,
            target_id,
            kind,
            file_path: None,
            line: None,
            metadata: None,
        }
    }

    /// Record where the relationship was observed; re-derives the id.
    pub fn observed_at(mut self, file_path: impl Into<PathBuf>, line: u32) -> Self {
        self.file_path = Some(file_path.into());
        self.line = Some(line);
        self.id = EdgeId::derive(&self.source_id, &self.target_id, self.kind, self.line);
        self
    }
}

/// Serializable copy of a whole graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphSnapshot {
    pub nodes: Vec<DeclarationNode>,
    pub edges: Vec<RelationshipEdge>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}
