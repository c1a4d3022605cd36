//! Arbor Core — declaration graph model, graph store, dependency tracking

pub mod change;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod repository;
pub mod root;
pub mod store;
pub mod symbols;
pub mod tracker;


pub use change::{ChangeKind, ChangeSet, FileChange};
pub use config::ArborConfig;
pub use error::{ArborError, Result};
pub use events::{UpdateEvent, UpdateSummary};
pub use model::{
    DeclarationNode, EdgeId, EdgeKind, GraphSnapshot, NodeId, NodeKind, ParameterInfo,
    RelationshipEdge, SignatureInfo,
};
pub use repository::{JsonRepository, MemoryRepository, Repository, clear_cache, snapshot_path};
pub use root::{ProjectRoot, WorkspaceType, detect_workspace};
pub use store::{GraphStats, GraphStore};
pub use symbols::SymbolTable;
pub use tracker::DependencyTracker;
