//! Symbol table for cross-file resolution

use crate::model::NodeId;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Symbol table mapping analyzer symbol keys to NodeIds. Thread-safe for
/// concurrent access.
pub struct SymbolTable {
    symbols: DashMap<String, NodeId>,
    /// For fast file lookup: file path -> symbol keys declared in that file
    file_symbols: DashMap<PathBuf, Vec<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            symbols: DashMap::new(),
            file_symbols: DashMap::new(),
        }
    }

    /// Insert a symbol declared in `file_path`.
    pub fn insert(&self, key: String, node_id: NodeId, file_path: &Path) {
        self.symbols.insert(key.clone(), node_id);
        let mut keys = self.file_symbols.entry(file_path.to_path_buf()).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    /// Merge the mappings an analyzer returned for `file_path`.
    pub fn merge(&self, mappings: HashMap<String, NodeId>, file_path: &Path) {
        for (key, node_id) in mappings {
            self.insert(key, node_id, file_path);
        }
    }

    /// Look up a symbol by key.
    pub fn lookup(&self, key: &str) -> Option<NodeId> {
        self.symbols.get(key).map(|r| r.value().clone())
    }

    /// Get all symbols defined in a file.
    pub fn symbols_in_file(&self, file_path: &Path) -> Vec<NodeId> {
        self.file_symbols
            .get(file_path)
            .map(|r| {
                r.value()
                    .iter()
                    .filter_map(|key| self.symbols.get(key).map(|n| n.value().clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove all symbols for a file (used before re-analysis).
    pub fn remove_file(&self, file_path: &Path) {
        if let Some((_, keys)) = self.file_symbols.remove(file_path) {
            for key in keys {
                self.symbols.remove(&key);
            }
        }
    }

    /// Copy of the whole mapping, handed to the file analyzer.
    pub fn to_map(&self) -> HashMap<String, NodeId> {
        self.symbols
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn clear(&self) {
        self.symbols.clear();
        self.file_symbols.clear();
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove_file() {
        let table = SymbolTable::new();
        table.insert("T:Ns.A".to_string(), NodeId::new("A"), Path::new("a.cs"));
        table.insert("M:Ns.A.M".to_string(), NodeId::new("A.M"), Path::new("a.cs"));
        table.insert("T:Ns.B".to_string(), NodeId::new("B"), Path::new("b.cs"));

        assert_eq!(table.lookup("T:Ns.A"), Some(NodeId::new("A")));
        assert_eq!(table.symbols_in_file(Path::new("a.cs")).len(), 2);

        table.remove_file(Path::new("a.cs"));
        assert_eq!(table.lookup("T:Ns.A"), None);
        assert_eq!(table.len(), 1);
        assert_eq!(table.to_map().get("T:Ns.B"), Some(&NodeId::new("B")));
    }

    #[test]
    fn test_merge_does_not_duplicate_keys() {
        let table = SymbolTable::new();
        let mappings = HashMap::from([("T:Ns.A".to_string(), NodeId::new("A"))]);
        table.merge(mappings.clone(), Path::new("a.cs"));
        table.merge(mappings, Path::new("a.cs"));

        assert_eq!(table.symbols_in_file(Path::new("a.cs")).len(), 1);
    }
}
