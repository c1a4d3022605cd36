//! File change notifications consumed by the update pipeline

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    /// The file moved; `path` of the change holds the new location.
    Renamed { from: PathBuf },
}

/// A change to one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        FileChange {
            path: path.into(),
            kind,
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        FileChange::new(path, ChangeKind::Created)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        FileChange::new(path, ChangeKind::Modified)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        FileChange::new(path, ChangeKind::Deleted)
    }

    pub fn renamed(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        FileChange::new(to, ChangeKind::Renamed { from: from.into() })
    }

    pub fn is_deletion(&self) -> bool {
        self.kind == ChangeKind::Deleted
    }

    /// Previous location for renames.
    pub fn old_path(&self) -> Option<&Path> {
        match &self.kind {
            ChangeKind::Renamed { from } => Some(from),
            _ => None,
        }
    }

    /// Merge a newer change for the same path into this pending one.
    ///
    /// `Deleted` beats anything pending. A pending rename stays a rename
    /// when its target is modified or created again. Otherwise the newer
    /// change wins.
    pub fn merge(self, newer: FileChange) -> FileChange {
        match (&self.kind, &newer.kind) {
            (_, ChangeKind::Deleted) => newer,
            (ChangeKind::Renamed { .. }, ChangeKind::Modified | ChangeKind::Created) => self,
            _ => newer,
        }
    }
}

/// Pending changes, one per path, in first-seen order.
///
/// Renames keep pointing at the oldest location whose graph data still has
/// to go: a chain `a -> b -> c` settles as one rename from `a`, and a rename
/// overtaken by a deletion of its target leaves a deletion of its source.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    slots: Vec<Option<FileChange>>,
    positions: HashMap<PathBuf, usize>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&FileChange> {
        let at = *self.positions.get(path)?;
        self.slots[at].as_ref()
    }

    /// Record a newer change.
    pub fn push(&mut self, mut change: FileChange) {
        // The old location's pending change is subsumed by the rename, but a
        // rename it carried still owes the removal of its own source.
        if let Some(from) = change.old_path().map(Path::to_path_buf) {
            if let Some((_, previous)) = self.take(&from) {
                if let ChangeKind::Renamed { from: origin } = previous.kind {
                    if !self.positions.contains_key(&origin) {
                        change = FileChange::renamed(origin, change.path);
                    }
                }
            }
        }

        let Some((at, pending)) = self.take(&change.path) else {
            self.positions.insert(change.path.clone(), self.slots.len());
            self.slots.push(Some(change));
            return;
        };

        let superseded = pending.old_path().map(Path::to_path_buf);
        let merged = pending.merge(change);
        let kept_origin = merged.old_path().map(Path::to_path_buf);
        self.positions.insert(merged.path.clone(), at);
        self.slots[at] = Some(merged);

        if let Some(origin) = superseded {
            if kept_origin.as_ref() != Some(&origin) && !self.positions.contains_key(&origin) {
                self.push(FileChange::deleted(origin));
            }
        }
    }

    fn take(&mut self, path: &Path) -> Option<(usize, FileChange)> {
        let at = self.positions.remove(path)?;
        self.slots[at].take().map(|change| (at, change))
    }

    pub fn into_changes(self) -> Vec<FileChange> {
        self.slots.into_iter().flatten().collect()
    }
}

impl FromIterator<FileChange> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = FileChange>>(changes: I) -> Self {
        let mut set = ChangeSet::new();
        for change in changes {
            set.push(change);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_rules() {
        let m = FileChange::modified("a.cs");
        let d = FileChange::deleted("a.cs");
        let c = FileChange::created("a.cs");

        assert_eq!(m.clone().merge(d.clone()), d);
        assert_eq!(c.clone().merge(d.clone()), d);
        assert_eq!(d.clone().merge(c.clone()), c);
        assert_eq!(c.clone().merge(m.clone()), m);
        assert_eq!(d.clone().merge(m.clone()), m);
    }

    #[test]
    fn test_rename_survives_later_modification() {
        let r = FileChange::renamed("old.cs", "new.cs");
        let merged = r.clone().merge(FileChange::modified("new.cs"));
        assert_eq!(merged, r);
        assert_eq!(merged.old_path(), Some(Path::new("old.cs")));

        let recreated = r.clone().merge(FileChange::created("new.cs"));
        assert_eq!(recreated, r);
    }

    #[test]
    fn test_change_set_keeps_first_seen_order() {
        let set: ChangeSet = [
            FileChange::modified("b.cs"),
            FileChange::modified("a.cs"),
            FileChange::deleted("b.cs"),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
        assert_eq!(
            set.into_changes(),
            vec![FileChange::deleted("b.cs"), FileChange::modified("a.cs")]
        );
    }

    #[test]
    fn test_rename_chain_keeps_first_source() {
        let mut set = ChangeSet::new();
        set.push(FileChange::renamed("a.cs", "b.cs"));
        set.push(FileChange::renamed("b.cs", "c.cs"));

        assert_eq!(set.into_changes(), vec![FileChange::renamed("a.cs", "c.cs")]);
    }

    #[test]
    fn test_deleted_rename_target_deletes_source() {
        let mut set = ChangeSet::new();
        set.push(FileChange::renamed("a.cs", "b.cs"));
        set.push(FileChange::deleted("b.cs"));

        assert_eq!(
            set.into_changes(),
            vec![FileChange::deleted("b.cs"), FileChange::deleted("a.cs")]
        );
    }

    #[test]
    fn test_recreated_source_is_not_deleted() {
        let mut set = ChangeSet::new();
        set.push(FileChange::renamed("a.cs", "b.cs"));
        set.push(FileChange::created("a.cs"));
        set.push(FileChange::deleted("b.cs"));

        assert_eq!(
            set.into_changes(),
            vec![FileChange::deleted("b.cs"), FileChange::created("a.cs")]
        );
    }

    #[test]
    fn test_rename_over_pending_rename_deletes_first_source() {
        let mut set = ChangeSet::new();
        set.push(FileChange::renamed("a.cs", "b.cs"));
        set.push(FileChange::renamed("x.cs", "b.cs"));

        assert_eq!(
            set.into_changes(),
            vec![FileChange::renamed("x.cs", "b.cs"), FileChange::deleted("a.cs")]
        );
    }
}
