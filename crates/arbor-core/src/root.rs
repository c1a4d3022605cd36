//! Project root detection and path normalization

use crate::error::{ArborError, Result};
use std::path::{Component, Path, PathBuf};

/// Marker that identified a project root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceType {
    Git,
    Cargo,
    DotNet, // *.sln
    Npm,
    GoModules,
}

/// Detect if `dir` is a workspace root (git, Cargo, .NET solution, npm, Go).
pub fn detect_workspace(dir: &Path) -> Option<WorkspaceType> {
    if dir.join(".git").exists() {
        Some(WorkspaceType::Git)
    } else if dir.join("Cargo.toml").exists() {
        Some(WorkspaceType::Cargo)
    } else if has_solution_file(dir) {
        Some(WorkspaceType::DotNet)
    } else if dir.join("package.json").exists() {
        Some(WorkspaceType::Npm)
    } else if dir.join("go.mod").exists() {
        Some(WorkspaceType::GoModules)
    } else {
        None
    }
}

fn has_solution_file(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.path().extension().is_some_and(|ext| ext == "sln"))
        })
        .unwrap_or(false)
}

/// Canonical project root; every graph path is stored relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoot {
    path: PathBuf,
    workspace: Option<WorkspaceType>,
}

impl ProjectRoot {
    /// Use `path` as the root. Fails if it cannot be canonicalized.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let canonical = path.canonicalize().map_err(|source| ArborError::ProjectRoot {
            path: path.to_path_buf(),
            source,
        })?;
        let workspace = detect_workspace(&canonical);
        Ok(ProjectRoot {
            path: canonical,
            workspace,
        })
    }

    /// Walk upward from `start` to the nearest workspace marker, falling back
    /// to `start` itself.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = ProjectRoot::new(start)?;
        for dir in start.path.ancestors() {
            if let Some(workspace) = detect_workspace(dir) {
                tracing::debug!("Detected {:?} workspace at {}", workspace, dir.display());
                return Ok(ProjectRoot {
                    path: dir.to_path_buf(),
                    workspace: Some(workspace),
                });
            }
        }
        Ok(start)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn workspace(&self) -> Option<WorkspaceType> {
        self.workspace
    }

    /// Express `path` relative to the root.
    ///
    /// Relative input is taken as already relative to the root. Absolute
    /// paths outside the root are kept absolute. Either way `.` and `..`
    /// components are resolved lexically.
    pub fn relative(&self, path: &Path) -> PathBuf {
        let normalized = normalize(path);
        if normalized.is_absolute() {
            match normalized.strip_prefix(&self.path) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => normalized,
            }
        } else {
            normalized
        }
    }

    /// Absolute location of a root-relative path.
    pub fn absolute(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.path.join(relative)
        }
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
