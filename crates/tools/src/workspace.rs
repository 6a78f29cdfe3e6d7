//! Workspace scoping — every tool path is resolved inside one root directory.
//!
//! Paths handed in by the model are always relative to the workspace root.
//! Absolute paths, `..` components and symlinks pointing outside the root
//! are rejected.

use std::path::{Component, Path, PathBuf};

use forgeloop_core::error::ToolError;

/// Error returned when a path cannot be used inside the workspace.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Path '{path}' is absolute; use a path relative to the workspace")]
    Absolute { path: String },

    #[error("Path traversal detected in '{path}'")]
    Traversal { path: String },

    #[error("Path '{path}' resolves outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("Failed to resolve path '{path}': {reason}")]
    Resolve { path: String, reason: String },
}

impl PathError {
    pub fn into_tool_error(self, tool_name: &str) -> ToolError {
        ToolError::PermissionDenied {
            tool_name: tool_name.into(),
            reason: self.to_string(),
        }
    }
}

/// The directory tree all workspace tools share.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Resolve a model-supplied relative path to a path under the root.
    ///
    /// The target does not need to exist. The deepest existing ancestor is
    /// canonicalized so that symlinks cannot lead outside the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PathError> {
        let input = Path::new(relative.trim());
        if input.is_absolute() || input.has_root() {
            return Err(PathError::Absolute {
                path: relative.into(),
            });
        }

        let mut normalized = PathBuf::new();
        for component in input.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(PathError::Traversal {
                        path: relative.into(),
                    });
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathError::Absolute {
                        path: relative.into(),
                    });
                }
            }
        }

        let candidate = self.root.join(&normalized);
        self.check_contained(relative, &candidate)?;
        Ok(candidate)
    }

    fn check_contained(&self, relative: &str, candidate: &Path) -> Result<(), PathError> {
        // A root that does not exist yet has no symlinks to follow
        let Ok(root) = self.root.canonicalize() else {
            return Ok(());
        };

        let mut existing = candidate;
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => return Ok(()),
            }
        }

        let resolved = existing.canonicalize().map_err(|e| PathError::Resolve {
            path: relative.into(),
            reason: e.to_string(),
        })?;
        if resolved.starts_with(&root) {
            Ok(())
        } else {
            Err(PathError::OutsideWorkspace {
                path: relative.into(),
            })
        }
    }

    /// Display form of a resolved path, relative to the root.
    pub fn display(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if relative.as_os_str().is_empty() {
            ".".into()
        } else {
            relative.to_string_lossy().replace('\\', "/")
        }
    }
}
