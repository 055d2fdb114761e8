//! SyncAction - Actions produced by the sync engine

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A planned or performed filesystem action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    /// Copy a source file onto its destination counterpart (overwriting)
    Copy {
        source: PathBuf,
        destination: PathBuf,
        relative: PathBuf,
        size: u64,
    },

    /// Delete a stale destination file
    Delete { path: PathBuf, relative: PathBuf },
}

impl SyncAction {
    /// Short label used in logs and progress output
    pub fn action_name(&self) -> &'static str {
        match self {
            SyncAction::Copy { .. } => "Copy",
            SyncAction::Delete { .. } => "Delete",
        }
    }

    /// Path relative to the tree root the action applies to
    pub fn relative(&self) -> &Path {
        match self {
            SyncAction::Copy { relative, .. } | SyncAction::Delete { relative, .. } => relative,
        }
    }

    /// Destination path this action writes or removes
    pub fn target(&self) -> &Path {
        match self {
            SyncAction::Copy { destination, .. } => destination,
            SyncAction::Delete { path, .. } => path,
        }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, SyncAction::Copy { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, SyncAction::Delete { .. })
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Copy { relative, .. } => write!(
                f,
                "Copying ./{} to ./{}",
                relative.display(),
                relative.display()
            ),
            SyncAction::Delete { relative, .. } => write!(f, "Deleting ./{}", relative.display()),
        }
    }
}
