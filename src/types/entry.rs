//! FileEntry - A deployable file found during traversal

use std::path::PathBuf;

/// A regular file collected from a source or destination tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute, symlink-resolved path (identity of the entry)
    pub path: PathBuf,

    /// Path relative to the traversal root
    pub relative: PathBuf,

    /// File size in bytes
    pub size: u64,
}

impl FileEntry {
    /// Create a new FileEntry
    pub fn new(path: PathBuf, relative: PathBuf, size: u64) -> Self {
        Self {
            path,
            relative,
            size,
        }
    }
}
