//! Executor module for file operations
//!
//! Every function here mutates the destination tree and maps failures to a
//! `DeployError` that names the paths involved.

pub mod copy;

use crate::types::{DeployError, SyncAction};
use std::fs;
use std::path::Path;

pub use copy::copy_file_atomic;

/// Perform a single action against the filesystem
///
/// Returns the number of bytes written (zero for deletes).
pub fn execute_action(action: &SyncAction) -> Result<u64, DeployError> {
    match action {
        SyncAction::Copy {
            source,
            destination,
            ..
        } => {
            ensure_parent_dir(destination)?;
            copy_file_atomic(source, destination)
        }
        SyncAction::Delete { path, .. } => delete_file(path).map(|_| 0),
    }
}

/// Create every missing directory above `dest`. Succeeds if they exist.
pub fn ensure_parent_dir(dest: &Path) -> Result<(), DeployError> {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| DeployError::DirectoryCreation {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Remove a single file
///
/// A file that vanished between scan and delete is reported like any other
/// failure.
pub fn delete_file(path: &Path) -> Result<(), DeployError> {
    fs::remove_file(path).map_err(|source| DeployError::Delete {
        path: path.to_path_buf(),
        source,
    })
}
