//! Error types for circdeploy

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for deploy operations
///
/// Every variant is terminal for the current run: the engine stops at the
/// first error and reports it with the offending path(s).
#[derive(Debug, Error)]
pub enum DeployError {
    /// No destination given and no mounted device was found
    #[error("Could not find a connected CircuitPython device")]
    DeviceNotFound,

    /// Source root missing or not a directory
    #[error("Source path does not exist or is not a directory: {}", path.display())]
    InvalidSourcePath { path: PathBuf },

    /// Destination root missing or not a directory
    #[error("Destination path does not exist or is not a directory: {}", path.display())]
    InvalidDestinationPath { path: PathBuf },

    /// Creating an intermediate destination directory failed
    #[error("Error while creating destination directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Copying a file failed (includes copying a file onto itself)
    #[error("Error while copying file: {} to: {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Deleting a stale destination file failed
    #[error("Error while deleting file {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Listing a directory during traversal failed
    #[error("Error while scanning directory {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid configuration file
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DeployError {
    /// Build the error reported when a file would be copied onto itself
    pub fn same_file(from: PathBuf, to: PathBuf) -> Self {
        DeployError::Copy {
            from,
            to,
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "source and destination are the same file",
            ),
        }
    }

}
