//! Core type definitions for circdeploy

mod action;
mod entry;
mod error;

pub use action::SyncAction;
pub use entry::FileEntry;
pub use error::DeployError;
