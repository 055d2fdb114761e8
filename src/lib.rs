//! # circdeploy - Deploy a CircuitPython project to a device
//!
//! Copies every `.py`/`.pyc` file of a project tree onto a mounted board and
//! prunes the ones that no longer exist in the project, leaving `lib/` and
//! anything ignored by `.gitignore` rules alone.

// Module declarations
pub mod commands;
pub mod config;
pub mod device;
pub mod engine;
pub mod executor;
pub mod rules;
pub mod scanner;
pub mod types;
pub mod ui;

// Re-export commonly used types
pub use config::{Cli, Config};
pub use engine::{synchronize, SyncOptions, SyncReport};
pub use rules::RuleEvaluator;
pub use types::{DeployError, FileEntry, SyncAction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
