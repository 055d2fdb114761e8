//! Sync engine - copy phase followed by delete phase
//!
//! The delete phase walks the destination *after* the copy phase finished and
//! excludes, by resolved path, every file the copy phase wrote (or would have
//! written in a dry run) plus the protected `lib` directory. Ignore rules are
//! queried with real paths, so they only affect a destination that lives
//! inside the source tree.

use crate::executor::execute_action;
use crate::rules::RuleEvaluator;
use crate::scanner::{collect_matching_files, ExclusionSet, ScanFilter};
use crate::types::{DeployError, FileEntry, SyncAction};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory below the destination root that is never pruned
pub const PROTECTED_DIR: &str = "lib";

/// Options for a single `synchronize` run
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions<'a> {
    /// Run the delete phase
    pub delete_enabled: bool,

    /// Report actions without touching the filesystem
    pub dry_run: bool,

    /// Layered ignore rules bound to the source tree (None = disabled)
    pub rules: Option<&'a RuleEvaluator>,
}

/// Which tree a scan event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeSide {
    Source,
    Destination,
}

impl fmt::Display for TreeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeSide::Source => f.write_str("source"),
            TreeSide::Destination => f.write_str("destination"),
        }
    }
}

/// Events emitted while synchronizing.
#[derive(Debug)]
pub enum SyncEvent {
    /// A tree walk started.
    ScanStarted { side: TreeSide },
    /// A matching file was collected.
    ScanProgress { side: TreeSide, files: u64 },
    /// A tree walk finished.
    ScanFinished { side: TreeSide, files: usize },
    /// An action is about to be performed (or, in a dry run, is planned).
    Action(SyncAction),
}

/// Optional callback used to receive sync events.
pub type EventCallback<'a> = dyn Fn(&SyncEvent) + 'a;

/// Outcome of a run: every planned/performed action, copies first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub dry_run: bool,
    pub actions: Vec<SyncAction>,
    /// Bytes actually written (always zero in a dry run)
    pub bytes_copied: u64,
}

impl SyncReport {
    fn new(source: PathBuf, destination: PathBuf, dry_run: bool) -> Self {
        Self {
            source,
            destination,
            dry_run,
            ..Default::default()
        }
    }

    pub fn copies(&self) -> impl Iterator<Item = &SyncAction> {
        self.actions.iter().filter(|a| a.is_copy())
    }

    pub fn deletes(&self) -> impl Iterator<Item = &SyncAction> {
        self.actions.iter().filter(|a| a.is_delete())
    }

    pub fn copy_count(&self) -> usize {
        self.copies().count()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes().count()
    }

    /// Sum of source file sizes scheduled for copy
    pub fn planned_bytes(&self) -> u64 {
        self.actions
            .iter()
            .map(|action| match action {
                SyncAction::Copy { size, .. } => *size,
                SyncAction::Delete { .. } => 0,
            })
            .sum()
    }
}

/// Bring the destination tree in line with the source tree
///
/// 1. Collect matching source files and copy each onto
///    `destination_root/<relative>`, overwriting.
/// 2. If deletion is enabled, collect matching destination files, excluding
///    everything just copied and `destination_root/lib`, and delete them.
///
/// Every action is passed to `on_event` before it is executed. The run stops
/// at the first filesystem error.
///
/// # Example
/// ```no_run
/// use circdeploy::engine::{synchronize, SyncOptions};
/// use std::path::Path;
///
/// let options = SyncOptions {
///     delete_enabled: true,
///     dry_run: true,
///     rules: None,
/// };
/// let report = synchronize(Path::new("."), Path::new("/media/CIRCUITPY"), &options, None)?;
/// for action in &report.actions {
///     println!("{action}");
/// }
/// # Ok::<(), circdeploy::DeployError>(())
/// ```
pub fn synchronize(
    source_root: &Path,
    destination_root: &Path,
    options: &SyncOptions<'_>,
    on_event: Option<&EventCallback<'_>>,
) -> Result<SyncReport, DeployError> {
    let source_root = resolve_dir(source_root)
        .ok_or_else(|| DeployError::InvalidSourcePath {
            path: source_root.to_path_buf(),
        })?;
    let destination_root = resolve_dir(destination_root)
        .ok_or_else(|| DeployError::InvalidDestinationPath {
            path: destination_root.to_path_buf(),
        })?;

    let mut report = SyncReport::new(
        source_root.clone(),
        destination_root.clone(),
        options.dry_run,
    );

    // Copy phase
    let source_filter = ScanFilter::new().with_rules(options.rules);
    let source_files = scan(TreeSide::Source, &source_root, &source_filter, on_event)?;

    let mut protected = ExclusionSet::new();
    for file in source_files {
        let destination = destination_root.join(&file.relative);
        let action = SyncAction::Copy {
            source: file.path,
            destination,
            relative: file.relative,
            size: file.size,
        };

        emit_event(on_event, SyncEvent::Action(action.clone()));
        if !options.dry_run {
            report.bytes_copied += execute_action(&action)?;
        }
        protected.insert(action.target());
        report.actions.push(action);
    }
    info!("Copy phase complete: {} file(s)", report.copy_count());

    if !options.delete_enabled {
        debug!("Delete phase disabled");
        return Ok(report);
    }

    // Delete phase
    protected.insert(&destination_root.join(PROTECTED_DIR));
    let destination_filter = ScanFilter::new()
        .with_rules(options.rules)
        .with_exclusions(&protected);
    let stale_files = scan(
        TreeSide::Destination,
        &destination_root,
        &destination_filter,
        on_event,
    )?;

    for file in stale_files {
        // Remove the entry as it appears in the tree, not a symlink's target
        let action = SyncAction::Delete {
            path: destination_root.join(&file.relative),
            relative: file.relative,
        };

        emit_event(on_event, SyncEvent::Action(action.clone()));
        if !options.dry_run {
            execute_action(&action)?;
        }
        report.actions.push(action);
    }
    info!("Delete phase complete: {} file(s)", report.delete_count());

    Ok(report)
}

fn resolve_dir(path: &Path) -> Option<PathBuf> {
    path.canonicalize().ok().filter(|p| p.is_dir())
}

fn scan(
    side: TreeSide,
    root: &Path,
    filter: &ScanFilter<'_>,
    on_event: Option<&EventCallback<'_>>,
) -> Result<Vec<FileEntry>, DeployError> {
    debug!("Scanning {} tree at {}", side, root.display());
    emit_event(on_event, SyncEvent::ScanStarted { side });

    let progress = |files: u64| emit_event(on_event, SyncEvent::ScanProgress { side, files });
    let files = collect_matching_files(root, filter, Some(&progress))?;

    emit_event(
        on_event,
        SyncEvent::ScanFinished {
            side,
            files: files.len(),
        },
    );
    Ok(files)
}

fn emit_event(on_event: Option<&EventCallback<'_>>, event: SyncEvent) {
    if let Some(callback) = on_event {
        callback(&event);
    }
}
