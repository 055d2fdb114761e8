//! The deploy command

use crate::config::Config;
use crate::device::{find_device, read_platform_version};
use crate::engine::{synchronize, SyncEvent, SyncOptions, SyncReport};
use crate::rules::RuleEvaluator;
use crate::types::DeployError;
use crate::ui::Reporter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Run a deploy
///
/// Resolves the destination (auto-detecting the device when none is
/// configured), validates both roots, builds the rule evaluator and runs the
/// sync engine with console reporting.
pub fn run(config: &Config) -> Result<SyncReport, DeployError> {
    let reporter = Reporter::new(config.json);

    let destination = match &config.destination {
        Some(path) => path.clone(),
        None => {
            let found = find_device().ok_or(DeployError::DeviceNotFound)?;
            info!("Detected device at {}", found.display());
            found
        }
    };

    if let Some(platform) = read_platform_version(&destination) {
        reporter.device_banner(&destination, &platform);
    }

    let source_root = resolve(&config.source);
    let destination_root = resolve(&destination);
    reporter.paths(&source_root, &destination_root);

    if !source_root.is_dir() {
        return Err(DeployError::InvalidSourcePath { path: source_root });
    }
    if !destination_root.is_dir() {
        return Err(DeployError::InvalidDestinationPath {
            path: destination_root,
        });
    }

    let rules = if config.use_gitignore {
        let rules = RuleEvaluator::new(&source_root);
        debug!("Loaded rules from {} director(ies)", rules.layer_count());
        Some(rules)
    } else {
        None
    };

    let options = SyncOptions {
        delete_enabled: config.delete,
        dry_run: config.dry_run,
        rules: rules.as_ref(),
    };
    let on_event = |event: &SyncEvent| reporter.handle(event);
    let report = synchronize(&source_root, &destination_root, &options, Some(&on_event))?;

    reporter.summary(&report);
    Ok(report)
}

/// Canonical form when the path exists, absolute form otherwise
fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}
