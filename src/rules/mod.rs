//! Layered ignore rules rooted at the source tree
//!
//! Every `.gitignore` and `.circdeployignore` below the root becomes one
//! layer. Pattern semantics come from `ignore::gitignore`; this module only
//! decides which layer answers for a given path: the deepest rule file whose
//! directory contains the path and that has an opinion on it.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Rule file names, in the order they are applied within one directory.
/// Later files override earlier ones.
pub const RULE_FILE_NAMES: [&str; 2] = [".gitignore", ".circdeployignore"];

/// Answers whether a path is excluded by the layered rule files of a tree
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    /// Sorted shallowest first
    layers: Vec<Gitignore>,
}

impl RuleEvaluator {
    /// Discover and parse every rule file beneath `root`.
    ///
    /// Never fails: unreadable rule files and invalid patterns are logged and
    /// skipped, leaving the remaining rules in force.
    pub fn new(root: &Path) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let mut by_dir: BTreeMap<PathBuf, Vec<(usize, PathBuf)>> = BTreeMap::new();

        let walker = ignore::WalkBuilder::new(&root)
            .standard_filters(false)
            .filter_entry(|entry| entry.file_name() != ".git")
            .build();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry while looking for rule files: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(rank) = entry
                .file_name()
                .to_str()
                .and_then(|name| RULE_FILE_NAMES.iter().position(|n| *n == name))
            else {
                continue;
            };
            if let Some(dir) = entry.path().parent() {
                by_dir
                    .entry(dir.to_path_buf())
                    .or_default()
                    .push((rank, entry.path().to_path_buf()));
            }
        }

        let mut layers = Vec::with_capacity(by_dir.len());
        for (dir, mut files) in by_dir {
            files.sort();
            let mut builder = GitignoreBuilder::new(&dir);
            for (_, file) in &files {
                if let Some(err) = builder.add(file) {
                    warn!("Ignoring invalid rules in {}: {}", file.display(), err);
                }
            }
            match builder.build() {
                Ok(gitignore) if gitignore.is_empty() => {}
                Ok(gitignore) => {
                    debug!(
                        "Loaded {} ignore and {} whitelist rule(s) for {}",
                        gitignore.num_ignores(),
                        gitignore.num_whitelists(),
                        dir.display()
                    );
                    layers.push(gitignore);
                }
                Err(err) => warn!("Skipping rule files in {}: {}", dir.display(), err),
            }
        }
        layers.sort_by_key(|layer| layer.path().components().count());

        Self { layers }
    }

    /// Number of directories contributing rules
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Check whether `path` is excluded.
    ///
    /// Paths outside the root never match. A path is also excluded when one
    /// of its parent directories is.
    pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
        for layer in self.layers.iter().rev() {
            let layer_root = layer.path();
            if path == layer_root || !path.starts_with(layer_root) {
                continue;
            }
            match layer.matched_path_or_any_parents(path, is_dir) {
                Match::Ignore(_) => return true,
                Match::Whitelist(_) => return false,
                Match::None => {}
            }
        }
        false
    }
}
