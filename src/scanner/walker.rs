//! Iterative tree walker shared by the copy and delete phases

use crate::rules::RuleEvaluator;
use crate::types::{DeployError, FileEntry};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extensions that are deployed (compared case-insensitively)
pub const DEPLOYABLE_EXTENSIONS: [&str; 2] = ["py", "pyc"];

/// Callback for reporting scan progress
///
/// Arguments:
/// - `files_collected`: Number of matching files collected so far
pub type ProgressCallback<'a> = dyn Fn(u64) + 'a;

/// Absolute paths that must never be collected, compared by resolved identity
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    paths: HashSet<PathBuf>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path. Paths that do not exist yet are stored as given.
    pub fn insert(&mut self, path: &Path) {
        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.paths.insert(resolved);
    }

    pub fn contains(&self, resolved: &Path) -> bool {
        self.paths.contains(resolved)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Inclusion predicates applied to every child during traversal
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanFilter<'a> {
    rules: Option<&'a RuleEvaluator>,
    exclusions: Option<&'a ExclusionSet>,
}

impl<'a> ScanFilter<'a> {
    /// Filter with no rules and no exclusions
    pub fn new() -> Self {
        Self::default()
    }

    /// Query `rules` for each child at its real path in the walked tree.
    /// Paths outside the rules' root are never matched.
    pub fn with_rules(mut self, rules: Option<&'a RuleEvaluator>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_exclusions(mut self, exclusions: &'a ExclusionSet) -> Self {
        self.exclusions = Some(exclusions);
        self
    }

    /// Decide whether a file is collected.
    ///
    /// `resolved` is the symlink-resolved path, `path` the child as it was
    /// reached in the walk.
    pub fn include_file(&self, resolved: &Path, path: &Path) -> bool {
        self.passes_common(resolved, path, false) && has_deployable_extension(path)
    }

    /// Decide whether a directory is descended into.
    pub fn include_dir(&self, resolved: &Path, path: &Path) -> bool {
        self.passes_common(resolved, path, true)
    }

    fn passes_common(&self, resolved: &Path, path: &Path, is_dir: bool) -> bool {
        if self.exclusions.is_some_and(|set| set.contains(resolved)) {
            return false;
        }

        if self.rules.is_some_and(|rules| rules.matches(path, is_dir)) {
            return false;
        }

        !is_hidden(path)
    }
}

/// Names starting with `.` are hidden
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// True for `.py` / `.pyc` in any letter case
pub fn has_deployable_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DEPLOYABLE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Collect every matching file beneath `root`
///
/// Depth-first traversal driven by an explicit stack. Directories rejected by
/// the filter are pruned without being listed. The result is ordered by
/// relative path.
///
/// # Arguments
/// * `root` - Directory to walk (should already be canonical)
/// * `filter` - Inclusion predicates (rules, exclusion set)
/// * `on_progress` - Optional callback invoked for every collected file
///
/// # Errors
/// * `DeployError::Scan` when a directory cannot be listed
/// * Entries whose metadata cannot be read (dangling symlinks) are skipped
///   with a warning
pub fn collect_matching_files(
    root: &Path,
    filter: &ScanFilter<'_>,
    on_progress: Option<&ProgressCallback<'_>>,
) -> Result<Vec<FileEntry>, DeployError> {
    let root_resolved = root.canonicalize().map_err(|source| DeployError::Scan {
        path: root.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    visited.insert(root_resolved.clone());
    let mut stack: Vec<(PathBuf, PathBuf)> = vec![(root_resolved, PathBuf::new())];

    while let Some((dir, dir_relative)) = stack.pop() {
        let listing = fs::read_dir(&dir).map_err(|source| DeployError::Scan {
            path: dir.clone(),
            source,
        })?;

        let mut children = Vec::new();
        for child in listing {
            let child = child.map_err(|source| DeployError::Scan {
                path: dir.clone(),
                source,
            })?;
            children.push(child.file_name());
        }
        children.sort();

        for name in children {
            let child_path = dir.join(&name);
            let relative = dir_relative.join(&name);

            // Follows symlinks, so a link to a file counts as a file
            let metadata = match fs::metadata(&child_path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(
                        "Skipping {}: failed to read metadata ({}). \
                         This is usually a dangling symlink.",
                        child_path.display(),
                        e
                    );
                    continue;
                }
            };

            let resolved = match child_path.canonicalize() {
                Ok(p) => p,
                Err(e) => {
                    warn!("Skipping {}: failed to resolve path ({})", child_path.display(), e);
                    continue;
                }
            };

            if metadata.is_file() {
                if filter.include_file(&resolved, &child_path) {
                    files.push(FileEntry::new(resolved, relative, metadata.len()));
                    if let Some(callback) = on_progress {
                        callback(files.len() as u64);
                    }
                } else {
                    debug!("Skipping file ./{}", relative.display());
                }
            } else if metadata.is_dir() {
                if !filter.include_dir(&resolved, &child_path) {
                    debug!("Pruning directory ./{}", relative.display());
                } else if visited.insert(resolved.clone()) {
                    stack.push((resolved, relative));
                } else {
                    debug!(
                        "Not descending into ./{}: already visited via another path",
                        relative.display()
                    );
                }
            }
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn canonical(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().canonicalize().expect("canonical temp dir")
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, relative).expect("Failed to write file");
    }

    fn relatives(files: &[FileEntry]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.relative.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_extension_filter() {
        assert!(has_deployable_extension(Path::new("code.py")));
        assert!(has_deployable_extension(Path::new("lib/mod.pyc")));
        assert!(has_deployable_extension(Path::new("BOOT.PY")));
        assert!(has_deployable_extension(Path::new("mixed.PyC")));

        assert!(!has_deployable_extension(Path::new("readme.md")));
        assert!(!has_deployable_extension(Path::new("module.mpy")));
        assert!(!has_deployable_extension(Path::new("code.py.part")));
        assert!(!has_deployable_extension(Path::new("code.pyx")));
        assert!(!has_deployable_extension(Path::new("py")));
        assert!(!has_deployable_extension(Path::new("Makefile")));
    }

    #[test]
    fn test_hidden_names() {
        assert!(is_hidden(Path::new(".hidden.py")));
        assert!(is_hidden(Path::new("pkg/.cache")));
        assert!(!is_hidden(Path::new("visible.py")));
        assert!(!is_hidden(Path::new(".hidden/visible.py")));
    }

    #[test]
    fn test_include_file_without_overrides() {
        let filter = ScanFilter::new();
        let resolved = Path::new("/project/code.py");

        assert!(filter.include_file(resolved, Path::new("code.py")));
        assert!(filter.include_file(resolved, Path::new("compiled.pyc")));
        assert!(!filter.include_file(resolved, Path::new("notes.txt")));
        assert!(!filter.include_file(resolved, Path::new(".hidden.py")));
    }

    #[test]
    fn test_exclusion_set_overrides_everything() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = canonical(&temp_dir);
        touch(&root, "keep.py");
        touch(&root, "protected.py");

        let mut exclusions = ExclusionSet::new();
        exclusions.insert(&root.join("protected.py"));
        let filter = ScanFilter::new().with_exclusions(&exclusions);

        assert!(!filter.include_file(&root.join("protected.py"), Path::new("protected.py")));
        assert!(filter.include_file(&root.join("keep.py"), Path::new("keep.py")));
    }

    #[test]
    fn test_exclusion_set_stores_missing_paths_verbatim() {
        let mut exclusions = ExclusionSet::new();
        exclusions.insert(Path::new("/does/not/exist/a.py"));

        assert_eq!(exclusions.len(), 1);
        assert!(exclusions.contains(Path::new("/does/not/exist/a.py")));
    }

    #[test]
    fn test_collect_empty_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let files = collect_matching_files(temp_dir.path(), &ScanFilter::new(), None)
            .expect("collect should succeed");
        assert!(files.is_empty());
    }

    #[test]
    fn test_collect_nested_tree() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = canonical(&temp_dir);
        touch(&root, "code.py");
        touch(&root, "a/b/deep.py");
        touch(&root, "a/helper.pyc");
        touch(&root, "a/data.json");
        touch(&root, "c/readme.md");

        let files = collect_matching_files(&root, &ScanFilter::new(), None)
            .expect("collect should succeed");

        assert_eq!(relatives(&files), vec!["a/b/deep.py", "a/helper.pyc", "code.py"]);
        let deep = &files[0];
        assert_eq!(deep.path, root.join("a/b/deep.py"));
        assert_eq!(deep.size, "a/b/deep.py".len() as u64);
    }

    #[test]
    fn test_hidden_directories_are_pruned() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = canonical(&temp_dir);
        touch(&root, ".venv/site.py");
        touch(&root, ".hidden.py");
        touch(&root, "main.py");

        let files = collect_matching_files(&root, &ScanFilter::new(), None)
            .expect("collect should succeed");
        assert_eq!(relatives(&files), vec!["main.py"]);
    }

    #[test]
    fn test_rules_prune_directories_and_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = canonical(&temp_dir);
        fs::write(root.join(".gitignore"), "tests/\n*.pyc\n").expect("write rules");
        touch(&root, "tests/test_code.py");
        touch(&root, "cache.pyc");
        touch(&root, "code.py");

        let rules = RuleEvaluator::new(&root);
        let filter = ScanFilter::new().with_rules(Some(&rules));
        let files = collect_matching_files(&root, &filter, None).expect("collect should succeed");

        assert_eq!(relatives(&files), vec!["code.py"]);
    }

    #[test]
    fn test_rules_do_not_reach_outside_their_root() {
        let source_dir = TempDir::new().expect("Failed to create source dir");
        let dest_dir = TempDir::new().expect("Failed to create dest dir");
        let source = canonical(&source_dir);
        let dest = canonical(&dest_dir);
        fs::write(source.join(".gitignore"), "settings.py\n*.pyc\n").expect("write rules");
        touch(&dest, "settings.py");
        touch(&dest, "old_module.pyc");
        touch(&dest, "stale.py");

        let rules = RuleEvaluator::new(&source);
        let filter = ScanFilter::new().with_rules(Some(&rules));
        let files = collect_matching_files(&dest, &filter, None).expect("collect should succeed");

        assert_eq!(relatives(&files), vec!["old_module.pyc", "settings.py", "stale.py"]);
    }

    #[test]
    fn test_rules_apply_to_tree_nested_under_their_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = canonical(&temp_dir);
        fs::write(root.join(".gitignore"), "*.pyc\n").expect("write rules");
        touch(&root, "device/cache.pyc");
        touch(&root, "device/code.py");

        let rules = RuleEvaluator::new(&root);
        let filter = ScanFilter::new().with_rules(Some(&rules));
        let files = collect_matching_files(&root.join("device"), &filter, None)
            .expect("collect should succeed");

        assert_eq!(relatives(&files), vec!["code.py"]);
    }

    #[test]
    fn test_excluded_directory_is_not_walked() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = canonical(&temp_dir);
        touch(&root, "lib/driver.py");
        touch(&root, "old.py");

        let mut exclusions = ExclusionSet::new();
        exclusions.insert(&root.join("lib"));
        let filter = ScanFilter::new().with_exclusions(&exclusions);
        let files = collect_matching_files(&root, &filter, None).expect("collect should succeed");

        assert_eq!(relatives(&files), vec!["old.py"]);
    }

    #[test]
    fn test_missing_root_is_scan_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let missing = temp_dir.path().join("nope");

        let result = collect_matching_files(&missing, &ScanFilter::new(), None);
        assert!(matches!(result, Err(DeployError::Scan { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn test_dangling_symlink_is_skipped() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = canonical(&temp_dir);
        touch(&root, "code.py");
        std::os::unix::fs::symlink(root.join("missing.py"), root.join("broken.py"))
            .expect("Failed to create symlink");

        let files = collect_matching_files(&root, &ScanFilter::new(), None)
            .expect("collect should succeed");
        assert_eq!(relatives(&files), vec!["code.py"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_cycle_terminates() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = canonical(&temp_dir);
        touch(&root, "pkg/mod.py");
        std::os::unix::fs::symlink(&root, root.join("pkg/loop")).expect("create loop");

        let files = collect_matching_files(&root, &ScanFilter::new(), None)
            .expect("collect should succeed");
        assert_eq!(relatives(&files), vec!["pkg/mod.py"]);
    }

    #[test]
    fn test_progress_callback() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = canonical(&temp_dir);
        for i in 1..=4 {
            touch(&root, &format!("m{}.py", i));
        }
        touch(&root, "ignored.txt");

        let call_count = Cell::new(0u64);
        let callback = |files: u64| {
            assert_eq!(files, call_count.get() + 1, "File count should grow by one");
            call_count.set(files);
        };

        let files = collect_matching_files(&root, &ScanFilter::new(), Some(&callback))
            .expect("collect should succeed");

        assert_eq!(files.len(), 4);
        assert_eq!(call_count.get(), 4);
    }
}
