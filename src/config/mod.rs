//! Configuration management
//!
//! Three layers, highest precedence first: explicit command-line flags, the
//! project's `circdeploy.toml`, built-in defaults.

use crate::types::DeployError;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up in the source root when `--config` is not given
pub const CONFIG_FILE_NAME: &str = "circdeploy.toml";

/// Deploy the current CircuitPython project
///
/// All .py and .pyc files in the source tree are copied to the destination
/// (device). All other .py and .pyc files in the destination tree are deleted,
/// except those under /lib/.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "circdeploy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Deploy from this location [default: current directory]
    #[arg(short = 's', long = "source", visible_alias = "src", value_name = "PATH")]
    pub source: Option<PathBuf>,

    /// Deploy to this location [default: device path automatically detected]
    #[arg(
        short = 'd',
        long = "destination",
        visible_alias = "dest",
        value_name = "PATH"
    )]
    pub destination: Option<PathBuf>,

    /// Ignore files using .gitignore files relative to source path [default]
    #[arg(long = "use-gitignore", overrides_with = "no_gitignore")]
    pub use_gitignore: bool,

    /// Deploy files even if .gitignore rules exclude them
    #[arg(long = "no-gitignore", overrides_with = "use_gitignore")]
    pub no_gitignore: bool,

    /// Delete stale .py/.pyc files in destination [default]
    #[arg(long = "delete", overrides_with = "no_delete")]
    pub delete: bool,

    /// Only copy; never delete anything in destination
    #[arg(long = "no-delete", overrides_with = "delete")]
    pub no_delete: bool,

    /// Don't copy files, only output what would be done
    #[arg(long)]
    pub dry_run: bool,

    /// Print the final report as JSON instead of action lines
    #[arg(long)]
    pub json: bool,

    /// Read settings from this file instead of <source>/circdeploy.toml
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// `Some(true)` / `Some(false)` when one of the flags was given
    fn gitignore_flag(&self) -> Option<bool> {
        flag_pair(self.use_gitignore, self.no_gitignore)
    }

    fn delete_flag(&self) -> Option<bool> {
        flag_pair(self.delete, self.no_delete)
    }
}

fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Contents of `circdeploy.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Destination root; relative paths are resolved against the source root
    pub destination: Option<PathBuf>,

    pub use_gitignore: Option<bool>,

    pub delete: Option<bool>,
}

impl FileConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let content = fs::read_to_string(path).map_err(|e| {
            DeployError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| DeployError::Config(format!("Invalid {}: {}", path.display(), e)))
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load `<source>/circdeploy.toml` if it exists
    pub fn discover(source: &Path) -> Result<Option<Self>, DeployError> {
        let candidate = source.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Runtime configuration for one deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Source directory (not yet resolved)
    pub source: PathBuf,

    /// Destination directory; None = auto-detect the device
    pub destination: Option<PathBuf>,

    /// Build layered ignore rules from the source tree
    pub use_gitignore: bool,

    /// Run the delete phase
    pub delete: bool,

    /// Dry run (report, don't execute)
    pub dry_run: bool,

    /// Emit a JSON report
    pub json: bool,

    /// Debug logging
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::from("."),
            destination: None,
            use_gitignore: true,
            delete: true,
            dry_run: false,
            json: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Merge command-line flags over an optional config file
    pub fn merge(cli: &Cli, file: Option<FileConfig>) -> Self {
        let defaults = Config::default();
        let file = file.unwrap_or_default();
        let source = cli.source.clone().unwrap_or(defaults.source);

        let destination = cli.destination.clone().or_else(|| {
            file.destination.map(|dest| {
                if dest.is_relative() {
                    source.join(dest)
                } else {
                    dest
                }
            })
        });

        Self {
            destination,
            use_gitignore: cli
                .gitignore_flag()
                .or(file.use_gitignore)
                .unwrap_or(defaults.use_gitignore),
            delete: cli.delete_flag().or(file.delete).unwrap_or(defaults.delete),
            dry_run: cli.dry_run,
            json: cli.json,
            verbose: cli.verbose,
            source,
        }
    }
}

impl TryFrom<Cli> for Config {
    type Error = DeployError;

    /// Load the config file (explicit or discovered) and merge it with `cli`
    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let source = cli.source.clone().unwrap_or_else(|| PathBuf::from("."));
        let file = match &cli.config {
            Some(path) => Some(FileConfig::load(path)?),
            None => FileConfig::discover(&source)?,
        };
        Ok(Config::merge(&cli, file))
    }
}
