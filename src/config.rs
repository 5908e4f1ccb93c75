use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::CliArgs;

/// Build and dependency directories that are never scanned
pub const DEFAULT_IGNORES: &[&str] = &[
    "node_modules",
    "vendor",
    "target",
    "build",
    "dist",
    "__pycache__",
    "venv",
    "zig-cache",
    "zig-out",
];

/// Settings for one discovery pass. Read concurrently by every worker and
/// never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub max_depth: Option<u32>,
    pub ignore: Vec<String>,
}

impl ScanConfig {
    /// Scan `root` with the default ignore set and no depth limit
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            max_depth: None,
            ignore: DEFAULT_IGNORES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: Option<u32>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Add patterns on top of the ones already present
    pub fn with_ignores<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pattern in patterns {
            let pattern = pattern.into();
            if !pattern.is_empty() && !self.ignore.contains(&pattern) {
                self.ignore.push(pattern);
            }
        }
        self
    }

    /// True when the final component of `path` equals one of the patterns
    pub fn is_ignored(&self, path: &Path) -> bool {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => self.ignore.iter().any(|p| p == name),
            None => false,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub color: bool,
    #[serde(default = "default_true")]
    pub show_files: bool,
}

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            root: None,
            max_depth: None,
            ignore: Vec::new(),
            jobs: None,
            output: OutputConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            show_files: true,
        }
    }
}

pub fn get_default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "gitsweep")
        .context("Failed to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    Ok(config_dir.join("gitsweep.toml"))
}

/// Expand a leading `~` to the user's home directory
fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path,
        },
        Err(_) => path,
    }
}

impl Config {
    /// Load the config file. A missing file yields the defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p,
            None => get_default_config_path()?,
        };

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.root = config.root.map(expand_home);
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_depth == Some(0) {
            bail!("max_depth must be a positive integer");
        }
        Ok(())
    }

    pub fn from_cli_and_file(cli_args: &CliArgs) -> Result<Self> {
        let mut config = Self::load(cli_args.config.clone())?;

        // CLI args override config file
        if let Some(root) = &cli_args.root {
            config.root = Some(root.clone());
        }
        if let Some(depth) = cli_args.max_depth {
            config.max_depth = Some(depth);
        }
        if let Some(jobs) = cli_args.jobs {
            config.jobs = Some(jobs);
        }
        config.ignore.extend(cli_args.ignore.iter().cloned());
        if cli_args.no_color {
            config.output.color = false;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn to_scan_config(&self) -> ScanConfig {
        ScanConfig::new(self.root())
            .with_max_depth(self.max_depth)
            .with_ignores(self.ignore.iter().cloned())
    }
}
