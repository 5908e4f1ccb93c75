//! Repository discovery.
//!
//! The walk fans out over the worker pool one directory per unit of work.
//! A directory holding a `.git` entry is reported and never entered, so
//! repositories are the leaves of the walk and no reported path can sit
//! inside another one.

use rayon::Scope;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, trace};

use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::pool::{Collector, WorkerPool};

/// Entry whose presence marks a repository root
pub const GIT_MARKER: &str = ".git";

/// A discovered repository root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryRef {
    path: PathBuf,
}

impl RepositoryRef {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or(self.path.as_os_str())
            .to_string_lossy()
            .to_string()
    }

    /// Path relative to `base`, or the full path when it is not below `base`
    pub fn display_path(&self, base: &Path) -> String {
        match self.path.strip_prefix(base) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => self.path.display().to_string(),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// True when `dir` directly contains a `.git` entry (directory or file)
pub fn is_repository(dir: &Path) -> bool {
    fs::symlink_metadata(dir.join(GIT_MARKER)).is_ok()
}

/// Discover repositories below `config.root` using an existing pool.
///
/// The result is unordered. The first error other than a permission
/// denial aborts the walk and nothing collected so far is returned.
pub fn find_repos_with_pool(config: &ScanConfig, pool: &WorkerPool) -> Result<Vec<RepositoryRef>> {
    let root = &config.root;
    if let Ok(meta) = fs::metadata(root) {
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory { path: root.clone() });
        }
    }

    info!(
        "Discovering repositories under {} (max depth: {:?})",
        root.display(),
        config.max_depth
    );

    let walker = Walker {
        config,
        found: Collector::new(),
        failure: Mutex::new(None),
        aborted: AtomicBool::new(false),
    };

    pool.scope(|s| walker.visit(s, root.clone(), 0));

    let Walker { found, failure, .. } = walker;
    if let Some(err) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
        return Err(err);
    }

    let repos = found.into_inner();
    info!("Discovery finished: {} repositories", repos.len());
    Ok(repos)
}

struct Walker<'a> {
    config: &'a ScanConfig,
    found: Collector<RepositoryRef>,
    failure: Mutex<Option<ScanError>>,
    aborted: AtomicBool,
}

impl Walker<'_> {
    fn visit<'scope>(&'scope self, s: &Scope<'scope>, dir: PathBuf, depth: u32) {
        if self.aborted.load(Ordering::Relaxed) {
            return;
        }

        if let Some(max) = self.config.max_depth {
            if depth > max {
                return;
            }
        }

        if self.config.is_ignored(&dir) {
            trace!("Ignoring {}", dir.display());
            return;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) => {
                if let Some(err) = read_dir_failure(dir, source) {
                    self.fail(err);
                }
                return;
            }
        };

        if is_repository(&dir) {
            debug!("Found repository at {}", dir.display());
            self.found.push(RepositoryRef::new(dir));
            return;
        }

        let mut children = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    self.fail(ScanError::ReadDir { path: dir, source });
                    return;
                }
            };

            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            // file_type() does not follow symlinks, which keeps the walk acyclic
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => children.push(entry.path()),
                Ok(_) => {}
                Err(source) => {
                    self.fail(ScanError::ReadDir {
                        path: entry.path(),
                        source,
                    });
                    return;
                }
            }
        }

        for child in children {
            s.spawn(move |s| self.visit(s, child, depth + 1));
        }
    }

    fn fail(&self, err: ScanError) {
        self.aborted.store(true, Ordering::Relaxed);
        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}

/// Map a failed directory read to the error that ends the walk.
///
/// A directory the process may not read is skipped, so this yields `None`.
fn read_dir_failure(path: PathBuf, source: io::Error) -> Option<ScanError> {
    if source.kind() == ErrorKind::PermissionDenied {
        debug!("Skipping {}: permission denied", path.display());
        return None;
    }
    Some(ScanError::ReadDir { path, source })
}
