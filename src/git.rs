//! Access to the external `git` command.
//!
//! Everything the status engine knows about a repository comes from the
//! text `git` prints. A non-zero exit is reported as empty output; only a
//! failure to run the command at all (or runaway output) is an error.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

use crate::error::GitError;

/// Capture bound for `git status` output
pub const STATUS_OUTPUT_LIMIT: usize = 32 * 1024 * 1024;
/// Capture bound for the upstream and ahead-count queries
pub const REF_OUTPUT_LIMIT: usize = 1024 * 1024;

const STATUS_ARGS: &[&str] = &["status", "--porcelain", "-z"];
const UPSTREAM_ARGS: &[&str] = &[
    "rev-parse",
    "--abbrev-ref",
    "--symbolic-full-name",
    "@{upstream}",
];

/// Variables that would point git at a repository other than the working directory
const REPOSITORY_ENV: &[&str] = &[
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
    "GIT_OBJECT_DIRECTORY",
    "GIT_ALTERNATE_OBJECT_DIRECTORIES",
    "GIT_NAMESPACE",
];

/// Port for the three queries the status engine needs
pub trait GitPort: Send + Sync {
    /// Output of `git status --porcelain -z`
    fn status_porcelain(&self, repo: &Path) -> Result<String, GitError>;

    /// Upstream of the current branch, empty when none is configured
    fn upstream(&self, repo: &Path) -> Result<String, GitError>;

    /// Raw output of counting commits in `upstream..HEAD`
    fn ahead_count(&self, repo: &Path, upstream: &str) -> Result<String, GitError>;
}

/// `GitPort` backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use a specific executable instead of `git` from `PATH`
    pub fn with_program<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command scoped to `repo` alone, whatever the caller's environment says
    fn command(&self, repo: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).current_dir(repo);
        for var in REPOSITORY_ENV {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Run one git command in `repo`, capturing at most `limit` bytes of stdout
    pub fn run(&self, repo: &Path, args: &[&str], limit: usize) -> Result<String, GitError> {
        trace!("git {} in {}", args.join(" "), repo.display());

        let mut child = self
            .command(repo, args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| GitError::Spawn {
                path: repo.to_path_buf(),
                source,
            })?;

        let io_error = |source| GitError::Io {
            path: repo.to_path_buf(),
            source,
        };

        let mut buf = Vec::new();
        let read = match child.stdout.take() {
            Some(mut stdout) => stdout
                .by_ref()
                .take(limit as u64 + 1)
                .read_to_end(&mut buf)
                .map(|_| ()),
            None => Err(std::io::Error::other("stdout was not captured")),
        };

        if let Err(source) = read {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io_error(source));
        }

        if buf.len() > limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(GitError::OutputTooLarge {
                path: repo.to_path_buf(),
                limit,
            });
        }

        let status = child.wait().map_err(io_error)?;
        if !status.success() {
            debug!(
                "git {} exited with {} in {}",
                args.join(" "),
                status,
                repo.display()
            );
            return Ok(String::new());
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitPort for GitCli {
    fn status_porcelain(&self, repo: &Path) -> Result<String, GitError> {
        self.run(repo, STATUS_ARGS, STATUS_OUTPUT_LIMIT)
    }

    fn upstream(&self, repo: &Path) -> Result<String, GitError> {
        Ok(self.run(repo, UPSTREAM_ARGS, REF_OUTPUT_LIMIT)?.trim().to_string())
    }

    fn ahead_count(&self, repo: &Path, upstream: &str) -> Result<String, GitError> {
        let range = format!("{}..HEAD", upstream);
        self.run(repo, &["rev-list", "--count", &range], REF_OUTPUT_LIMIT)
    }
}

/// Files reported by `git status --porcelain -z`, in the order git printed them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PorcelainStatus {
    pub untracked: Vec<String>,
    pub modified: Vec<String>,
}

/// Split NUL-separated porcelain output into untracked and modified paths.
///
/// `??` is untracked; any other code with a non-blank column counts as
/// modified, whether the change is staged, unstaged, added, deleted,
/// renamed or copied. Paths arrive unquoted. A rename or copy entry names
/// its destination and is followed by a field holding the source path,
/// which is skipped.
pub fn parse_porcelain(output: &str) -> PorcelainStatus {
    let mut status = PorcelainStatus::default();
    let mut fields = output.split('\0');

    while let Some(entry) = fields.next() {
        if entry.len() < 4 {
            continue;
        }
        let (Some(code), Some(path)) = (entry.get(..2), entry.get(3..)) else {
            continue;
        };

        if code.contains(|c| c == 'R' || c == 'C') {
            fields.next();
        }
        if path.trim().is_empty() {
            continue;
        }

        if code == "??" {
            status.untracked.push(path.to_string());
        } else if code.chars().any(|c| c != ' ') {
            status.modified.push(path.to_string());
        }
    }

    status
}

/// Parse the ahead count; anything unparsable counts as zero
pub fn parse_ahead_count(output: &str) -> u32 {
    output.trim().parse().unwrap_or(0)
}
