use crossbeam_channel::Sender;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{Config, ScanConfig};
use crate::error::Result;
use crate::git::{GitCli, GitPort};
use crate::pool::WorkerPool;
use crate::report::ScanResult;
use crate::scan;
use crate::status::{self, StatusEvent};

/// Runs discovery, then status checks, on one shared worker pool
pub struct App {
    scan: ScanConfig,
    jobs: Option<usize>,
    git: Box<dyn GitPort>,
}

impl App {
    pub fn new(scan: ScanConfig) -> App {
        App {
            scan,
            jobs: None,
            git: Box::new(GitCli::new()),
        }
    }

    pub fn from_config(config: &Config) -> App {
        App::new(config.to_scan_config()).with_jobs(config.jobs)
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> App {
        self.jobs = jobs;
        self
    }

    /// Replace the `git` executable backend
    pub fn with_git(mut self, git: Box<dyn GitPort>) -> App {
        self.git = git;
        self
    }

    pub fn scan_config(&self) -> &ScanConfig {
        &self.scan
    }

    pub fn run(&self) -> Result<ScanResult> {
        self.run_inner(None)
    }

    /// Run and report each finished status check on `sender`
    pub fn run_with_events(&self, sender: Sender<StatusEvent>) -> Result<ScanResult> {
        self.run_inner(Some(sender))
    }

    fn run_inner(&self, sender: Option<Sender<StatusEvent>>) -> Result<ScanResult> {
        let started = Instant::now();
        let pool = WorkerPool::new(self.jobs)?;
        debug!("Scanning {} with {} workers", self.scan.root.display(), pool.threads());

        // Discovery is fully joined before any status check starts
        let repos = scan::find_repos_with_pool(&self.scan, &pool)?;

        let git = self.git.as_ref();
        let reports = match sender {
            Some(tx) => status::compute_statuses_with_events(repos, git, &pool, tx),
            None => status::compute_statuses(repos, git, &pool),
        };

        let result = ScanResult::new(self.scan.root.clone(), reports);
        info!(
            "Scan of {} finished in {:.2?}: {} clean, {} dirty, {} unknown",
            self.scan.root.display(),
            started.elapsed(),
            result.clean(),
            result.dirty(),
            result.unknown()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GitError, ScanError};
    use crate::report::Completion;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Reports every repository as having one untracked file
    struct AlwaysDirty;

    impl GitPort for AlwaysDirty {
        fn status_porcelain(&self, _repo: &Path) -> std::result::Result<String, GitError> {
            Ok("?? scratch.txt\0".to_string())
        }

        fn upstream(&self, _repo: &Path) -> std::result::Result<String, GitError> {
            Ok(String::new())
        }

        fn ahead_count(
            &self,
            _repo: &Path,
            _upstream: &str,
        ) -> std::result::Result<String, GitError> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_app_from_config() {
        let config = Config {
            max_depth: Some(2),
            jobs: Some(3),
            ignore: vec!["archive".to_string()],
            ..Config::default()
        };

        let app = App::from_config(&config);
        assert_eq!(app.scan_config().max_depth, Some(2));
        assert_eq!(app.jobs, Some(3));
        assert!(app.scan_config().ignore.iter().any(|p| p == "archive"));
    }

    #[test]
    fn test_run_empty_root() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let result = App::new(ScanConfig::new(temp_dir.path()))
            .with_git(Box::new(AlwaysDirty))
            .run()?;

        assert_eq!(result.total(), 0);
        assert_eq!(result.completion(), Completion::NoRepositories);
        Ok(())
    }

    #[test]
    fn test_run_checks_every_discovered_repository() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        for name in ["a", "b/c", "d/e/f"] {
            fs::create_dir_all(temp_dir.path().join(name).join(".git"))?;
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let result = App::new(ScanConfig::new(temp_dir.path()))
            .with_jobs(Some(2))
            .with_git(Box::new(AlwaysDirty))
            .run_with_events(tx)?;

        assert_eq!(result.total(), 3);
        assert_eq!(result.dirty(), 3);
        assert_eq!(rx.iter().count(), 4);
        Ok(())
    }

    #[test]
    fn test_run_propagates_scan_errors() {
        let app = App::new(ScanConfig::new("/definitely/not/a/real/path/for/gitsweep"));
        assert!(matches!(app.run(), Err(ScanError::ReadDir { .. })));
    }
}
