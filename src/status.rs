//! Per-repository status checks, run concurrently over the worker pool.

use crossbeam_channel::Sender;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::error::GitError;
use crate::git::{parse_ahead_count, parse_porcelain, GitPort};
use crate::pool::{Collector, WorkerPool};
use crate::scan::RepositoryRef;

/// Pending work found in one repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoStatus {
    pub untracked: Vec<String>,
    pub modified: Vec<String>,
    /// Commits on the local branch that its upstream does not have
    pub ahead: u32,
}

impl RepoStatus {
    pub fn is_clean(&self) -> bool {
        self.untracked.is_empty() && self.modified.is_empty() && self.ahead == 0
    }
}

/// Result of checking one repository
#[derive(Debug, Clone, PartialEq)]
pub enum RepoOutcome {
    Known(RepoStatus),
    /// git could not be run for this repository
    Unknown { reason: String },
}

impl RepoOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, RepoOutcome::Known(status) if status.is_clean())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepoReport {
    pub repo: RepositoryRef,
    pub outcome: RepoOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Checked {
        repo: RepositoryRef,
        done: usize,
        total: usize,
    },
    Completed {
        total: usize,
    },
}

/// Query git for the state of one repository.
///
/// Only a failure of the porcelain status query is an error. Upstream and
/// ahead-count problems fall back to an ahead count of zero.
pub fn read_status(git: &dyn GitPort, repo: &Path) -> Result<RepoStatus, GitError> {
    let files = parse_porcelain(&git.status_porcelain(repo)?);
    let ahead = ahead_of_upstream(git, repo);

    Ok(RepoStatus {
        untracked: files.untracked,
        modified: files.modified,
        ahead,
    })
}

fn ahead_of_upstream(git: &dyn GitPort, repo: &Path) -> u32 {
    let upstream = match git.upstream(repo) {
        Ok(upstream) => upstream,
        Err(e) => {
            debug!("No upstream for {}: {}", repo.display(), e);
            return 0;
        }
    };

    let upstream = upstream.trim();
    if upstream.is_empty() {
        return 0;
    }

    match git.ahead_count(repo, upstream) {
        Ok(output) => parse_ahead_count(&output),
        Err(e) => {
            debug!(
                "Could not count commits ahead of {} in {}: {}",
                upstream,
                repo.display(),
                e
            );
            0
        }
    }
}

/// Check every repository and return one report per input, in no particular order
pub fn compute_statuses(
    repositories: Vec<RepositoryRef>,
    git: &dyn GitPort,
    pool: &WorkerPool,
) -> Vec<RepoReport> {
    check_all(repositories, git, pool, None)
}

/// Like [`compute_statuses`], sending a [`StatusEvent`] as each check finishes.
///
/// A dropped receiver does not stop the checks.
pub fn compute_statuses_with_events(
    repositories: Vec<RepositoryRef>,
    git: &dyn GitPort,
    pool: &WorkerPool,
    sender: Sender<StatusEvent>,
) -> Vec<RepoReport> {
    check_all(repositories, git, pool, Some(&sender))
}

fn check_all(
    repositories: Vec<RepositoryRef>,
    git: &dyn GitPort,
    pool: &WorkerPool,
    sender: Option<&Sender<StatusEvent>>,
) -> Vec<RepoReport> {
    let total = repositories.len();
    info!("Checking status of {} repositories", total);

    let reports = Collector::with_capacity(total);
    // Kept apart from the results lock so progress never waits on it
    let completed = AtomicUsize::new(0);

    pool.scope(|s| {
        for repo in repositories {
            let reports = &reports;
            let completed = &completed;
            s.spawn(move |_| {
                let outcome = match read_status(git, repo.path()) {
                    Ok(status) => RepoOutcome::Known(status),
                    Err(e) => {
                        warn!("Status unknown for {}: {}", repo, e);
                        RepoOutcome::Unknown {
                            reason: e.to_string(),
                        }
                    }
                };

                let event_repo = sender.map(|_| repo.clone());
                reports.push(RepoReport { repo, outcome });
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;

                if let (Some(tx), Some(repo)) = (sender, event_repo) {
                    let _ = tx.send(StatusEvent::Checked { repo, done, total });
                }
            });
        }
    });

    if let Some(tx) = sender {
        let _ = tx.send(StatusEvent::Completed { total });
    }

    reports.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::io;
    use std::path::PathBuf;

    #[derive(Clone, Default)]
    struct FakeRepo {
        porcelain: String,
        upstream: String,
        ahead: String,
        status_fails: bool,
        upstream_fails: bool,
    }

    #[derive(Default)]
    struct FakeGit {
        repos: HashMap<PathBuf, FakeRepo>,
    }

    impl FakeGit {
        fn with(mut self, path: &str, repo: FakeRepo) -> Self {
            self.repos.insert(PathBuf::from(path), repo);
            self
        }

        fn get(&self, repo: &Path) -> FakeRepo {
            self.repos.get(repo).cloned().unwrap_or_default()
        }
    }

    fn spawn_error(repo: &Path) -> GitError {
        GitError::Spawn {
            path: repo.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "no git"),
        }
    }

    impl GitPort for FakeGit {
        fn status_porcelain(&self, repo: &Path) -> Result<String, GitError> {
            let fake = self.get(repo);
            if fake.status_fails {
                return Err(spawn_error(repo));
            }
            Ok(fake.porcelain)
        }

        fn upstream(&self, repo: &Path) -> Result<String, GitError> {
            let fake = self.get(repo);
            if fake.upstream_fails {
                return Err(spawn_error(repo));
            }
            Ok(fake.upstream)
        }

        fn ahead_count(&self, repo: &Path, _upstream: &str) -> Result<String, GitError> {
            Ok(self.get(repo).ahead)
        }
    }

    #[test]
    fn test_clean_repository() {
        let git = FakeGit::default().with("/r", FakeRepo::default());
        let status = read_status(&git, Path::new("/r")).unwrap();
        assert!(status.is_clean());
        assert_eq!(status, RepoStatus::default());
    }

    #[test]
    fn test_untracked_and_modified() {
        let git = FakeGit::default().with(
            "/r",
            FakeRepo {
                porcelain: "?? a.txt\0 M b.txt\0".to_string(),
                ..FakeRepo::default()
            },
        );
        let status = read_status(&git, Path::new("/r")).unwrap();
        assert_eq!(status.untracked, vec!["a.txt"]);
        assert_eq!(status.modified, vec!["b.txt"]);
        assert_eq!(status.ahead, 0);
        assert!(!status.is_clean());
    }

    #[test]
    fn test_ahead_of_upstream() {
        let git = FakeGit::default().with(
            "/r",
            FakeRepo {
                upstream: "origin/main\n".to_string(),
                ahead: "3\n".to_string(),
                ..FakeRepo::default()
            },
        );
        let status = read_status(&git, Path::new("/r")).unwrap();
        assert_eq!(status.ahead, 3);
        assert!(!status.is_clean());
    }

    #[test]
    fn test_no_upstream_means_zero_ahead() {
        let git = FakeGit::default().with(
            "/r",
            FakeRepo {
                ahead: "7".to_string(),
                ..FakeRepo::default()
            },
        );
        assert_eq!(read_status(&git, Path::new("/r")).unwrap().ahead, 0);
    }

    #[test]
    fn test_upstream_failure_means_zero_ahead() {
        let git = FakeGit::default().with(
            "/r",
            FakeRepo {
                upstream_fails: true,
                ahead: "7".to_string(),
                ..FakeRepo::default()
            },
        );
        assert_eq!(read_status(&git, Path::new("/r")).unwrap().ahead, 0);
    }

    #[test]
    fn test_malformed_ahead_count_means_zero() {
        let git = FakeGit::default().with(
            "/r",
            FakeRepo {
                upstream: "origin/main".to_string(),
                ahead: "fatal: bad revision".to_string(),
                ..FakeRepo::default()
            },
        );
        assert_eq!(read_status(&git, Path::new("/r")).unwrap().ahead, 0);
    }

    #[test]
    fn test_status_failure_is_reported_as_unknown() -> anyhow::Result<()> {
        let git = FakeGit::default()
            .with("/ok", FakeRepo::default())
            .with(
                "/broken",
                FakeRepo {
                    status_fails: true,
                    ..FakeRepo::default()
                },
            );
        let pool = WorkerPool::new(Some(2))?;
        let repos = vec![RepositoryRef::new("/ok"), RepositoryRef::new("/broken")];

        let reports = compute_statuses(repos, &git, &pool);
        assert_eq!(reports.len(), 2, "A failed lookup must not drop the repository");

        let broken = reports
            .iter()
            .find(|r| r.repo.path() == Path::new("/broken"))
            .unwrap();
        assert!(matches!(broken.outcome, RepoOutcome::Unknown { .. }));
        assert!(!broken.outcome.is_clean());

        let ok = reports
            .iter()
            .find(|r| r.repo.path() == Path::new("/ok"))
            .unwrap();
        assert!(ok.outcome.is_clean());
        Ok(())
    }

    #[test]
    fn test_every_repository_reported_once_for_any_pool_size() -> anyhow::Result<()> {
        const N: usize = 12;
        let mut git = FakeGit::default();
        for i in 0..N {
            git = git.with(
                &format!("/repos/r{}", i),
                FakeRepo {
                    porcelain: if i % 2 == 0 { "?? x\0".to_string() } else { String::new() },
                    ..FakeRepo::default()
                },
            );
        }

        let expected: BTreeSet<PathBuf> = (0..N)
            .map(|i| PathBuf::from(format!("/repos/r{}", i)))
            .collect();

        for threads in 1..=N {
            let pool = WorkerPool::new(Some(threads))?;
            let repos = expected.iter().map(RepositoryRef::new).collect();

            let reports = compute_statuses(repos, &git, &pool);
            let seen: BTreeSet<PathBuf> = reports
                .iter()
                .map(|r| r.repo.path().to_path_buf())
                .collect();

            assert_eq!(reports.len(), N, "pool size {}", threads);
            assert_eq!(seen, expected, "pool size {}", threads);
            assert_eq!(
                reports.iter().filter(|r| r.outcome.is_clean()).count(),
                N / 2
            );
        }
        Ok(())
    }

    #[test]
    fn test_progress_events() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let pool = WorkerPool::new(Some(3))?;
        let repos: Vec<_> = (0..5)
            .map(|i| RepositoryRef::new(format!("/r{}", i)))
            .collect();
        let (tx, rx) = crossbeam_channel::unbounded();

        let reports = compute_statuses_with_events(repos, &git, &pool, tx);
        assert_eq!(reports.len(), 5);

        let events: Vec<StatusEvent> = rx.iter().collect();
        assert_eq!(events.len(), 6);
        assert_eq!(events.last(), Some(&StatusEvent::Completed { total: 5 }));

        let mut done: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Checked { done, total, .. } => {
                    assert_eq!(*total, 5);
                    Some(*done)
                }
                StatusEvent::Completed { .. } => None,
            })
            .collect();
        done.sort_unstable();
        assert_eq!(done, vec![1, 2, 3, 4, 5]);
        Ok(())
    }

    #[test]
    fn test_dropped_receiver_does_not_stop_checks() -> anyhow::Result<()> {
        let git = FakeGit::default();
        let pool = WorkerPool::new(Some(2))?;
        let repos: Vec<_> = (0..4)
            .map(|i| RepositoryRef::new(format!("/r{}", i)))
            .collect();
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);

        let reports = compute_statuses_with_events(repos, &git, &pool, tx);
        assert_eq!(reports.len(), 4);
        Ok(())
    }

    #[test]
    fn test_empty_input() -> anyhow::Result<()> {
        let pool = WorkerPool::new(Some(1))?;
        let reports = compute_statuses(Vec::new(), &FakeGit::default(), &pool);
        assert!(reports.is_empty());
        Ok(())
    }
}
