//! Shared fixtures for integration tests
#![allow(dead_code)]

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;

/// Tests that shell out to `git` skip themselves when this is false
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Write `name`, stage it and commit on top of HEAD
pub fn commit_file(
    repo: &git2::Repository,
    name: &str,
    content: &str,
    message: &str,
) -> Result<git2::Oid> {
    let workdir = repo.workdir().context("Repository has no working directory")?;
    fs::write(workdir.join(name), content)?;

    let mut index = repo.index()?;
    index.add_path(Path::new(name))?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let signature = git2::Signature::now("Test User", "test@example.com")?;
    let parents = match repo.head() {
        Ok(head) => vec![head.peel_to_commit()?],
        Err(_) => Vec::new(),
    };
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)?;
    Ok(oid)
}

/// A repository with a single committed README and a clean working tree
pub fn create_test_git_repo(path: &Path) -> Result<git2::Repository> {
    fs::create_dir_all(path)?;
    let repo = git2::Repository::init(path)?;
    commit_file(&repo, "README.md", "# test\n", "Initial commit")?;
    Ok(repo)
}

/// Point the current branch at a fake `origin/main` sitting on HEAD
pub fn track_fake_upstream(repo: &git2::Repository) -> Result<()> {
    let head = repo.head()?.peel_to_commit()?;
    repo.remote("origin", "https://example.invalid/test.git")?;
    repo.reference("refs/remotes/origin/main", head.id(), true, "fake upstream")?;

    let branch_name = repo
        .head()?
        .shorthand()
        .context("HEAD is not on a branch")?
        .to_string();
    let mut branch = repo.find_branch(&branch_name, git2::BranchType::Local)?;
    branch.set_upstream(Some("origin/main"))?;
    Ok(())
}

/// Plain directory with an empty `.git` directory; enough for discovery
pub fn create_fake_repo(path: &Path) -> Result<()> {
    fs::create_dir_all(path.join(".git"))?;
    Ok(())
}
