use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort repository discovery
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan root is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors raised while invoking the external `git` command
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to run git in {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read git output in {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git output in {path} exceeded {limit} bytes")]
    OutputTooLarge { path: PathBuf, limit: usize },
}

pub type Result<T> = std::result::Result<T, ScanError>;
