//! gitsweep library
//!
//! Finds Git repositories below a directory and reports which of them have
//! untracked files, uncommitted changes, or commits not yet pushed.
//! Exposed as a library for testing and for embedding the scan elsewhere.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod pool;
pub mod report;
pub mod scan;
pub mod status;
