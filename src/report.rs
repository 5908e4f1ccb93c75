use crossterm::style::{Color, Stylize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::status::{RepoOutcome, RepoReport, RepoStatus};

pub const NO_REPOS_MESSAGE: &str = "no repositories found";

/// How a scan ended, as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    NoRepositories,
    AllClean,
    /// At least one repository is dirty or its status is unknown
    PendingWork,
}

impl Completion {
    pub fn exit_code(self) -> u8 {
        match self {
            Completion::NoRepositories | Completion::AllClean => 0,
            Completion::PendingWork => 1,
        }
    }
}

/// Everything one invocation found
#[derive(Debug, Clone)]
pub struct ScanResult {
    root: PathBuf,
    reports: Vec<RepoReport>,
}

impl ScanResult {
    pub fn new<P: Into<PathBuf>>(root: P, mut reports: Vec<RepoReport>) -> Self {
        // Display order only; neither engine guarantees one
        reports.sort_by(|a, b| a.repo.cmp(&b.repo));
        Self {
            root: root.into(),
            reports,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reports(&self) -> &[RepoReport] {
        &self.reports
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn clean(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_clean()).count()
    }

    pub fn dirty(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(&r.outcome, RepoOutcome::Known(s) if !s.is_clean()))
            .count()
    }

    pub fn unknown(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, RepoOutcome::Unknown { .. }))
            .count()
    }

    pub fn completion(&self) -> Completion {
        if self.reports.is_empty() {
            Completion::NoRepositories
        } else if self.clean() == self.total() {
            Completion::AllClean
        } else {
            Completion::PendingWork
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub color: bool,
    pub show_files: bool,
    pub quiet: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color: true,
            show_files: true,
            quiet: false,
        }
    }
}

fn paint(text: &str, color: Color, enabled: bool) -> String {
    if enabled {
        text.with(color).bold().to_string()
    } else {
        text.to_string()
    }
}

fn describe(status: &RepoStatus) -> String {
    let mut parts = Vec::new();
    if !status.untracked.is_empty() {
        parts.push(format!("{} untracked", status.untracked.len()));
    }
    if !status.modified.is_empty() {
        parts.push(format!("{} modified", status.modified.len()));
    }
    if status.ahead > 0 {
        parts.push(format!("{} ahead", status.ahead));
    }
    parts.join(", ")
}

/// Write the human-readable report
pub fn render<W: Write>(result: &ScanResult, opts: RenderOptions, out: &mut W) -> io::Result<()> {
    if result.total() == 0 {
        writeln!(out, "{}", NO_REPOS_MESSAGE)?;
        return Ok(());
    }

    if !opts.quiet {
        let mut printed = false;

        for report in result.reports() {
            let path = report.repo.display_path(result.root());
            match &report.outcome {
                RepoOutcome::Known(status) if status.is_clean() => {}
                RepoOutcome::Known(status) => {
                    printed = true;
                    writeln!(
                        out,
                        "{}  {}  ({})",
                        paint("dirty  ", Color::Yellow, opts.color),
                        path,
                        describe(status)
                    )?;
                    if opts.show_files {
                        for file in &status.untracked {
                            writeln!(out, "         ?? {}", file)?;
                        }
                        for file in &status.modified {
                            writeln!(out, "         M  {}", file)?;
                        }
                    }
                }
                RepoOutcome::Unknown { reason } => {
                    printed = true;
                    writeln!(
                        out,
                        "{}  {}  ({})",
                        paint("unknown", Color::Red, opts.color),
                        path,
                        reason
                    )?;
                }
            }
        }

        if printed {
            writeln!(out)?;
        }
    }

    let summary = format!(
        "{} repositories: {} clean, {} dirty, {} unknown",
        result.total(),
        result.clean(),
        result.dirty(),
        result.unknown()
    );
    let color = match result.completion() {
        Completion::PendingWork => Color::Yellow,
        _ => Color::Green,
    };
    writeln!(out, "{}", paint(&summary, color, opts.color))?;
    Ok(())
}
