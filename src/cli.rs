use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "gitsweep")]
#[command(version)]
#[command(about = "Find Git repositories under a directory and report the ones with pending work")]
pub struct CliArgs {
    /// Directory to scan (overrides config, defaults to the current directory)
    pub root: Option<PathBuf>,

    /// Maximum directory depth to descend below the root
    #[arg(short = 'd', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_depth: Option<u32>,

    /// Directory name to skip, in addition to the built-in list (repeatable)
    #[arg(short, long = "ignore", value_name = "NAME")]
    pub ignore: Vec<String>,

    /// Number of worker threads (defaults to available parallelism)
    #[arg(short, long, value_parser = clap::value_parser!(usize))]
    pub jobs: Option<usize>,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,

    /// Show a progress line on stderr while checking repositories
    #[arg(long)]
    pub progress: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
