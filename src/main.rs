use anyhow::Result;
use clap::Parser;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::thread;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gitsweep::app::App;
use gitsweep::cli::CliArgs;
use gitsweep::config::Config;
use gitsweep::report::{self, Completion, RenderOptions};
use gitsweep::status::StatusEvent;

/// Exit code for scans that could not complete
const EXIT_FAILURE: u8 = 2;

fn init_tracing(verbose: bool) {
    let default = if verbose { "gitsweep=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli_args: CliArgs) -> Result<Completion> {
    let config = Config::from_cli_and_file(&cli_args)?;
    let app = App::from_config(&config);
    let scan = app.scan_config();
    info!(
        "Scanning {} (max depth: {:?}, {} ignore patterns)",
        scan.root.display(),
        scan.max_depth,
        scan.ignore.len()
    );

    let result = if cli_args.progress {
        let (tx, rx) = crossbeam_channel::unbounded();
        let printer = thread::spawn(move || {
            let mut stderr = io::stderr();
            for event in rx {
                match event {
                    StatusEvent::Checked { done, total, .. } => {
                        let _ = write!(stderr, "\rchecked {}/{}", done, total);
                        let _ = stderr.flush();
                    }
                    StatusEvent::Completed { total } if total > 0 => {
                        let _ = writeln!(stderr);
                    }
                    StatusEvent::Completed { .. } => {}
                }
            }
        });

        let result = app.run_with_events(tx);
        let _ = printer.join();
        result?
    } else {
        app.run()?
    };

    let opts = RenderOptions {
        color: config.output.color && io::stdout().is_terminal(),
        show_files: config.output.show_files,
        quiet: cli_args.quiet,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report::render(&result, opts, &mut out)?;
    out.flush()?;

    Ok(result.completion())
}

fn main() -> ExitCode {
    let cli_args = CliArgs::parse();
    init_tracing(cli_args.verbose);

    match run(cli_args) {
        Ok(completion) => ExitCode::from(completion.exit_code()),
        Err(err) => {
            error!("Scan failed: {:#}", err);
            eprintln!("error: {:#}", err);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
