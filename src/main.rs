//! dentls - print or delete every regular file in one huge directory.
//!
//! Usage:
//!   dentls /ABSOLUTE/PATH                        Print regular-file names
//!   DENTLS_DELETE=delete dentls /ABSOLUTE/PATH   Delete them instead
//!   DENTLS_PROGRESS=1 dentls /ABSOLUTE/PATH      Show progress on stderr

use std::env;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

use clap::{CommandFactory, Parser};
use color_eyre::eyre::Result;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dentls_core::{DentError, RunConfig, check_root};
use dentls_ops::execute;
use dentls_scan::{ScanProgress, SnapshotReader};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Filter directive for diagnostic logs.
const LOG_ENV: &str = "DENTLS_LOG";

/// Exit status for usage errors.
const USAGE_EXIT: i32 = -1;

#[derive(Parser)]
#[command(
    name = "dentls",
    version,
    disable_help_flag = true,
    disable_version_flag = true,
    about = "List or delete the regular files of a very large directory",
    long_about = "dentls reads one directory with raw getdents64 calls, so it copes \
                  with directories far too large for ls or rm.\n\n\
                  Regular-file names are printed to stdout. Nothing is removed \
                  unless DENTLS_DELETE is set to exactly 'delete'.",
    after_help = "Environment:\n  \
                  DENTLS_DELETE=delete  unlink every regular file instead of printing it\n  \
                  DENTLS_PROGRESS=1     dots and running totals on stderr\n  \
                  DENTLS_LOG=debug      diagnostic log filter (default: warn)"
)]
struct Cli {
    /// Absolute path of the directory to process
    #[arg(value_name = "ABSOLUTE_PATH")]
    path: PathBuf,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    // Judge the raw first argument, before clap can consume `--` or a flag.
    if let Some(Err(err)) = env::args_os()
        .nth(1)
        .map(|first| check_root(Path::new(&first)))
    {
        usage_exit(&err);
    }
    let cli = parse_cli();

    init_logging();

    let config = RunConfig::from_env(&cli.path)?;
    run(&config)
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(USAGE_EXIT);
        }
    }
}

fn usage_exit(err: &DentError) -> ! {
    eprintln!("error: {err}\n");
    eprintln!("{}", Cli::command().render_help());
    process::exit(USAGE_EXIT);
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

fn run(config: &RunConfig) -> Result<()> {
    debug!(
        root = %config.root.display(),
        mode = %config.mode,
        progress = config.show_progress,
        "starting run"
    );
    let reader = SnapshotReader::new();
    let mut progress_rx = reader.subscribe();
    let snapshot = reader.read(config)?;

    if let Some(last) = last_progress(&mut progress_rx) {
        debug!(
            batches = last.batches,
            records = last.records,
            rate = format!("{:.0} records/s", last.records_per_second()),
            "enumeration rate"
        );
    }

    eprintln!("Total files: {}", snapshot.len());
    eprintln!("Performing {}...", config.mode.verb());

    let stdout = io::stdout();
    let out = BufWriter::with_capacity(64 * 1024, stdout.lock());
    let stats = execute(config, &snapshot, out, io::stderr())?;

    eprintln!("Done ({} files)", stats.visited);
    snapshot.release();

    Ok(())
}

/// Most recent scan update still buffered in the channel.
fn last_progress(rx: &mut broadcast::Receiver<ScanProgress>) -> Option<ScanProgress> {
    let mut last = None;
    loop {
        match rx.try_recv() {
            Ok(progress) => last = Some(progress),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return last,
        }
    }
}
