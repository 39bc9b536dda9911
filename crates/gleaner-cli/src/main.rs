#![forbid(unsafe_code)]

mod cmd;
mod output;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use gleaner_core::{Coordinator, load_config};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "gleaner: incremental harvester for growing JSONL session logs",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// State directory holding cursor.json, batches/ and config.toml.
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Root directory watched for <source-id>/sessions/*.jsonl files.
    #[arg(long, global = true, value_name = "DIR")]
    sources_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Start tracking session files at end-of-stream",
        long_about = "Seed the cursor store at the current end of every discovered session file, so only records appended afterwards are harvested.",
        after_help = "EXAMPLES:\n    # Track everything under the default sources root\n    gln init\n\n    # Track a custom tree\n    gln init --sources-dir /var/log/agents\n\n    # Emit machine-readable output\n    gln init --json"
    )]
    Init,

    #[command(
        about = "Run one extraction pass",
        long_about = "Read newly appended records from every tracked file and materialize at most one batch artifact. While a batch is awaiting commit, extraction reports it and reads nothing.",
        after_help = "EXAMPLES:\n    # One pass over all tracked files\n    gln extract\n\n    # Raise the read ceiling for a catch-up pass\n    gln extract --max-bytes-per-file 1048576\n\n    # Emit machine-readable output\n    gln extract --json"
    )]
    Extract(cmd::extract::ExtractArgs),

    #[command(
        about = "Acknowledge a batch and advance offsets",
        long_about = "Commit a previously extracted batch: committed offsets advance to the staged positions and the artifact is removed. Recommitting is a no-op.",
        after_help = "EXAMPLES:\n    # Acknowledge a batch produced by extract\n    gln commit --batch-id 20260829-120000\n\n    # Emit machine-readable output\n    gln commit --batch-id 20260829-120000 --json"
    )]
    Commit(cmd::commit::CommitArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GLEANER_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "gleaner=debug,info"
        } else {
            "gleaner=info,warn"
        })
    });

    let format = env::var("GLEANER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// State directory: flag, then `GLEANER_STATE_DIR`, then the platform
/// data dir.
fn resolve_state_dir(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    if let Ok(dir) = env::var("GLEANER_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|d| d.join("gleaner"))
        .context("cannot determine a state directory; pass --state-dir")
}

/// Sources root: flag, then `GLEANER_SOURCES_DIR`, then
/// `~/.gleaner/sources`.
fn resolve_sources_dir(flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    if let Ok(dir) = env::var("GLEANER_SOURCES_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|d| d.join(".gleaner").join("sources"))
        .context("cannot determine a sources directory; pass --sources-dir")
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let state_dir = resolve_state_dir(cli.state_dir.clone())?;
    let sources_dir = resolve_sources_dir(cli.sources_dir.clone())?;
    let mut config = load_config(&state_dir)?;
    if let Commands::Extract(ref args) = cli.command {
        if let Some(n) = args.max_bytes_per_file {
            config.limits.max_bytes_per_file = n;
        }
        if let Some(n) = args.max_records_per_source {
            config.limits.max_records_per_source = n;
        }
    }
    let coordinator = Coordinator::new(state_dir, sources_dir, config);
    let output = cli.output_mode();

    match cli.command {
        Commands::Init => cmd::init::run_init(&coordinator, output),
        Commands::Extract(_) => cmd::extract::run_extract(&coordinator, output),
        Commands::Commit(ref args) => cmd::commit::run_commit(args, &coordinator, output),
    }
}
