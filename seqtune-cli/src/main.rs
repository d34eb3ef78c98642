//! seqtune CLI: fine-tune a binary sequence classifier, or select the best
//! checkpoint across repeated runs.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// seqtune: fine-tuning driver and checkpoint selector
#[derive(Parser, Debug)]
#[command(name = "seqtune", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.seqtune/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Prepare CSV splits and fine-tune a sequence classifier
    Train {
        /// Training split (CSV with header)
        train_csv: PathBuf,
        /// Validation split (CSV with header)
        validation_csv: PathBuf,
        /// Test split (CSV with header)
        test_csv: PathBuf,
        /// Pretrained model identifier or local path
        model_checkpoint: String,
        /// Column holding the input text
        text_column: String,
        /// Column holding the label (truthy -> 1, otherwise 0)
        label_column: String,
        /// Directory for prepared data, checkpoints and logs
        output_dir: PathBuf,
        /// Prepare data and the run file without launching the trainer
        #[arg(long)]
        dry_run: bool,
        /// Python interpreter hosting the trainer
        #[arg(long)]
        python: Option<PathBuf>,
    },
    /// Pick each run's best epoch and aggregate test scores across runs
    Select {
        /// Checkpoint root containing one directory per task
        #[arg(short, long)]
        root: Option<PathBuf>,
        /// Task directory to scan (repeatable; replaces the configured list)
        #[arg(short, long = "task")]
        tasks: Vec<String>,
        /// Validation metric that decides the best epoch (repeatable)
        #[arg(long = "best-metric")]
        best_metrics: Vec<String>,
        /// Validation metric whose test counterpart is reported (repeatable)
        #[arg(short, long = "metric")]
        metrics: Vec<String>,
        /// Write scores, summary and failures as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write the default configuration to `.seqtune/config.toml`
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "seqtune", "seqtune")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "seqtune.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
