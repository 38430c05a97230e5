//! foldwise CLI: partition datasets, enumerate configuration spaces and run
//! resampled tuning from the terminal.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// foldwise: leak-free resampling and hyperparameter tuning
#[derive(Parser, Debug)]
#[command(name = "foldwise", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Configuration file path (layered over the user config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where to read a dataset from and which column is the outcome.
#[derive(clap::Args, Debug, Clone)]
pub(crate) struct DataArgs {
    /// CSV, JSON (array of objects) or JSON Lines file
    #[arg(short, long)]
    pub data: PathBuf,

    /// Outcome column
    #[arg(short, long)]
    pub outcome: String,

    /// Predictor columns (defaults to every other column)
    #[arg(long, value_delimiter = ',')]
    pub predictors: Vec<String>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Split rows into a training and a test partition
    Split {
        #[command(flatten)]
        data: DataArgs,
        /// Share of rows used for training
        #[arg(short, long, default_value = "0.75")]
        fraction: f64,
        /// Categorical column to stratify on
        #[arg(long)]
        stratify: Option<String>,
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Build (repeated) k-fold resamples
    Folds {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short = 'k', long, default_value = "5")]
        folds: usize,
        #[arg(short, long, default_value = "1")]
        repeats: usize,
        #[arg(long)]
        stratify: Option<String>,
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Print the configurations described by the config file's space
    Grid,
    /// Run a full tuning pass with a built-in estimator
    Tune {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long, value_enum, default_value = "knn")]
        estimator: commands::EstimatorKind,
        /// Standardize numeric predictors inside every fold
        #[arg(long)]
        standardize: bool,
        /// Write metric records (JSON Lines) here
        #[arg(long)]
        records: Option<PathBuf>,
        /// Write the JSON report here instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Summarize stored metric records
    Summarize {
        /// Records file written by `tune --records`
        records: PathBuf,
        /// Per-fold means instead of per-configuration summaries
        #[arg(long)]
        by_fold: bool,
    },
    /// Rank stored records and pick a configuration
    Select {
        records: PathBuf,
        #[arg(short, long, default_value = "accuracy")]
        metric: String,
        /// Show this many ranked configurations
        #[arg(short = 'n', long, default_value = "5")]
        top: usize,
        /// Apply the one-standard-error rule using this parameter as complexity
        #[arg(long)]
        one_std_err: Option<String>,
        /// Which end of the complexity parameter is simpler
        #[arg(long, value_enum, default_value = "smaller")]
        simpler: commands::SimplerArg,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Destination (defaults to the user config file)
        path: Option<PathBuf>,
    },
    /// Show the merged configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "foldwise", "foldwise")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "foldwise.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, cli.config.as_deref())
}
