use clap::{Parser, Subcommand};
use patchx::config::RunConfig;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// PatchCore-style visual anomaly detection over MVTec-AD
#[derive(Parser, Debug)]
#[command(name = "patchx")]
#[command(about = "Coreset nearest-neighbor anomaly detection", long_about = None)]
struct Args {
    /// Path to a YAML run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset root, overrides config and PATCHX_DATA_ROOT
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the dataset layout and list categories
    Download,
    /// Fit a model for one category and persist it
    Train {
        /// MVTec category name, e.g. "bottle"
        category: String,
    },
    /// Score a category's test split, write metrics JSON and a gallery
    Eval {
        /// MVTec category name, e.g. "bottle"
        category: String,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = RunConfig::load(args.config.as_deref())?;
    if args.data_root.is_some() {
        config.data_root = args.data_root;
    }

    match args.command {
        Command::Download => patchx::commands::download(&config),
        Command::Train { category } => patchx::commands::train(&config, &category),
        Command::Eval { category } => patchx::commands::eval(&config, &category),
    }
}
