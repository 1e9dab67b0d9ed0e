//! DDZ log inspector.
//!
//! Lists the datasets of a log with their fields, record counts and
//! metadata, optionally guessing the grid each dataset was swept on.

mod summary;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use datadict_storage::{list_datasets, StorageConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use summary::{render_text, summarize};

#[derive(Parser, Debug)]
#[command(name = "inspector")]
#[command(about = "Inspect datasets stored in a DDZ log")]
struct Args {
    /// Path of the log (the .ddz extension may be omitted)
    path: PathBuf,

    /// Only show this dataset
    #[arg(short, long)]
    group: Option<String>,

    /// Read the records and guess the grid shape
    #[arg(long)]
    grid: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(long, default_value = "warn", env = "LOG_LEVEL")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = StorageConfig::from_env();
    config.validate().map_err(|e| anyhow!("invalid configuration: {e}"))?;

    let datasets = list_datasets(&args.path)?;
    info!(path = %args.path.display(), datasets = datasets.len(), "opened log");

    let selected: Vec<_> = match &args.group {
        Some(group) => {
            let structure = datasets
                .get(group)
                .ok_or_else(|| anyhow!("no dataset '{group}' in {}", args.path.display()))?;
            vec![(group, structure)]
        }
        None => datasets.iter().collect(),
    };

    let mut summaries = Vec::with_capacity(selected.len());
    for (name, structure) in selected {
        summaries.push(summarize(&args.path, name, structure, args.grid, &config)?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for summary in &summaries {
            print!("{}", render_text(summary));
        }
    }

    Ok(())
}
