//! Terra Extremes pipeline CLI.
//!
//! Builds day-of-year LST climatologies, event anomalies, ROI masks and the
//! metrics table from decoded MODIS field documents.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pipeline::{commands, config_loader};

#[derive(Parser, Debug)]
#[command(name = "terra-pipeline")]
#[command(about = "Climatology, anomaly and ROI metrics pipeline for land-surface extremes")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/pipeline.yaml", env = "TERRA_CONFIG")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stack dated slice documents into one time series
    Stack {
        /// Directory of slice documents (defaults to paths.lst_slices)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output series document (defaults to paths.lst_series)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Field name of the stacked series
        #[arg(long, default_value = "lst")]
        name: String,

        /// Scale factor for slices that do not declare one (defaults to
        /// thresholds.lst_scale_factor)
        #[arg(long)]
        scale_factor: Option<f64>,
    },

    /// Build the day-of-year LST climatology over the baseline years
    Climatology,

    /// Compute event-year LST anomalies against the climatology
    Anomalies,

    /// Rasterize an ROI onto the grid of a field document
    Mask {
        /// ROI name from the configuration
        #[arg(short, long)]
        roi: String,

        /// Field whose grid the mask is built on
        #[arg(short, long)]
        field: PathBuf,

        /// Output mask document
        #[arg(short, long)]
        output: PathBuf,
    },

    /// NDVI/MNDWI period deltas, water classification, monthly anomaly
    Seasonal,

    /// Baseline vs event LST histogram
    Distribution,

    /// Compute configured metrics into the metrics table
    Metrics,

    /// Run every stage in order
    Run,
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    let config = config_loader::load_config(&cli.config)?;

    match cli.command {
        Commands::Stack {
            input,
            output,
            name,
            scale_factor,
        } => commands::stack_lst_with(&config, input.as_deref(), output.as_deref(), &name, scale_factor)?,
        Commands::Climatology => commands::climatology(&config)?,
        Commands::Anomalies => commands::anomalies(&config)?,
        Commands::Mask { roi, field, output } => commands::mask(&config, &roi, &field, &output)?,
        Commands::Seasonal => commands::seasonal(&config)?,
        Commands::Distribution => {
            commands::distribution(&config)?;
        }
        Commands::Metrics => {
            commands::metrics(&config)?;
        }
        Commands::Run => {
            let summary = commands::run_all(&config)?;
            info!(updated = summary.updated, skipped = summary.skipped, "Done");
        }
    }

    Ok(())
}
