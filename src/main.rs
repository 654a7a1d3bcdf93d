//! FrostGuard - refrigeration telemetry pipeline
//!
//! Reads a batch of telemetry, runs the five-stage pipeline and writes the
//! enriched table.
//!
//! # Usage
//!
//! ```bash
//! # Score a CSV export and write the enriched table
//! frostguard --csv telemetry.csv --output scored.csv
//!
//! # Pipe simulated telemetry through as JSON lines
//! simulation --format json | frostguard --stdin --format json --output scored.jsonl
//!
//! # Fit once, cache the model, reuse it on the next batch
//! frostguard --csv week1.csv --save-model model.json
//! frostguard --csv week2.csv --model model.json --output week2_scored.csv
//! ```
//!
//! # Environment Variables
//!
//! - `FROSTGUARD_CONFIG`: Path to unit_config.toml
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use frostguard::acquisition::{self, CsvSource, SampleSource, StdinSource};
use frostguard::config::{self, UnitConfig};
use frostguard::export::{self, OutputFormat};
use frostguard::{AnomalyModel, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "frostguard")]
#[command(about = "FrostGuard Refrigeration Telemetry Pipeline")]
#[command(version)]
struct CliArgs {
    /// Read telemetry from a CSV file
    #[arg(long, conflicts_with = "stdin")]
    csv: Option<PathBuf>,

    /// Read telemetry from stdin (one JSON sample per line)
    #[arg(long)]
    stdin: bool,

    /// Write the enriched table here (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Write dropped samples (with their control commands) here
    #[arg(long)]
    dropped_output: Option<PathBuf>,

    /// Unit config file (overrides FROSTGUARD_CONFIG / ./unit_config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Score with a previously saved model instead of refitting
    #[arg(long)]
    model: Option<PathBuf>,

    /// Save the fitted model here
    #[arg(long)]
    save_model: Option<PathBuf>,

    /// Write the batch summary as JSON here
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr, so stdout can carry the table)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    // Configuration errors are fatal
    let unit_config = match &args.config {
        Some(path) => UnitConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => UnitConfig::load().context("Failed to load unit config")?,
    };
    info!(
        "Unit: {} | Site: {} | Subsystems: {} (v{})",
        unit_config.unit.name,
        if unit_config.unit.site.is_empty() {
            "unset"
        } else {
            &unit_config.unit.site
        },
        unit_config.subsystems.len(),
        unit_config.subsystems_version
    );
    config::init(unit_config);
    let unit_config = config::get();

    // Ingest
    let mut source: Box<dyn SampleSource> = if args.stdin {
        info!("📥 Input: stdin (JSON lines)");
        Box::new(StdinSource::stdin())
    } else if let Some(path) = &args.csv {
        info!("📥 Input: CSV {}", path.display());
        Box::new(CsvSource::from_file(path).context("Failed to read CSV input")?)
    } else {
        anyhow::bail!("No input: pass --csv <path> or --stdin");
    };
    let samples = acquisition::collect_samples(source.as_mut()).await?;
    if samples.is_empty() {
        warn!("Input contained no samples");
    }

    // Run
    let pipeline = Pipeline::new(unit_config);
    let mut output = match &args.model {
        Some(path) => {
            let model = AnomalyModel::load_from_file(path)
                .with_context(|| format!("Failed to load model {}", path.display()))?;
            pipeline.run_with_model(samples, &model)?
        }
        None => pipeline.run(samples)?,
    };
    output.summary.rejected_at_ingest = source.rejected();
    output.summary.log();

    // Persist
    if let Some(path) = &args.save_model {
        output
            .model
            .save_to_file(path)
            .with_context(|| format!("Failed to save model {}", path.display()))?;
    }

    let subsystems: Vec<(String, String)> = output
        .model
        .subsystems
        .iter()
        .map(|s| (s.id.clone(), s.label_column.clone()))
        .collect();
    match &args.output {
        Some(path) => export::export_rows(path, args.format, &output.rows, &subsystems)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = std::io::stdout().lock();
            match args.format {
                OutputFormat::Csv => export::write_csv(stdout, &output.rows, &subsystems)?,
                OutputFormat::Json => export::write_json_rows(stdout, &output.rows, &subsystems)?,
            }
        }
    }

    if let Some(path) = &args.dropped_output {
        export::export_dropped(path, args.format, &output.dropped)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&output.summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Summary written");
    }

    Ok(())
}
