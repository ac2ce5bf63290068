//! Length-of-stay pipeline CLI
//!
//! Splits the patients of a Parquet encounter extract, assembles the feature
//! tables and runs a full training with the mean baseline.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use los_pipeline::{LosPipeline, MeanBaseline, ParquetExecutor, PipelineConfig, cache_tables};

#[derive(Parser, Debug)]
#[command(name = "los-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Leakage-safe length-of-stay feature pipeline", long_about = None)]
struct Args {
    /// Encounter extract: a Parquet file or a directory of Parquet files
    input: PathBuf,

    /// JSON configuration file; missing keys take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to cache train.csv and test.csv into
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    info!("{config}");

    let start = Instant::now();
    let executor = ParquetExecutor::open(&config.schema.table, &args.input)
        .with_context(|| format!("Failed to load encounters from {}", args.input.display()))?;
    let pipeline = LosPipeline::new(&executor, config)?;

    let assignment = pipeline.split()?;
    let (tables, report) = pipeline.full_train(&assignment, &MeanBaseline)?;

    info!("Features: {:?}", report.feature_columns);
    info!("Train metrics: {}", report.train_metrics);
    match &report.test_metrics {
        Some(metrics) => info!("Test metrics ({}): {metrics}", report.test_source),
        None => info!("No test rows in the {}", report.test_source),
    }

    if let Some(dir) = &args.output {
        cache_tables(&tables, dir)?;
    }

    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
