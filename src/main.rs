use std::{env, time::Instant};

use anyhow::{Context, Result};
use covid_tracker::prelude::*;
use tracing_subscriber::EnvFilter;

const MISSING_VALUES_SHOWN: usize = 20;

fn main() -> Result<()> {
    init_tracing();

    let config = match env::args().nth(1) {
        Some(path) => TrackerConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => TrackerConfig::default(),
    };
    config.validate().context("Invalid configuration")?;

    let start = Instant::now();

    // ============================================================================================
    // Exploration
    // ============================================================================================
    let raw = load_observations(&config.data_path).with_context(|| {
        format!(
            "Failed to load observations from {}",
            config.data_path.display()
        )
    })?;

    let (rows, cols) = raw.shape();
    println!("Dataset Shape: ({rows}, {cols})");
    println!("\nColumns in the dataset:");
    for name in raw.column_names() {
        println!("  {name}");
    }
    println!("\nMissing values per column (top {MISSING_VALUES_SHOWN}):");
    for (name, missing) in raw.missing_values(MISSING_VALUES_SHOWN) {
        println!("  {name:<40} {missing}");
    }

    // ============================================================================================
    // Cleaning and derived metrics
    // ============================================================================================
    let table = prepare(&raw, &config).context("Failed to prepare observations")?;

    let summary = SummaryStatistics::try_from(&table).context("Failed to summarize")?;
    println!("\nSummary statistics of the cleaned data:");
    println!("{}", summary.as_df());

    let trend = CaseTrend::from_table(&table, config.rolling_window)
        .context("Failed to compute the new cases trend")?;

    // ============================================================================================
    // Insights
    // ============================================================================================
    let insights = Insights::extract(&table).context("Failed to extract insights")?;
    println!("\n{insights}");

    // ============================================================================================
    // Export
    // ============================================================================================
    let exported = export_reports(&config.output_dir, &table, &trend, &insights)
        .context("Failed to export reports")?;

    println!(
        "\nAnalysis complete in {}. Cleaned data written to {}",
        humantime::format_duration(start.elapsed()),
        exported.cleaned.display()
    );
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
