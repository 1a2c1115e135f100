//! Command-line front end.
//!
//! ```bash
//! # analyze one CSV with the default ribbon spiral layout
//! yarpd data/btc_daily.csv
//!
//! # smaller-scale series, explicit layout and a JSON config
//! yarpd prices.csv --config tuned.json --prominence 25 --layout golden_spiral
//!
//! # several files at once, keyed by file name
//! yarpd a.csv b.csv --param golden_tolerance=0.05
//! ```
//!
//! The report is printed to stdout; logs go to stderr (`RUST_LOG`, default `warn`).
//! A top-level failure prints `{"error": "..."}` and exits with status 1.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use yarpd::prelude::*;

#[derive(Parser)]
#[command(name = "yarpd")]
#[command(about = "Recurring pattern analysis of daily price series", long_about = None)]
#[command(version)]
struct Cli {
    /// CSV files with a date column and a close column
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON analyzer configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Minimum sample distance between peaks
    #[arg(long)]
    distance: Option<usize>,

    /// Minimum peak prominence in price units
    #[arg(long)]
    prominence: Option<f64>,

    /// vertical_column, ribbon_spiral, golden_spiral or candle_spiral
    #[arg(short, long)]
    layout: Option<LayoutMode>,

    /// undirected or low_before_high
    #[arg(long)]
    swing_ordering: Option<SwingOrdering>,

    /// Label written to the report's dataset_type
    #[arg(long)]
    dataset_type: Option<String>,

    /// Any tunable as key=value, e.g. golden_tolerance=0.05
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, f64)>,

    /// Single-line JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

fn parse_param(raw: &str) -> std::result::Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("'{value}' is not a number: {e}"))?;
    Ok((key.trim().to_string(), value))
}

fn load_config(cli: &Cli) -> anyhow::Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };

    let overrides: HashMap<&str, f64> = cli.params.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    config.apply_params(&overrides)?;

    if let Some(distance) = cli.distance {
        config.distance = distance;
    }
    if let Some(prominence) = cli.prominence {
        config.prominence = prominence;
    }
    if let Some(layout) = cli.layout {
        config.layout = layout;
    }
    if let Some(ordering) = cli.swing_ordering {
        config.swing_ordering = ordering;
    }
    if let Some(dataset_type) = &cli.dataset_type {
        config.dataset_type = dataset_type.clone();
    }
    Ok(config)
}

fn series_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run(cli: &Cli) -> anyhow::Result<serde_json::Value> {
    let config = load_config(cli)?;
    let analyzer = AnalyzerBuilder::from_config(config)
        .build()
        .context("invalid analyzer configuration")?;

    if let [path] = cli.inputs.as_slice() {
        let series = load_csv(path).with_context(|| format!("loading {}", path.display()))?;
        let report = analyzer.analyze(&series);
        return Ok(serde_json::to_value(ReportEnvelope::Report(Box::new(report)))?);
    }

    let mut output = BTreeMap::new();
    let mut loaded = Vec::new();
    for path in &cli.inputs {
        let name = series_name(path);
        match load_csv(path) {
            Ok(series) => loaded.push((name, series)),
            Err(err) => {
                error!(file = %path.display(), error = %err, "skipping input");
                output.insert(name, serde_json::to_value(ReportEnvelope::failure(err))?);
            }
        }
    }

    let batch: Vec<(&str, &[PriceBar])> = loaded
        .iter()
        .map(|(name, series)| (name.as_str(), series.bars()))
        .collect();
    let (reports, failures) = analyze_parallel(&analyzer, batch);
    info!(analyzed = reports.len(), failed = failures.len(), "batch complete");

    for SeriesReport { symbol, report } in reports {
        output.insert(symbol, serde_json::to_value(ReportEnvelope::Report(Box::new(report)))?);
    }
    for SeriesError { symbol, error } in failures {
        output.insert(symbol, serde_json::to_value(ReportEnvelope::failure(error))?);
    }

    Ok(serde_json::to_value(output)?)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (value, code) = match run(&cli) {
        Ok(value) => (value, ExitCode::SUCCESS),
        Err(err) => {
            error!(error = %format!("{err:#}"), "analysis failed");
            let failure = ReportEnvelope::failure(format!("{err:#}"));
            (serde_json::to_value(failure).unwrap_or_default(), ExitCode::FAILURE)
        }
    };

    let text = if cli.compact {
        serde_json::to_string(&value)
    } else {
        serde_json::to_string_pretty(&value)
    };
    match text {
        Ok(text) => {
            println!("{text}");
            code
        }
        Err(err) => {
            eprintln!("cannot serialize report: {err}");
            ExitCode::FAILURE
        }
    }
}
