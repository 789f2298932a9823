//! End-to-end run: load prices, train, forecast, export.

use crate::artifacts::ArtifactStore;
use crate::config::{validate_horizons, PipelineConfig};
use crate::export::{write_forecast_tables, write_metrics_json};
use crate::forecast::{forecast_from_artifacts, ForecastOutput};
use crate::train::{train_models, TrainMetrics, TrainResult, TrainSettings};
use anyhow::{bail, Context, Result};
use basmati_core::csv_io::load_price_csv;
use basmati_core::{CalendarFeatures, FeatureBuilder, PriceSeries};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MODELS_DIR: &str = "models";
pub const METRICS_FILE: &str = "metrics.json";

/// Everything a pipeline run wrote.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_dir: PathBuf,
    pub train: TrainResult,
    pub forecast_paths: Vec<PathBuf>,
    pub metrics_path: PathBuf,
    pub outputs: BTreeMap<usize, ForecastOutput>,
}

impl PipelineReport {
    pub fn metrics(&self) -> &TrainMetrics {
        &self.train.metrics
    }
}

/// `{artifacts_root}/{YYYY-MM-DD}`
pub fn run_dir(artifacts_root: &Path, run_date: NaiveDate) -> PathBuf {
    artifacts_root.join(run_date.format("%Y-%m-%d").to_string())
}

/// Load the configured price history.
pub fn load_history(config: &PipelineConfig) -> Result<PriceSeries> {
    let path = &config.data.csv_path;
    let series = load_price_csv(path)
        .with_context(|| format!("Failed to load prices from {}", path.display()))?;
    if series.is_empty() {
        bail!("price table {} has no rows", path.display());
    }
    info!(
        path = %path.display(),
        rows = series.len(),
        first = ?series.first_date(),
        last = ?series.last_date(),
        "price history loaded"
    );
    Ok(series)
}

/// Train on the configured history, forecast every horizon, and write the
/// tables and metrics into the dated run directory.
///
/// `horizons` overrides `forecast.horizons` when given.
pub fn run_pipeline(
    config: &PipelineConfig,
    horizons: Option<Vec<usize>>,
    run_date: NaiveDate,
) -> Result<PipelineReport> {
    let horizons = horizons.unwrap_or_else(|| config.forecast.horizons.clone());
    validate_horizons(&horizons)?;

    let history = load_history(config)?;
    let builder = CalendarFeatures;
    let features = builder.build(&history, history.dates());

    let run_dir = run_dir(&config.artifacts.dir, run_date);
    let models_dir = run_dir.join(MODELS_DIR);
    info!(run_dir = %run_dir.display(), config = %config.fingerprint(), "pipeline started");

    let train = train_models(
        &history,
        features.as_ref(),
        &TrainSettings::from_config(config),
        &models_dir,
    )
    .context("Training failed")?;

    let store = ArtifactStore::open(&models_dir);
    let outputs = forecast_from_artifacts(&store, &history, Some(&builder), &horizons)
        .context("Forecast failed")?;

    let forecast_paths = write_forecast_tables(&run_dir, &config.forecast.title_prefix, &outputs)?;
    let metrics_path = run_dir.join(METRICS_FILE);
    write_metrics_json(&metrics_path, &train.metrics)?;

    info!(
        tables = forecast_paths.len(),
        baseline = %train.metrics.baseline,
        hybrid = %train.metrics.hybrid,
        "pipeline finished"
    );
    Ok(PipelineReport {
        run_dir,
        train,
        forecast_paths,
        metrics_path,
        outputs,
    })
}

/// Forecast from an existing models directory without retraining.
pub fn forecast_only(
    config: &PipelineConfig,
    models_dir: &Path,
    out_dir: &Path,
    horizons: Option<Vec<usize>>,
) -> Result<Vec<PathBuf>> {
    let horizons = horizons.unwrap_or_else(|| config.forecast.horizons.clone());
    validate_horizons(&horizons)?;
    let history = load_history(config)?;
    let store = ArtifactStore::open(models_dir);
    let outputs = forecast_from_artifacts(&store, &history, Some(&CalendarFeatures), &horizons)
        .context("Forecast failed")?;
    write_forecast_tables(out_dir, &config.forecast.title_prefix, &outputs)
}

/// Train into `models_dir` without forecasting.
pub fn train_only(config: &PipelineConfig, models_dir: &Path) -> Result<TrainResult> {
    let history = load_history(config)?;
    let features = CalendarFeatures.build(&history, history.dates());
    let result = train_models(
        &history,
        features.as_ref(),
        &TrainSettings::from_config(config),
        models_dir,
    )
    .context("Training failed")?;
    Ok(result)
}
