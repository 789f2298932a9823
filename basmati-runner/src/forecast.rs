//! Multi-horizon forecasts from fitted models.

use crate::artifacts::{ArtifactError, ArtifactStore, ModelManifest};
use crate::error::RunError;
use basmati_core::{
    future_dates, BaselineFit, FeatureBuilder, ForecastError, PriceSeries, ResidualFit,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One forecast day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub forecast: f64,
    pub lower_95: f64,
    pub upper_95: f64,
}

/// Forecast table for one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    pub horizon: usize,
    pub rows: Vec<ForecastRow>,
}

impl ForecastOutput {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Forecast every horizon from one baseline run of `max(horizons)` steps.
///
/// Dates start the day after the last history date. The residual correction
/// is added to the point forecast only on dates the builder returns a feature
/// row for; the interval bounds are always the baseline's.
pub fn compose_forecast(
    baseline: &dyn BaselineFit,
    residual: Option<&dyn ResidualFit>,
    history: &PriceSeries,
    builder: Option<&dyn FeatureBuilder>,
    horizons: &[usize],
) -> Result<BTreeMap<usize, ForecastOutput>, ForecastError> {
    if horizons.is_empty() || horizons.contains(&0) {
        return Err(ForecastError::InvalidConfig(format!(
            "horizons must be non-empty and positive, got {horizons:?}"
        )));
    }
    let last = history
        .last_date()
        .ok_or_else(|| ForecastError::InsufficientData("history is empty".into()))?;
    let max_h = horizons.iter().copied().max().unwrap_or(0);

    let base = baseline.forecast(max_h)?;
    if base.len() != max_h {
        return Err(ForecastError::ModelFit {
            model: "baseline".into(),
            reason: format!("returned {} steps, expected {max_h}", base.len()),
        });
    }
    let dates = future_dates(last, max_h);
    if base.dates.first() != dates.first() {
        warn!(
            baseline_start = ?base.dates.first(),
            history_start = ?dates.first(),
            "baseline training end differs from history end; using history dates"
        );
    }

    let mut mean = base.mean.clone();
    match (residual, builder) {
        (Some(residual), Some(builder)) => match builder.build(history, &dates) {
            Some(table) if !table.is_empty() => {
                let positions: Vec<usize> = dates
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| table.contains(**d))
                    .map(|(i, _)| i)
                    .collect();
                let covered: Vec<NaiveDate> = positions.iter().map(|&i| dates[i]).collect();
                let rows = table.rows_for(&covered)?;
                let correction = residual.predict(&rows)?;
                for (&i, c) in positions.iter().zip(&correction) {
                    mean[i] += c;
                }
                debug!(
                    builder = builder.name(),
                    corrected = positions.len(),
                    steps = max_h,
                    "applied residual correction"
                );
            }
            _ => warn!(
                builder = builder.name(),
                "no future feature rows; forecasting with baseline only"
            ),
        },
        (Some(_), None) => warn!("no feature builder; forecasting with baseline only"),
        (None, _) => debug!("no residual model; forecasting with baseline only"),
    }

    let rows: Vec<ForecastRow> = dates
        .iter()
        .enumerate()
        .map(|(i, &date)| ForecastRow {
            date,
            forecast: mean[i],
            lower_95: base.lower[i],
            upper_95: base.upper[i],
        })
        .collect();

    Ok(horizons
        .iter()
        .map(|&h| {
            (
                h,
                ForecastOutput {
                    horizon: h,
                    rows: rows[..h].to_vec(),
                },
            )
        })
        .collect())
}

/// Load a run's models and forecast.
///
/// A missing residual artifact is not an error: the forecast falls back to
/// the baseline. A manifest written by a newer schema is refused; a missing
/// or unreadable one only skips the provenance check.
pub fn forecast_from_artifacts(
    store: &ArtifactStore,
    history: &PriceSeries,
    builder: Option<&dyn FeatureBuilder>,
    horizons: &[usize],
) -> Result<BTreeMap<usize, ForecastOutput>, RunError> {
    let baseline = store.load_baseline()?;
    let residual = store.load_residual()?;
    if residual.is_none() {
        warn!(
            path = %store.residual_path().display(),
            "residual artifact missing; forecasting with baseline only"
        );
    }
    match store.load_manifest() {
        Ok(manifest) => check_history(&manifest, history),
        Err(e @ ArtifactError::UnsupportedSchema { .. }) => return Err(e.into()),
        Err(e) => warn!(error = %e, "manifest unreadable; skipping provenance check"),
    }

    let outputs = compose_forecast(
        &baseline,
        residual.as_ref().map(|r| r as &dyn ResidualFit),
        history,
        builder,
        horizons,
    )?;
    info!(
        horizons = ?horizons,
        corrected = residual.is_some(),
        "forecast composed"
    );
    Ok(outputs)
}

fn check_history(manifest: &ModelManifest, history: &PriceSeries) {
    if history.last_date() != Some(manifest.history_end) {
        warn!(
            trained_through = %manifest.history_end,
            history_end = ?history.last_date(),
            "history does not end where the models were trained"
        );
    }
}
