//! Holdout evaluation and deployment fitting.
//!
//! A training run fits the baseline on everything up to the cutoff, scores it
//! (alone and with the residual correction) on the trailing holdout, then
//! refits both models on the full history and persists them.

use crate::artifacts::{ArtifactStore, ModelManifest, SCHEMA_VERSION};
use crate::config::PipelineConfig;
use crate::error::RunError;
use basmati_core::{
    align_training_frame, BaselineFit, FeatureTable, ForecastError, GbmParams, GradientBoosting,
    Metrics, PriceSeries, ResidualFit, Sarimax,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Holdout scores for both forecast variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainMetrics {
    #[serde(rename = "baseline_SARIMAX")]
    pub baseline: Metrics,
    pub hybrid: Metrics,
}

/// Where the holdout boundary fell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub cutoff: NaiveDate,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub train_len: usize,
    pub test_len: usize,
}

/// Chronological train/test partition.
#[derive(Debug, Clone)]
pub struct HoldoutSplit {
    pub cutoff: NaiveDate,
    pub train: PriceSeries,
    pub test: PriceSeries,
}

impl HoldoutSplit {
    pub fn summary(&self) -> SplitSummary {
        // Both halves are non-empty by construction.
        let first = |s: &PriceSeries| s.first_date().unwrap_or(self.cutoff);
        let last = |s: &PriceSeries| s.last_date().unwrap_or(self.cutoff);
        SplitSummary {
            cutoff: self.cutoff,
            train_start: first(&self.train),
            train_end: last(&self.train),
            test_start: first(&self.test),
            test_end: last(&self.test),
            train_len: self.train.len(),
            test_len: self.test.len(),
        }
    }
}

/// Split at `last_date − test_size_days`: train holds dates on or before the
/// cutoff, test the dates after it.
pub fn holdout_split(series: &PriceSeries, test_size_days: u32) -> Result<HoldoutSplit, ForecastError> {
    let last = series
        .last_date()
        .ok_or_else(|| ForecastError::InsufficientData("price series is empty".into()))?;
    if test_size_days == 0 {
        return Err(ForecastError::InvalidConfig(
            "test_size_days must be at least 1".into(),
        ));
    }
    if i64::from(test_size_days) >= series.span_days() {
        return Err(ForecastError::InsufficientData(format!(
            "holdout of {test_size_days} days leaves no training data in a {}-day series",
            series.span_days()
        )));
    }
    let cutoff = last - Duration::days(i64::from(test_size_days));
    let (train, test) = series.split_at(cutoff);
    if train.is_empty() || test.is_empty() {
        return Err(ForecastError::InsufficientData(format!(
            "split at {cutoff} leaves an empty partition ({} train, {} test)",
            train.len(),
            test.len()
        )));
    }
    Ok(HoldoutSplit { cutoff, train, test })
}

/// Model settings for one training run.
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub sarimax: Sarimax,
    pub test_size_days: u32,
    /// `None` disables residual modelling.
    pub residual: Option<GbmParams>,
}

impl TrainSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            sarimax: config.sarimax.model(),
            test_size_days: config.training.test_size_days,
            residual: config.residual.enabled.then(|| config.residual.params()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainResult {
    pub baseline_path: PathBuf,
    /// `None` when no residual model was trained.
    pub residual_path: Option<PathBuf>,
    pub manifest_path: PathBuf,
    pub metrics: TrainMetrics,
    pub split: SplitSummary,
}

impl TrainResult {
    pub fn residual_used(&self) -> bool {
        self.residual_path.is_some()
    }
}

/// Evaluate on the trailing holdout, refit on the full history, and persist
/// the deployed models into `artifacts_dir`.
///
/// Missing or disjoint features do not fail the run: the residual stage is
/// skipped and the hybrid metrics equal the baseline metrics.
pub fn train_models(
    series: &PriceSeries,
    features: Option<&FeatureTable>,
    settings: &TrainSettings,
    artifacts_dir: &Path,
) -> Result<TrainResult, RunError> {
    settings.sarimax.validate()?;
    if let Some(params) = &settings.residual {
        params.validate()?;
    }

    let (y, rows) = joined_frame(series, features)?;
    let mut residual_params = match (&settings.residual, &rows) {
        (Some(params), Some(_)) => Some(params.clone()),
        (Some(_), None) => {
            warn!("no usable feature rows; residual model disabled");
            None
        }
        (None, _) => None,
    };

    let split = holdout_split(&y, settings.test_size_days)?;
    let summary = split.summary();
    info!(
        cutoff = %summary.cutoff,
        train = summary.train_len,
        test = summary.test_len,
        "holdout split"
    );

    // Evaluation fit: train partition only.
    let eval_fit = settings.sarimax.fit(&split.train)?;
    let base_pred = eval_fit.forecast(split.test.len())?.mean;
    let baseline_metrics = Metrics::compute(split.test.values(), &base_pred)?;
    info!(%baseline_metrics, "baseline holdout metrics");

    let mut hybrid_metrics = baseline_metrics;
    let mut residual_usable = true;
    if let (Some(params), Some(rows)) = (residual_params.as_ref(), rows.as_ref()) {
        let (train_rows, test_rows) = rows.split_at(split.train.len());
        match residual_training_set(&split.train, &eval_fit, train_rows) {
            Some((x, r)) => {
                let gbm = GradientBoosting::new(params.clone()).fit(&x, &r)?;
                let correction = gbm.predict(test_rows)?;
                let hybrid: Vec<f64> = base_pred
                    .iter()
                    .zip(&correction)
                    .map(|(b, c)| b + c)
                    .collect();
                hybrid_metrics = Metrics::compute(split.test.values(), &hybrid)?;
                info!(%hybrid_metrics, trees = gbm.n_trees(), "hybrid holdout metrics");
            }
            None => {
                warn!("baseline produced no fitted values on the training split; residual model disabled");
                residual_usable = false;
            }
        }
    }
    if !residual_usable {
        residual_params = None;
    }

    // Deployment fit: full history, fresh models.
    let store = ArtifactStore::create(artifacts_dir)?;
    let full_fit = settings.sarimax.fit(&y)?;
    let baseline_path = store.save_baseline(&full_fit)?;

    let mut residual_path = None;
    if let (Some(params), Some(rows)) = (residual_params.as_ref(), rows.as_ref()) {
        match residual_training_set(&y, &full_fit, rows) {
            Some((x, r)) => {
                let gbm = GradientBoosting::new(params.clone()).fit(&x, &r)?;
                residual_path = Some(store.save_residual(&gbm)?);
            }
            None => {
                warn!("baseline produced no fitted values on the full history; residual model not saved");
            }
        }
    }
    if residual_path.is_none() {
        store.clear_residual()?;
    }

    let metrics = TrainMetrics {
        baseline: baseline_metrics,
        hybrid: hybrid_metrics,
    };
    let manifest = ModelManifest {
        schema_version: SCHEMA_VERSION,
        created_at: Utc::now(),
        dataset_hash: y.content_hash(),
        history_start: y.first_date().unwrap_or(summary.train_start),
        history_end: y.last_date().unwrap_or(summary.test_end),
        order: settings.sarimax.order,
        seasonal_order: settings.sarimax.seasonal,
        residual: residual_path.as_ref().and(residual_params),
        split: summary,
        metrics,
    };
    let manifest_path = store.save_manifest(&manifest)?;
    info!(
        dir = %store.dir().display(),
        residual = residual_path.is_some(),
        "models saved"
    );

    Ok(TrainResult {
        baseline_path,
        residual_path,
        manifest_path,
        metrics,
        split: summary,
    })
}

/// Target series plus feature rows aligned to it.
///
/// With a feature table the target is the inner join of prices and feature
/// rows, whether or not the residual stage runs. Rows are `None` when no table
/// was supplied or its dates never meet the prices.
fn joined_frame(
    series: &PriceSeries,
    features: Option<&FeatureTable>,
) -> Result<(PriceSeries, Option<Vec<Vec<f64>>>), ForecastError> {
    let Some(features) = features else {
        info!("no feature table supplied; training on the full series");
        return Ok((series.clone(), None));
    };
    match align_training_frame(series, features) {
        Ok(frame) => {
            if frame.series.len() < series.len() {
                info!(
                    kept = frame.series.len(),
                    dropped = series.len() - frame.series.len(),
                    "inner-joined prices with features"
                );
            }
            Ok((frame.series, Some(frame.rows)))
        }
        Err(ForecastError::FeatureAlignment(reason)) => {
            warn!(%reason, "features unusable; training on the full series");
            Ok((series.clone(), None))
        }
        Err(e) => Err(e),
    }
}

/// `(feature rows, y − fitted)` for every date with a fitted value.
///
/// Fitted values are forward-filled across warm-up gaps; dates before the
/// first fitted value are dropped. `None` if nothing remains.
fn residual_training_set(
    y: &PriceSeries,
    fit: &dyn BaselineFit,
    rows: &[Vec<f64>],
) -> Option<(Vec<Vec<f64>>, Vec<f64>)> {
    let mut x = Vec::new();
    let mut r = Vec::new();
    let mut carry = None;
    for ((actual, fitted), row) in y.values().iter().zip(fit.fitted_values()).zip(rows) {
        if fitted.is_some() {
            carry = *fitted;
        }
        if let Some(base) = carry {
            x.push(row.clone());
            r.push(actual - base);
        }
    }
    (!r.is_empty()).then_some((x, r))
}
