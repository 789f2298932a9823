//! BDD tests for training, forecasting, and the end-to-end pipeline.
//!
//! These tests verify:
//! - Holdout split boundaries and metrics on a known linear series
//! - Hybrid metrics collapse to baseline when residual modelling is off
//! - Graceful fallback when features or the residual artifact are missing
//! - Byte-identical output for repeated forecasts
//! - The dated run directory layout written by `run_pipeline`

use basmati_core::csv_io::write_price_csv;
use basmati_core::{CalendarFeatures, FeatureBuilder, FeatureTable, PriceSeries, Sarimax};
use basmati_runner::{
    compose_forecast, forecast_from_artifacts, run_pipeline, train_models, write_forecast_tables,
    ArtifactStore, PipelineConfig, TrainSettings,
};
use chrono::{Duration, NaiveDate};
use std::path::Path;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn series_from(values: &[f64]) -> PriceSeries {
    let start = d(2024, 1, 1);
    PriceSeries::daily(
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::days(i as i64), Some(*v))),
    )
    .unwrap()
}

/// 100, 101, …, 199.
fn linear_series() -> PriceSeries {
    series_from(&(0..100).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
}

fn seasonal_series(n: usize) -> PriceSeries {
    let values: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64;
            3200.0 + 1.5 * t + 25.0 * (t * 2.0 * std::f64::consts::PI / 7.0).sin()
                + ((i * 7919) % 13) as f64 * 2.0
        })
        .collect();
    series_from(&values)
}

fn settings(test_size_days: u32, residual: bool) -> TrainSettings {
    let mut config = PipelineConfig::default();
    config.training.test_size_days = test_size_days;
    config.residual.enabled = residual;
    config.residual.n_estimators = 50;
    TrainSettings::from_config(&config)
}

fn calendar(series: &PriceSeries) -> FeatureTable {
    CalendarFeatures.build(series, series.dates()).unwrap()
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn bdd_scenario_linear_series_holdout_and_forecast() {
    // GIVEN a perfectly linear daily series and a 10-day holdout
    let series = linear_series();
    let features = calendar(&series);
    let dir = tempfile::tempdir().unwrap();

    // WHEN models are trained
    let result = train_models(&series, Some(&features), &settings(10, true), dir.path()).unwrap();

    // THEN the test split is exactly the last 10 dates
    assert_eq!(result.split.test_len, 10);
    assert_eq!(result.split.test_start, d(2024, 3, 31));
    assert_eq!(result.split.test_end, d(2024, 4, 9));
    assert_eq!(result.split.train_end, result.split.cutoff);

    // AND the baseline tracks the trend
    assert!(result.metrics.baseline.mae < 5.0, "{}", result.metrics.baseline);
    assert!(result.metrics.hybrid.mae < 5.0, "{}", result.metrics.hybrid);

    // AND all three artifacts exist
    assert!(result.baseline_path.exists());
    assert!(result.residual_path.as_ref().unwrap().exists());
    assert!(result.manifest_path.exists());

    // WHEN a 5-day forecast is composed from the saved artifacts
    let store = ArtifactStore::open(dir.path());
    let outputs =
        forecast_from_artifacts(&store, &series, Some(&CalendarFeatures), &[5]).unwrap();
    let rows = &outputs[&5].rows;

    // THEN dates continue the history without gaps
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].date, d(2024, 4, 10));
    assert!(rows.windows(2).all(|w| w[1].date - w[0].date == Duration::days(1)));

    // AND the point forecast keeps rising
    assert!(rows.windows(2).all(|w| w[1].forecast >= w[0].forecast - 1e-6));
}

#[test]
fn bdd_scenario_residual_disabled_hybrid_equals_baseline() {
    // GIVEN residual modelling is switched off
    let series = seasonal_series(150);
    let features = calendar(&series);
    let dir = tempfile::tempdir().unwrap();

    // WHEN models are trained
    let result = train_models(&series, Some(&features), &settings(30, false), dir.path()).unwrap();

    // THEN hybrid metrics are the baseline metrics, bit for bit
    assert_eq!(result.metrics.hybrid, result.metrics.baseline);

    // AND no residual artifact is written
    assert!(result.residual_path.is_none());
    assert!(!ArtifactStore::open(dir.path()).residual_path().exists());
    let manifest = ArtifactStore::open(dir.path()).load_manifest().unwrap();
    assert!(manifest.residual.is_none());
}

#[test]
fn bdd_scenario_disjoint_features_degrade_to_baseline() {
    // GIVEN a feature table that shares no dates with the prices
    let series = seasonal_series(120);
    let mut far_future = FeatureTable::new(vec!["x".into()]);
    far_future.insert(d(2031, 1, 1), vec![1.0]).unwrap();
    let dir = tempfile::tempdir().unwrap();

    // WHEN models are trained with residual modelling enabled
    let result =
        train_models(&series, Some(&far_future), &settings(20, true), dir.path()).unwrap();

    // THEN training still succeeds with baseline-only hybrid metrics
    assert!(!result.residual_used());
    assert_eq!(result.metrics.hybrid, result.metrics.baseline);
}

#[test]
fn bdd_scenario_missing_features_degrade_to_baseline() {
    // GIVEN no feature table at all
    let series = seasonal_series(120);
    let dir = tempfile::tempdir().unwrap();

    // WHEN models are trained
    let result = train_models(&series, None, &settings(20, true), dir.path()).unwrap();

    // THEN the run completes without a residual model
    assert!(!result.residual_used());
    assert_eq!(result.metrics.hybrid, result.metrics.baseline);
}

#[test]
fn bdd_scenario_missing_residual_artifact_falls_back() {
    // GIVEN a trained run whose residual artifact was removed
    let series = seasonal_series(150);
    let features = calendar(&series);
    let dir = tempfile::tempdir().unwrap();
    train_models(&series, Some(&features), &settings(30, true), dir.path()).unwrap();
    let store = ArtifactStore::open(dir.path());
    std::fs::remove_file(store.residual_path()).unwrap();

    // WHEN forecasting from the artifacts
    let outputs =
        forecast_from_artifacts(&store, &series, Some(&CalendarFeatures), &[7, 14]).unwrap();

    // THEN the forecast equals the uncorrected baseline
    let baseline = store.load_baseline().unwrap();
    let expected = compose_forecast(&baseline, None, &series, None, &[7, 14]).unwrap();
    assert_eq!(outputs, expected);
}

#[test]
fn bdd_scenario_repeated_forecasts_are_byte_identical() {
    // GIVEN one set of trained artifacts
    let series = seasonal_series(150);
    let features = calendar(&series);
    let models = tempfile::tempdir().unwrap();
    train_models(&series, Some(&features), &settings(30, true), models.path()).unwrap();
    let store = ArtifactStore::open(models.path());

    // WHEN the forecast is produced and written twice
    let out_a = tempfile::tempdir().unwrap();
    let out_b = tempfile::tempdir().unwrap();
    for out in [&out_a, &out_b] {
        let outputs =
            forecast_from_artifacts(&store, &series, Some(&CalendarFeatures), &[7, 30]).unwrap();
        write_forecast_tables(out.path(), "forecast", &outputs).unwrap();
    }

    // THEN every table matches byte for byte
    for name in ["forecast_7d.csv", "forecast_30d.csv"] {
        assert_eq!(read(&out_a.path().join(name)), read(&out_b.path().join(name)));
    }
}

#[test]
fn bdd_scenario_retraining_is_deterministic() {
    // GIVEN the same series, features, and settings
    let series = seasonal_series(120);
    let features = calendar(&series);
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();

    // WHEN two independent training runs complete
    let ra = train_models(&series, Some(&features), &settings(20, true), a.path()).unwrap();
    let rb = train_models(&series, Some(&features), &settings(20, true), b.path()).unwrap();

    // THEN metrics and saved models are identical
    assert_eq!(ra.metrics, rb.metrics);
    assert_eq!(read(&ra.baseline_path), read(&rb.baseline_path));
    assert_eq!(
        read(ra.residual_path.as_ref().unwrap()),
        read(rb.residual_path.as_ref().unwrap())
    );
}

#[test]
fn bdd_scenario_holdout_longer_than_history_fails() {
    // GIVEN a 30-day series and a 60-day holdout
    let series = seasonal_series(30);
    let dir = tempfile::tempdir().unwrap();

    // WHEN training is attempted
    let err = train_models(&series, None, &settings(60, false), dir.path()).unwrap_err();

    // THEN it fails with an insufficient-data error
    assert!(err.to_string().contains("insufficient data"), "{err}");
}

#[test]
fn bdd_scenario_pipeline_writes_dated_run_directory() {
    // GIVEN a price CSV and a config pointing at a temp artifacts root
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("data/prices.csv");
    let series = seasonal_series(200);
    let rows: Vec<(NaiveDate, f64)> = series.iter().collect();
    write_price_csv(&csv, &rows).unwrap();

    let mut config = PipelineConfig::default();
    config.data.csv_path = csv;
    config.artifacts.dir = dir.path().join("artifacts");
    config.residual.n_estimators = 50;

    // WHEN the pipeline runs with a horizon override
    let run_date = d(2025, 2, 1);
    let report = run_pipeline(&config, Some(vec![7, 30]), run_date).unwrap();

    // THEN outputs land under artifacts/2025-02-01
    let run_dir = dir.path().join("artifacts/2025-02-01");
    assert_eq!(report.run_dir, run_dir);
    assert!(run_dir.join("forecast_7d.csv").exists());
    assert!(run_dir.join("forecast_30d.csv").exists());
    assert!(!run_dir.join("forecast_180d.csv").exists());
    assert!(run_dir.join("models/sarimax.json").exists());
    assert!(run_dir.join("models/manifest.json").exists());

    // AND the 30-day table has a header and 30 rows
    let table = read(&run_dir.join("forecast_30d.csv"));
    let mut lines = table.lines();
    assert_eq!(lines.next(), Some("date,forecast,lower_95,upper_95"));
    assert_eq!(lines.count(), 30);

    // AND metrics.json carries both variants
    let metrics: serde_json::Value =
        serde_json::from_str(&read(&report.metrics_path)).unwrap();
    assert!(metrics["baseline_SARIMAX"]["MAE"].is_number());
    assert!(metrics["hybrid"]["RMSE"].is_number());
}

#[test]
fn bdd_scenario_manifest_records_provenance() {
    // GIVEN a trained run
    let series = seasonal_series(120);
    let features = calendar(&series);
    let dir = tempfile::tempdir().unwrap();
    let result = train_models(&series, Some(&features), &settings(20, true), dir.path()).unwrap();

    // WHEN the manifest is read back
    let manifest = ArtifactStore::open(dir.path()).load_manifest().unwrap();

    // THEN it records the data, model orders, split, and metrics
    assert_eq!(manifest.dataset_hash, series.content_hash());
    assert_eq!(manifest.history_end, series.last_date().unwrap());
    assert_eq!(manifest.order, Sarimax::default().order);
    assert_eq!(manifest.split, result.split);
    assert_eq!(manifest.metrics, result.metrics);
    assert_eq!(manifest.residual.unwrap().n_estimators, 50);
}
