//! Basmati Runner: training orchestration, forecasting, and artifacts.
//!
//! This crate builds on `basmati-core` to provide:
//! - TOML pipeline configuration
//! - Holdout evaluation and full-history refits (`train`)
//! - Multi-horizon forecast composition (`forecast`)
//! - Model artifact persistence with a provenance manifest
//! - Forecast table and metrics export
//! - The end-to-end `run_pipeline`

pub mod artifacts;
pub mod config;
pub mod error;
pub mod export;
pub mod forecast;
pub mod pipeline;
pub mod train;

pub use artifacts::{ArtifactError, ArtifactStore, ModelManifest, SCHEMA_VERSION};
pub use config::{ConfigError, PipelineConfig};
pub use error::RunError;
pub use export::{write_forecast_csv, write_forecast_tables, write_metrics_json};
pub use forecast::{compose_forecast, forecast_from_artifacts, ForecastOutput, ForecastRow};
pub use pipeline::{forecast_only, run_pipeline, train_only, PipelineReport};
pub use train::{
    holdout_split, train_models, HoldoutSplit, SplitSummary, TrainMetrics, TrainResult,
    TrainSettings,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }

    #[test]
    fn train_types_are_send_sync() {
        assert_send::<TrainSettings>();
        assert_sync::<TrainSettings>();
        assert_send::<TrainResult>();
        assert_sync::<TrainResult>();
    }

    #[test]
    fn forecast_output_is_send_sync() {
        assert_send::<ForecastOutput>();
        assert_sync::<ForecastOutput>();
    }

    #[test]
    fn artifact_store_is_send_sync() {
        assert_send::<ArtifactStore>();
        assert_sync::<ArtifactStore>();
        assert_send::<ModelManifest>();
        assert_sync::<ModelManifest>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
