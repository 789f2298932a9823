//! Runner error type.

use crate::artifacts::ArtifactError;
use crate::config::ConfigError;
use basmati_core::ForecastError;
use thiserror::Error;

/// Errors from training and forecast orchestration.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
