//! Error taxonomy for the forecasting core.

use thiserror::Error;

/// Errors raised while loading series, fitting models, or composing forecasts.
///
/// Every variant propagates to the caller. Degradations that are not failures
/// (missing features, missing residual artifact) are handled by the caller and
/// logged, they never surface here.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Missing or malformed `Date`/`Price` column, unparseable cell, negative price.
    #[error("data contract violated: {0}")]
    DataContract(String),

    /// Empty holdout partition, or a series too short for the requested orders.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Optimizer failed to converge or produced a non-finite fit.
    #[error("{model} fit failed: {reason}")]
    ModelFit { model: String, reason: String },

    /// Feature rows and targets cannot be paired.
    #[error("feature alignment: {0}")]
    FeatureAlignment(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
