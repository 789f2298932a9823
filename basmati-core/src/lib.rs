//! Basmati Core: price series, hybrid forecasting models, and data sources.
//!
//! This crate contains:
//! - `PriceSeries` normalisation and `Date,Price` CSV I/O
//! - Feature tables and the `FeatureBuilder` contract
//! - The SARIMAX baseline and the gradient-boosted residual model
//! - Forecast accuracy metrics
//! - Agmarknet and data.gov.in price sources

pub mod csv_io;
pub mod data;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod series;

pub use error::{ForecastError, Result};
pub use features::{align_training_frame, AlignedFrame, CalendarFeatures, FeatureBuilder, FeatureTable};
pub use metrics::Metrics;
pub use models::{
    BaselineFit, BaselineForecast, BaselineModel, GbmFit, GbmParams, GradientBoosting, Order,
    ResidualFit, ResidualModel, Sarimax, SarimaxFit, SeasonalOrder,
};
pub use series::{future_dates, PriceSeries};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: fitted models and data types can cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<PriceSeries>();
        require_sync::<PriceSeries>();
        require_send::<FeatureTable>();
        require_sync::<FeatureTable>();
        require_send::<SarimaxFit>();
        require_sync::<SarimaxFit>();
        require_send::<GbmFit>();
        require_sync::<GbmFit>();
        require_send::<Metrics>();
        require_sync::<Metrics>();
    }

    /// The composer works through trait objects, so both roles must stay object safe.
    #[test]
    fn model_roles_are_object_safe() {
        fn _baseline(fit: &dyn BaselineFit) -> Result<BaselineForecast> {
            fit.forecast(1)
        }
        fn _residual(fit: &dyn ResidualFit) -> Result<Vec<f64>> {
            fit.predict(&[])
        }
    }
}
