//! Baseline and residual model roles.
//!
//! The orchestrator only talks to these traits. `Sarimax` fills the baseline
//! role and `GradientBoosting` the residual role.

pub mod gbm;
pub mod optimize;
pub mod polynomial;
pub mod sarimax;
pub mod tree;

pub use gbm::{GbmFit, GbmParams, GradientBoosting};
pub use optimize::NelderMeadConfig;
pub use sarimax::{Order, Sarimax, SarimaxFit, SeasonalOrder, INTERVAL_COVERAGE};

use crate::error::Result;
use crate::series::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Baseline point forecast with its confidence interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineForecast {
    pub dates: Vec<NaiveDate>,
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl BaselineForecast {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Statistical model fitted on prices alone.
pub trait BaselineModel {
    type Fit: BaselineFit;

    fn fit(&self, series: &PriceSeries) -> Result<Self::Fit>;
}

pub trait BaselineFit: Send + Sync {
    /// Training dates, one per fitted value.
    fn dates(&self) -> &[NaiveDate];

    /// In-sample one-step predictions; `None` while the model warms up.
    fn fitted_values(&self) -> &[Option<f64>];

    /// Forecast `steps` days past the last training date.
    fn forecast(&self, steps: usize) -> Result<BaselineForecast>;
}

/// Regressor trained on (feature row, baseline residual) pairs.
pub trait ResidualModel {
    type Fit: ResidualFit;

    fn fit(&self, rows: &[Vec<f64>], residuals: &[f64]) -> Result<Self::Fit>;
}

pub trait ResidualFit: Send + Sync {
    /// One correction per row, in row order.
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;
}
