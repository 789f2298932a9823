//! Point-forecast accuracy metrics.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accuracy of a point forecast against actuals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    /// Mean absolute percentage error over rows with a non-zero actual.
    /// `None` when every actual is zero.
    #[serde(rename = "MAPE_pct")]
    pub mape_pct: Option<f64>,
}

impl Metrics {
    /// Compare predictions to actuals, pairwise by position.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(ForecastError::FeatureAlignment(format!(
                "metric inputs differ in length: {} actual vs {} predicted",
                actual.len(),
                predicted.len()
            )));
        }
        if actual.is_empty() {
            return Err(ForecastError::InsufficientData(
                "cannot score an empty holdout".into(),
            ));
        }

        let n = actual.len() as f64;
        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        let mut pct_sum = 0.0;
        let mut pct_n = 0usize;
        for (&a, &p) in actual.iter().zip(predicted) {
            let err = a - p;
            abs_sum += err.abs();
            sq_sum += err * err;
            if a != 0.0 {
                pct_sum += (err / a).abs();
                pct_n += 1;
            }
        }

        Ok(Self {
            mae: abs_sum / n,
            rmse: (sq_sum / n).sqrt(),
            mape_pct: (pct_n > 0).then(|| pct_sum / pct_n as f64 * 100.0),
        })
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MAE={:.4} RMSE={:.4}", self.mae, self.rmse)?;
        match self.mape_pct {
            Some(m) => write!(f, " MAPE={m:.2}%"),
            None => write!(f, " MAPE=n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_forecast_scores_zero() {
        let m = Metrics::compute(&[1.0, 2.0], &[1.0, 2.0]).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mape_pct, Some(0.0));
    }

    #[test]
    fn zero_actual_is_excluded_from_mape_only() {
        let m = Metrics::compute(&[0.0, 100.0], &[10.0, 110.0]).unwrap();
        assert!((m.mae - 10.0).abs() < 1e-12);
        assert!((m.rmse - 10.0).abs() < 1e-12);
        assert!((m.mape_pct.unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn all_zero_actuals_leave_mape_undefined() {
        let m = Metrics::compute(&[0.0, 0.0], &[1.0, 3.0]).unwrap();
        assert_eq!(m.mape_pct, None);
        assert!((m.mae - 2.0).abs() < 1e-12);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(Metrics::compute(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn serializes_with_report_keys() {
        let m = Metrics::compute(&[2.0], &[1.0]).unwrap();
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json["MAE"], 1.0);
        assert_eq!(json["MAPE_pct"], 50.0);
    }
}
