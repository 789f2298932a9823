//! Gradient-boosted regression trees for baseline residuals.
//!
//! Squared-error boosting with row and column subsampling per tree. The
//! random stream is seeded from `GbmParams::seed`, so a fit is a pure
//! function of its inputs and parameters.

use super::tree::{RegressionTree, TreeParams};
use super::{ResidualFit, ResidualModel};
use crate::error::{ForecastError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows drawn (without replacement) for each tree.
    pub subsample: f64,
    /// Fraction of feature columns drawn for each tree.
    pub colsample_bytree: f64,
    pub reg_lambda: f64,
    pub min_child_weight: f64,
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 400,
            max_depth: 4,
            learning_rate: 0.05,
            subsample: 0.9,
            colsample_bytree: 0.9,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
            seed: 42,
        }
    }
}

impl GbmParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        for (name, value) in [
            ("subsample", self.subsample),
            ("colsample_bytree", self.colsample_bytree),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ForecastError::InvalidConfig(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if self.reg_lambda < 0.0 || self.min_child_weight < 0.0 {
            return Err(ForecastError::InvalidConfig(
                "reg_lambda and min_child_weight must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradientBoosting {
    pub params: GbmParams,
}

impl GradientBoosting {
    pub fn new(params: GbmParams) -> Self {
        Self { params }
    }

    pub fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> Result<GbmFit> {
        self.params.validate()?;
        if rows.len() != targets.len() {
            return Err(ForecastError::FeatureAlignment(format!(
                "{} feature rows for {} residuals",
                rows.len(),
                targets.len()
            )));
        }
        if rows.is_empty() {
            return Err(ForecastError::InsufficientData(
                "no residuals to train on".into(),
            ));
        }
        let n_features = rows[0].len();
        if rows.iter().any(|r| r.len() != n_features) {
            return Err(ForecastError::FeatureAlignment(
                "feature rows have inconsistent widths".into(),
            ));
        }
        if targets.iter().any(|t| !t.is_finite())
            || rows.iter().flatten().any(|v| !v.is_finite())
        {
            return Err(ForecastError::DataContract(
                "residual training data contains non-finite values".into(),
            ));
        }

        let n = rows.len();
        let base_score = targets.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![base_score; n];
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            reg_lambda: self.params.reg_lambda,
            min_child_weight: self.params.min_child_weight,
            shrinkage: self.params.learning_rate,
        };

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        for _ in 0..self.params.n_estimators {
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(targets)
                .map(|(p, y)| p - y)
                .collect();
            let sample = draw(&mut rng, n, self.params.subsample);
            let columns = draw(&mut rng, n_features, self.params.colsample_bytree);
            let tree = RegressionTree::grow(rows, &gradients, &sample, &columns, tree_params);
            for (p, row) in predictions.iter_mut().zip(rows) {
                *p += tree.predict(row);
            }
            trees.push(tree);
        }

        tracing::debug!(
            trees = trees.len(),
            rows = n,
            features = n_features,
            "residual model trained"
        );

        Ok(GbmFit {
            params: self.params.clone(),
            base_score,
            n_features,
            trees,
        })
    }
}

impl ResidualModel for GradientBoosting {
    type Fit = GbmFit;

    fn fit(&self, rows: &[Vec<f64>], residuals: &[f64]) -> Result<GbmFit> {
        GradientBoosting::fit(self, rows, residuals)
    }
}

/// Sorted indices of a `fraction` share of `0..n`, at least one.
fn draw(rng: &mut StdRng, n: usize, fraction: f64) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let k = ((fraction * n as f64).round() as usize).clamp(1, n);
    if k == n {
        return (0..n).collect();
    }
    let mut picked = rand::seq::index::sample(rng, n, k).into_vec();
    picked.sort_unstable();
    picked
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmFit {
    pub params: GbmParams,
    pub base_score: f64,
    pub n_features: usize,
    trees: Vec<RegressionTree>,
}

impl GbmFit {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }
}

impl ResidualFit for GbmFit {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if let Some(bad) = rows.iter().find(|r| r.len() != self.n_features) {
            return Err(ForecastError::FeatureAlignment(format!(
                "model expects {} features, row has {}",
                self.n_features,
                bad.len()
            )));
        }
        Ok(rows.iter().map(|r| self.predict_row(r)).collect())
    }
}
