//! Seasonal ARIMA baseline.
//!
//! Model: `φ(B)·Φ(Bˢ)·(1 − B)ᵈ·(1 − Bˢ)ᴰ·yₜ = θ(B)·Θ(Bˢ)·εₜ`, no trend term.
//!
//! Coefficients are estimated by conditional sum of squares on the
//! differenced series, minimised with Nelder–Mead. Stationarity is not
//! enforced: AR coefficients range over a wide box that admits explosive
//! roots, so short or noisy price histories fit without spurious failures.
//! MA coefficients are clamped to `[-1, 1]`. Beyond that edge an AR factor
//! and a non-invertible MA factor can cancel, and the sum of squares keeps
//! falling along the ridge without ever reaching a minimum.

use super::optimize::{nelder_mead, NelderMeadConfig};
use super::polynomial;
use super::{BaselineFit, BaselineForecast, BaselineModel};
use crate::error::{ForecastError, Result};
use crate::series::{future_dates, PriceSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;

/// Two-sided interval coverage for forecasts.
pub const INTERVAL_COVERAGE: f64 = 0.95;

/// Search box for AR coefficients (`φ`, `Φ`).
pub const AR_BOUND: f64 = 2.0;
/// Search box for MA coefficients (`θ`, `Θ`).
pub const MA_BOUND: f64 = 1.0;

/// Non-seasonal `(p, d, q)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl Order {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl From<[usize; 3]> for Order {
    fn from([p, d, q]: [usize; 3]) -> Self {
        Self::new(p, d, q)
    }
}

/// Seasonal `(P, D, Q, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

impl SeasonalOrder {
    pub const fn new(p: usize, d: usize, q: usize, period: usize) -> Self {
        Self { p, d, q, period }
    }

    pub const fn none() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn is_active(&self) -> bool {
        self.p + self.d + self.q > 0
    }
}

impl Default for SeasonalOrder {
    fn default() -> Self {
        Self::new(0, 1, 1, 7)
    }
}

impl From<[usize; 4]> for SeasonalOrder {
    fn from([p, d, q, period]: [usize; 4]) -> Self {
        Self::new(p, d, q, period)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

impl fmt::Display for SeasonalOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{},{})", self.p, self.d, self.q, self.period)
    }
}

/// Unfitted SARIMAX specification.
#[derive(Debug, Clone, PartialEq)]
pub struct Sarimax {
    pub order: Order,
    pub seasonal: SeasonalOrder,
    pub optimizer: NelderMeadConfig,
}

impl Default for Sarimax {
    fn default() -> Self {
        Self::new(Order::default(), SeasonalOrder::default())
    }
}

impl Sarimax {
    pub fn new(order: Order, seasonal: SeasonalOrder) -> Self {
        Self {
            order,
            seasonal,
            optimizer: NelderMeadConfig::default(),
        }
    }

    pub fn with_optimizer(mut self, optimizer: NelderMeadConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Effective seasonal period; 0 when no seasonal terms are requested.
    fn period(&self) -> usize {
        if self.seasonal.is_active() {
            self.seasonal.period
        } else {
            0
        }
    }

    fn n_params(&self) -> usize {
        self.order.p + self.order.q + self.seasonal.p + self.seasonal.q
    }

    /// Box bounds in the `[φ…, Φ…, θ…, Θ…]` layout.
    fn bounds(&self) -> Vec<(f64, f64)> {
        let n_ar = self.order.p + self.seasonal.p;
        let n_ma = self.order.q + self.seasonal.q;
        std::iter::repeat((-AR_BOUND, AR_BOUND))
            .take(n_ar)
            .chain(std::iter::repeat((-MA_BOUND, MA_BOUND)).take(n_ma))
            .collect()
    }

    fn describe(&self) -> String {
        format!("SARIMAX{}x{}", self.order, self.seasonal)
    }

    pub fn validate(&self) -> Result<()> {
        if self.seasonal.is_active() && self.seasonal.period < 2 {
            return Err(ForecastError::InvalidConfig(format!(
                "{}: seasonal terms need a period of at least 2",
                self.describe()
            )));
        }
        Ok(())
    }

    /// Unpack a flat parameter vector into the four lag polynomials' coefficients.
    fn polynomials(&self, params: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let (phi, rest) = params.split_at(self.order.p);
        let (seasonal_phi, rest) = rest.split_at(self.seasonal.p);
        let (theta, seasonal_theta) = rest.split_at(self.order.q);
        let s = self.period();
        (
            polynomial::autoregressive(phi, seasonal_phi, s),
            polynomial::moving_average(theta, seasonal_theta, s),
        )
    }

    pub fn fit(&self, series: &PriceSeries) -> Result<SarimaxFit> {
        self.validate()?;
        let y = series.values();
        let s = self.period();

        if s > 0 && y.len() <= s {
            return Err(ForecastError::InsufficientData(format!(
                "{} needs more than {s} observations, got {}",
                self.describe(),
                y.len()
            )));
        }

        let diff_poly = polynomial::differencing(self.order.d, self.seasonal.d, s);
        let offset = diff_poly.len() - 1;
        let warmup = self.order.p + self.seasonal.p * s;
        let w = polynomial::apply(&diff_poly, y);
        if w.len() <= warmup + self.n_params() {
            return Err(ForecastError::InsufficientData(format!(
                "{} needs more than {} observations, got {}",
                self.describe(),
                offset + warmup + self.n_params(),
                y.len()
            )));
        }

        let objective = |params: &[f64]| {
            let (ar, ma) = self.polynomials(params);
            conditional_residuals(&w, &ar, &ma, warmup)
                .iter()
                .map(|e| e * e)
                .sum::<f64>()
        };
        let bounds = self.bounds();
        let minimum = nelder_mead(
            objective,
            &vec![0.0; self.n_params()],
            Some(&bounds),
            &self.optimizer,
        );
        tracing::debug!(
            model = %self.describe(),
            iterations = minimum.iterations,
            css = minimum.value,
            "optimizer finished"
        );

        if !minimum.converged {
            return Err(ForecastError::ModelFit {
                model: self.describe(),
                reason: format!(
                    "optimizer did not converge within {} iterations",
                    self.optimizer.max_iter
                ),
            });
        }

        let params = minimum.point;
        let (ar, ma) = self.polynomials(&params);
        let residuals = conditional_residuals(&w, &ar, &ma, warmup);
        let css: f64 = residuals.iter().map(|e| e * e).sum();
        if !css.is_finite() || params.iter().any(|p| !p.is_finite()) {
            return Err(ForecastError::ModelFit {
                model: self.describe(),
                reason: "non-finite sum of squares at the optimum".into(),
            });
        }
        let sigma2 = css / (w.len() - warmup) as f64;

        // One-step predictions on the price scale: ŷₜ = yₜ − εₜ.
        let fitted: Vec<Option<f64>> = (0..y.len())
            .map(|t| (t >= offset + warmup).then(|| y[t] - residuals[t - offset]))
            .collect();

        let integrated = polynomial::multiply(&ar, &diff_poly);
        let history = tail(y, integrated.len() - 1);
        let innovations = tail(&residuals, ma.len() - 1);

        Ok(SarimaxFit {
            order: self.order,
            seasonal: self.seasonal,
            params,
            sigma2,
            css,
            n_obs: y.len(),
            dates: series.dates().to_vec(),
            fitted,
            integrated_ar: integrated,
            ma,
            history,
            innovations,
        })
    }
}

impl BaselineModel for Sarimax {
    type Fit = SarimaxFit;

    fn fit(&self, series: &PriceSeries) -> Result<SarimaxFit> {
        Sarimax::fit(self, series)
    }
}

/// Innovations of the ARMA recursion over `w`; the first `warmup` are zero.
fn conditional_residuals(w: &[f64], ar: &[f64], ma: &[f64], warmup: usize) -> Vec<f64> {
    let mut e = vec![0.0; w.len()];
    for t in warmup..w.len() {
        let mut value: f64 = ar
            .iter()
            .enumerate()
            .take(t + 1)
            .map(|(i, &c)| c * w[t - i])
            .sum();
        for (j, &m) in ma.iter().enumerate().skip(1).take(t) {
            value -= m * e[t - j];
        }
        e[t] = value;
    }
    e
}

/// Last `n` values, zero-padded at the front when `values` is shorter.
fn tail(values: &[f64], n: usize) -> Vec<f64> {
    let available = &values[values.len().saturating_sub(n)..];
    let mut out = vec![0.0; n - available.len()];
    out.extend_from_slice(available);
    out
}

/// Fitted SARIMAX state.
///
/// Holds the expanded polynomials and the tail of the training data the
/// forecast recursion needs, plus the in-sample one-step predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarimaxFit {
    pub order: Order,
    pub seasonal: SeasonalOrder,
    /// `[φ…, Φ…, θ…, Θ…]`.
    pub params: Vec<f64>,
    pub sigma2: f64,
    pub css: f64,
    pub n_obs: usize,
    dates: Vec<NaiveDate>,
    fitted: Vec<Option<f64>>,
    /// `φ(B)·Φ(Bˢ)·(1 − B)ᵈ·(1 − Bˢ)ᴰ`.
    integrated_ar: Vec<f64>,
    ma: Vec<f64>,
    /// Last `integrated_ar.len() − 1` observations, oldest first.
    history: Vec<f64>,
    /// Last `ma.len() − 1` innovations, oldest first.
    innovations: Vec<f64>,
}

impl SarimaxFit {
    /// ψ-weights of the MA(∞) representation, `ψ₀ = 1`.
    fn psi_weights(&self, n: usize) -> Vec<f64> {
        let c = &self.integrated_ar;
        let mut psi = Vec::with_capacity(n);
        for j in 0..n {
            let mut value = if j == 0 {
                1.0
            } else {
                self.ma.get(j).copied().unwrap_or(0.0)
            };
            for i in 1..=j.min(c.len() - 1) {
                value -= c[i] * psi[j - i];
            }
            psi.push(value);
        }
        psi
    }

    /// Point forecasts for `steps` days with future innovations set to zero.
    fn mean_path(&self, steps: usize) -> Vec<f64> {
        let c = &self.integrated_ar;
        let k = c.len() - 1;
        let q = self.ma.len() - 1;

        let mut y = self.history.clone();
        let base = y.len();
        let mut e = self.innovations.clone();
        let e_base = e.len();
        e.extend(std::iter::repeat(0.0).take(steps));

        for h in 0..steps {
            let t = base + h;
            let et = e_base + h;
            let mut value = 0.0;
            for i in 1..=k {
                value -= c[i] * y[t - i];
            }
            for j in 1..=q {
                value += self.ma[j] * e[et - j];
            }
            y.push(value);
        }
        y.split_off(base)
    }
}

impl BaselineFit for SarimaxFit {
    fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    fn fitted_values(&self) -> &[Option<f64>] {
        &self.fitted
    }

    fn forecast(&self, steps: usize) -> Result<BaselineForecast> {
        let last = self.dates.last().copied().ok_or_else(|| {
            ForecastError::InsufficientData("fit carries no training dates".into())
        })?;
        let z = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::ModelFit {
                model: "SARIMAX".into(),
                reason: e.to_string(),
            })?
            .inverse_cdf(1.0 - (1.0 - INTERVAL_COVERAGE) / 2.0);

        let mean = self.mean_path(steps);
        let psi = self.psi_weights(steps);
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        let mut cumulative = 0.0;
        for (h, m) in mean.iter().enumerate() {
            cumulative += psi[h] * psi[h];
            let half_width = z * (self.sigma2 * cumulative).sqrt();
            lower.push(m - half_width);
            upper.push(m + half_width);
        }

        Ok(BaselineForecast {
            dates: future_dates(last, steps),
            mean,
            lower,
            upper,
        })
    }
}
