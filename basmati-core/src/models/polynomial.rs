//! Lag-operator polynomials.
//!
//! Coefficients are stored in ascending lag order: index `k` multiplies `Bᵏ`.
//! Every polynomial built here has a leading coefficient of 1.

/// Product of two lag polynomials.
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 + sign·(c₁B + c₂B² + …)` with lags spaced `stride` apart.
fn expand(coeffs: &[f64], stride: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coeffs.len() * stride + 1];
    poly[0] = 1.0;
    for (i, &c) in coeffs.iter().enumerate() {
        poly[(i + 1) * stride] = sign * c;
    }
    poly
}

/// `φ(B)·Φ(Bˢ)` where `φ(B) = 1 − φ₁B − …`.
pub fn autoregressive(phi: &[f64], seasonal_phi: &[f64], period: usize) -> Vec<f64> {
    multiply(&expand(phi, 1, -1.0), &expand(seasonal_phi, period.max(1), -1.0))
}

/// `θ(B)·Θ(Bˢ)` where `θ(B) = 1 + θ₁B + …`.
pub fn moving_average(theta: &[f64], seasonal_theta: &[f64], period: usize) -> Vec<f64> {
    multiply(&expand(theta, 1, 1.0), &expand(seasonal_theta, period.max(1), 1.0))
}

/// `(1 − B)ᵈ·(1 − Bˢ)ᴰ`.
pub fn differencing(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    if period > 0 {
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..seasonal_d {
            poly = multiply(&poly, &seasonal);
        }
    }
    poly
}

/// Apply `poly` as a filter: `out[t] = Σₖ poly[k]·x[t + K − k]` for every
/// position with a full lag window, where `K = poly.len() − 1`.
pub fn apply(poly: &[f64], x: &[f64]) -> Vec<f64> {
    let order = poly.len().saturating_sub(1);
    if poly.is_empty() || x.len() <= order {
        return Vec::new();
    }
    (order..x.len())
        .map(|t| poly.iter().enumerate().map(|(k, &c)| c * x[t - k]).sum())
        .collect()
}
