//! Derivative-free minimisation (Nelder–Mead simplex).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Relative tolerance on the spread of objective values across the simplex.
    pub ftol: f64,
    /// Absolute tolerance on the simplex diameter.
    pub xtol: f64,
    /// Initial step for each coordinate.
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 10_000,
            ftol: 1e-10,
            xtol: 1e-8,
            initial_step: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimise `objective` starting from `initial`.
///
/// Non-finite objective values are treated as `f64::MAX`, so the simplex
/// walks away from regions where the objective blows up. When `bounds` is
/// given, every trial point is clamped into the `(min, max)` box per
/// coordinate.
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: &NelderMeadConfig,
) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let v = objective(x);
        if v.is_finite() {
            v
        } else {
            f64::MAX
        }
    };

    let n = initial.len();
    if n == 0 {
        return Minimum {
            point: Vec::new(),
            value: eval(initial),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(clamp(initial.to_vec(), bounds));
    for i in 0..n {
        let mut vertex = simplex[0].clone();
        vertex[i] += if vertex[i] != 0.0 {
            config.initial_step * vertex[i].abs().max(1.0)
        } else {
            config.initial_step
        };
        simplex.push(clamp(vertex, bounds));
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iter {
        order_simplex(&mut simplex, &mut values);

        let best = values[0];
        let worst = values[n];
        let spread = (worst - best).abs();
        if spread <= config.ftol * (best.abs() + worst.abs()) + f64::MIN_POSITIVE
            || diameter(&simplex) <= config.xtol
        {
            converged = true;
            break;
        }
        iterations += 1;

        let centroid = centroid(&simplex[..n]);
        let reflected = clamp(step(&centroid, &simplex[n], -REFLECT), bounds);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = clamp(step(&centroid, &simplex[n], -REFLECT * EXPAND), bounds);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }
        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < values[n] {
            let c = clamp(step(&centroid, &simplex[n], -REFLECT * CONTRACT), bounds);
            let f = eval(&c);
            (c, f)
        } else {
            let c = clamp(step(&centroid, &simplex[n], CONTRACT), bounds);
            let f = eval(&c);
            (c, f)
        };
        if f_contracted < values[n].min(f_reflected) {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        let anchor = simplex[0].clone();
        for i in 1..=n {
            for (x, a) in simplex[i].iter_mut().zip(&anchor) {
                *x = a + SHRINK * (*x - a);
            }
            values[i] = eval(&simplex[i]);
        }
    }

    order_simplex(&mut simplex, &mut values);
    Minimum {
        point: simplex.swap_remove(0),
        value: values[0],
        iterations,
        converged,
    }
}

fn order_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *values = order.iter().map(|&i| values[i]).collect();
}

fn centroid(points: &[Vec<f64>]) -> Vec<f64> {
    let n = points.len() as f64;
    let dim = points[0].len();
    (0..dim)
        .map(|j| points.iter().map(|p| p[j]).sum::<f64>() / n)
        .collect()
}

/// `centroid + t·(point − centroid)`.
fn step(centroid: &[f64], point: &[f64], t: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(point)
        .map(|(c, p)| c + t * (p - c))
        .collect()
}

fn clamp(mut point: Vec<f64>, bounds: Option<&[(f64, f64)]>) -> Vec<f64> {
    if let Some(bounds) = bounds {
        for (x, &(lo, hi)) in point.iter_mut().zip(bounds) {
            *x = x.clamp(lo, hi);
        }
    }
    point
}

fn diameter(simplex: &[Vec<f64>]) -> f64 {
    let best = &simplex[0];
    simplex[1..]
        .iter()
        .map(|v| {
            v.iter()
                .zip(best)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max)
        })
        .fold(0.0, f64::max)
}
