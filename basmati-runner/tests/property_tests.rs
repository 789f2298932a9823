//! Property tests for the holdout split and forecast composition.
//!
//! Uses proptest to verify:
//! 1. The split partitions the series around the cutoff
//! 2. Every horizon table is a prefix of the longest one
//! 3. Metrics on a perfect prediction are zero

use basmati_core::{BaselineFit, Metrics, PriceSeries, Sarimax};
use basmati_runner::{compose_forecast, holdout_split};
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 6, 1).unwrap()
}

fn arb_prices(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(500.0..5000.0_f64, min_len..max_len)
}

/// Strictly increasing dates with gaps of 1–4 days.
fn arb_sparse_series(max_len: usize) -> impl Strategy<Value = PriceSeries> {
    prop::collection::vec((1i64..5, 1.0..100.0_f64), 2..max_len).prop_map(|steps| {
        let mut date = start_date();
        let points = steps
            .into_iter()
            .map(|(gap, v)| {
                date += Duration::days(gap);
                (date, v)
            })
            .collect();
        PriceSeries::from_points(points).unwrap()
    })
}

fn arb_horizons() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..40, 1..5)
}

fn to_series(values: &[f64]) -> PriceSeries {
    PriceSeries::daily(
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start_date() + Duration::days(i as i64), Some(*v))),
    )
    .unwrap()
}

// ── 1. Holdout split ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn split_partitions_around_cutoff(series in arb_sparse_series(80), frac in 0.01..0.99_f64) {
        let span = series.span_days();
        let days = ((span as f64 * frac) as u32).max(1);
        prop_assume!(i64::from(days) < span);

        if let Ok(split) = holdout_split(&series, days) {
            prop_assert_eq!(split.train.len() + split.test.len(), series.len());
            prop_assert!(split.train.dates().iter().all(|d| *d <= split.cutoff));
            prop_assert!(split.test.dates().iter().all(|d| *d > split.cutoff));
            prop_assert_eq!(
                split.cutoff,
                series.last_date().unwrap() - Duration::days(i64::from(days))
            );
        }
    }

    #[test]
    fn daily_split_has_exact_test_length(values in arb_prices(10, 120), days in 1u32..9) {
        let series = to_series(&values);
        let split = holdout_split(&series, days).unwrap();
        prop_assert_eq!(split.test.len(), days as usize);
        prop_assert_eq!(split.train.len(), values.len() - days as usize);
    }
}

// ── 2. Forecast composition ──────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn horizon_tables_are_prefixes(values in arb_prices(40, 90), horizons in arb_horizons()) {
        let series = to_series(&values);
        let fit = Sarimax::default().fit(&series);
        prop_assume!(fit.is_ok());
        let fit = fit.unwrap();

        let outputs = compose_forecast(&fit, None, &series, None, &horizons).unwrap();
        let longest = outputs.values().last().unwrap();
        let expected_start = series.last_date().unwrap() + Duration::days(1);

        for (h, output) in &outputs {
            prop_assert_eq!(output.rows.len(), *h);
            prop_assert_eq!(&output.rows[..], &longest.rows[..*h]);
            prop_assert_eq!(output.rows[0].date, expected_start);
        }
        prop_assert_eq!(fit.dates().last().copied(), series.last_date());
    }
}

// ── 3. Metrics ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn perfect_prediction_scores_zero(values in arb_prices(1, 50)) {
        let m = Metrics::compute(&values, &values).unwrap();
        prop_assert_eq!(m.mae, 0.0);
        prop_assert_eq!(m.rmse, 0.0);
        prop_assert_eq!(m.mape_pct, Some(0.0));
    }
}
