//! Supervised feature tables and the builders that produce them.

use crate::error::{ForecastError, Result};
use crate::series::PriceSeries;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

/// Date-indexed table of fixed-width numeric rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<f64>>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// Insert or replace the row for `date`.
    pub fn insert(&mut self, date: NaiveDate, row: Vec<f64>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ForecastError::FeatureAlignment(format!(
                "row for {date} has {} values, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.insert(date, row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&[f64]> {
        self.rows.get(&date).map(Vec::as_slice)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.rows.contains_key(&date)
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    /// True when at least one of `dates` has a row.
    pub fn overlaps(&self, dates: &[NaiveDate]) -> bool {
        dates.iter().any(|d| self.rows.contains_key(d))
    }

    /// Rows for `dates`, in that order. Every date must be present.
    pub fn rows_for(&self, dates: &[NaiveDate]) -> Result<Vec<Vec<f64>>> {
        dates
            .iter()
            .map(|d| {
                self.rows.get(d).cloned().ok_or_else(|| {
                    ForecastError::FeatureAlignment(format!("no feature row for {d}"))
                })
            })
            .collect()
    }
}

/// Produces a feature table over a date index, or nothing.
///
/// Implementations must be pure: the same history and index always yield the
/// same table.
pub trait FeatureBuilder: Send + Sync {
    fn name(&self) -> &str;

    fn build(&self, history: &PriceSeries, index: &[NaiveDate]) -> Option<FeatureTable>;
}

/// Calendar features, defined for any date including future ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarFeatures;

impl CalendarFeatures {
    pub const COLUMNS: [&'static str; 6] = [
        "dayofweek",
        "day",
        "month",
        "weekofyear",
        "dayofyear",
        "quarter",
    ];

    fn row(date: NaiveDate) -> Vec<f64> {
        vec![
            f64::from(date.weekday().num_days_from_monday()),
            f64::from(date.day()),
            f64::from(date.month()),
            f64::from(date.iso_week().week()),
            f64::from(date.ordinal()),
            f64::from((date.month() - 1) / 3 + 1),
        ]
    }
}

impl FeatureBuilder for CalendarFeatures {
    fn name(&self) -> &str {
        "calendar"
    }

    fn build(&self, _history: &PriceSeries, index: &[NaiveDate]) -> Option<FeatureTable> {
        if index.is_empty() {
            return None;
        }
        let mut table = FeatureTable::new(Self::COLUMNS.iter().map(|c| c.to_string()).collect());
        for &date in index {
            table.rows.insert(date, Self::row(date));
        }
        Some(table)
    }
}

/// Prices joined with their feature rows.
#[derive(Debug, Clone)]
pub struct AlignedFrame {
    pub series: PriceSeries,
    pub rows: Vec<Vec<f64>>,
}

/// Inner-join a price series with a feature table on shared dates.
///
/// Dates missing either side are dropped. A join with no surviving rows is a
/// `FeatureAlignment` error so the caller can fall back to baseline-only.
pub fn align_training_frame(series: &PriceSeries, features: &FeatureTable) -> Result<AlignedFrame> {
    let mut points = Vec::new();
    let mut rows = Vec::new();
    for (date, price) in series.iter() {
        if let Some(row) = features.get(date) {
            if row.iter().all(|v| v.is_finite()) {
                points.push((date, price));
                rows.push(row.to_vec());
            }
        }
    }
    if points.is_empty() {
        return Err(ForecastError::FeatureAlignment(
            "feature table shares no dates with the price series".into(),
        ));
    }
    Ok(AlignedFrame {
        series: PriceSeries::from_points(points)?,
        rows,
    })
}
