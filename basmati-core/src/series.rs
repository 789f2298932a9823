//! Daily price series.
//!
//! A `PriceSeries` is built once from raw observations and never mutated.
//! The daily constructor normalises to a gap-free calendar index by carrying
//! the last known price forward; the point constructor accepts an already
//! ordered (possibly irregular) set of observations, as produced by joining
//! prices with a feature table.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl PriceSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a fixed-frequency daily series.
    ///
    /// Duplicate days are mean-aggregated, missing cells (`None` or NaN) are
    /// treated as gaps, leading gaps are dropped, and every calendar day between
    /// the first observed price and the last date is forward-filled.
    pub fn daily<I>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for (date, value) in points {
            let slot = by_day.entry(date).or_insert((0.0, 0));
            match value {
                Some(v) if v.is_finite() => {
                    check_price(date, v)?;
                    slot.0 += v;
                    slot.1 += 1;
                }
                _ => {}
            }
        }

        let Some(first) = by_day
            .iter()
            .find(|(_, (_, n))| *n > 0)
            .map(|(date, _)| *date)
        else {
            return Ok(Self::empty());
        };
        let last = by_day.keys().next_back().copied().unwrap_or(first);

        let mut dates = Vec::new();
        let mut values = Vec::new();
        let mut carried = f64::NAN;
        for day in first.iter_days().take_while(|d| *d <= last) {
            if let Some(&(sum, n)) = by_day.get(&day) {
                if n > 0 {
                    carried = sum / n as f64;
                }
            }
            dates.push(day);
            values.push(carried);
        }

        Ok(Self { dates, values })
    }

    /// Build from ordered observations without resampling.
    pub fn from_points(points: Vec<(NaiveDate, f64)>) -> Result<Self> {
        let mut dates = Vec::with_capacity(points.len());
        let mut values = Vec::with_capacity(points.len());
        for (date, value) in points {
            if let Some(prev) = dates.last() {
                if date <= *prev {
                    return Err(ForecastError::DataContract(format!(
                        "dates must be strictly increasing: {date} follows {prev}"
                    )));
                }
            }
            if !value.is_finite() {
                return Err(ForecastError::DataContract(format!(
                    "non-finite price on {date}"
                )));
            }
            check_price(date, value)?;
            dates.push(date);
            values.push(value);
        }
        Ok(Self { dates, values })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Calendar days between the first and last date (0 for a single point).
    pub fn span_days(&self) -> i64 {
        match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => (last - first).num_days(),
            _ => 0,
        }
    }

    /// True when consecutive dates are exactly one day apart.
    pub fn is_contiguous(&self) -> bool {
        self.dates
            .windows(2)
            .all(|w| (w[1] - w[0]).num_days() == 1)
    }

    /// Split into (dates ≤ cutoff, dates > cutoff).
    pub fn split_at(&self, cutoff: NaiveDate) -> (PriceSeries, PriceSeries) {
        let at = self.dates.partition_point(|d| *d <= cutoff);
        let head = PriceSeries {
            dates: self.dates[..at].to_vec(),
            values: self.values[..at].to_vec(),
        };
        let tail = PriceSeries {
            dates: self.dates[at..].to_vec(),
            values: self.values[at..].to_vec(),
        };
        (head, tail)
    }

    /// BLAKE3 digest over dates and price bit patterns.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (date, value) in self.iter() {
            hasher.update(date.to_string().as_bytes());
            hasher.update(&value.to_bits().to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// `steps` consecutive days starting the day after `last`.
pub fn future_dates(last: NaiveDate, steps: usize) -> Vec<NaiveDate> {
    last.iter_days().skip(1).take(steps).collect()
}

fn check_price(date: NaiveDate, value: f64) -> Result<()> {
    if value < 0.0 {
        return Err(ForecastError::DataContract(format!(
            "negative price {value} on {date}"
        )));
    }
    Ok(())
}
