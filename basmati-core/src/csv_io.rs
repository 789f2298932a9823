//! `Date,Price` table I/O.

use crate::error::{ForecastError, Result};
use crate::series::PriceSeries;
use chrono::NaiveDate;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

pub const DATE_COLUMN: &str = "Date";
pub const PRICE_COLUMN: &str = "Price";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d %b %Y"];

/// Parse a calendar date in any of the formats the price sources emit.
///
/// Timestamps such as `2024-03-01T00:00:00Z` resolve to their date part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
    }
    raw.get(..10)
        .filter(|_| raw.len() > 10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Load a `Date,Price` CSV file into a gap-free daily series.
pub fn load_price_csv(path: &Path) -> Result<PriceSeries> {
    let file = fs::File::open(path)?;
    let series = read_price_table(file)?;
    tracing::debug!(path = %path.display(), rows = series.len(), "loaded price series");
    Ok(series)
}

/// Read a `Date,Price` table from any reader.
///
/// Extra columns are ignored. Empty or `NaN` price cells are gaps and get
/// forward-filled by the daily normalisation.
pub fn read_price_table<R: Read>(reader: R) -> Result<PriceSeries> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let date_idx = column_index(&headers, DATE_COLUMN)?;
    let price_idx = column_index(&headers, PRICE_COLUMN)?;

    let mut points = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let raw_date = record.get(date_idx).unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| {
            ForecastError::DataContract(format!(
                "row {}: unparseable {DATE_COLUMN} '{raw_date}'",
                line + 1
            ))
        })?;
        let raw_price = record.get(price_idx).unwrap_or_default();
        let price = parse_price(raw_price).map_err(|_| {
            ForecastError::DataContract(format!(
                "row {}: malformed {PRICE_COLUMN} '{raw_price}'",
                line + 1
            ))
        })?;
        points.push((date, price));
    }

    PriceSeries::daily(points)
}

/// Write a `Date,Price` CSV. An empty table still gets its header row.
pub fn write_price_csv(path: &Path, rows: &[(NaiveDate, f64)]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    write_price_table(file, rows)
}

pub fn write_price_table<W: Write>(writer: W, rows: &[(NaiveDate, f64)]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([DATE_COLUMN, PRICE_COLUMN])?;
    for (date, price) in rows {
        wtr.write_record([date.format("%Y-%m-%d").to_string(), price.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers.iter().position(|h| h == name).ok_or_else(|| {
        ForecastError::DataContract(format!(
            "CSV must contain '{DATE_COLUMN}' and '{PRICE_COLUMN}' columns (missing '{name}')"
        ))
    })
}

fn parse_price(raw: &str) -> std::result::Result<Option<f64>, std::num::ParseFloatError> {
    let cleaned = raw.replace(',', "");
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    cleaned.parse::<f64>().map(Some)
}
