//! Forecast tables and metrics on disk.

use crate::forecast::ForecastOutput;
use crate::train::TrainMetrics;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORECAST_HEADER: &str = "date,forecast,lower_95,upper_95";

/// `{prefix}_{h}d.csv`
pub fn forecast_file_name(prefix: &str, horizon: usize) -> String {
    format!("{prefix}_{horizon}d.csv")
}

/// Values are written at full precision and parse back to the same `f64`.
pub fn write_forecast_csv(path: &Path, output: &ForecastOutput) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create forecast CSV {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{FORECAST_HEADER}")?;
    for row in &output.rows {
        writeln!(
            out,
            "{},{},{},{}",
            row.date, row.forecast, row.lower_95, row.upper_95
        )?;
    }
    out.flush()
        .with_context(|| format!("Failed to write forecast CSV {}", path.display()))?;
    Ok(())
}

/// Write one table per horizon into `dir`, in ascending horizon order.
pub fn write_forecast_tables(
    dir: &Path,
    prefix: &str,
    outputs: &BTreeMap<usize, ForecastOutput>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let mut paths = Vec::with_capacity(outputs.len());
    for (&h, output) in outputs {
        let path = dir.join(forecast_file_name(prefix, h));
        write_forecast_csv(&path, output)?;
        tracing::debug!(horizon = h, path = %path.display(), "forecast table written");
        paths.push(path);
    }
    Ok(paths)
}

pub fn write_metrics_json(path: &Path, metrics: &TrainMetrics) -> Result<()> {
    let json = serde_json::to_string_pretty(metrics).context("Failed to serialize metrics")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write metrics {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastRow;
    use chrono::NaiveDate;

    fn output(h: usize) -> ForecastOutput {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        ForecastOutput {
            horizon: h,
            rows: (0..h)
                .map(|i| ForecastRow {
                    date: start + chrono::Duration::days(i as i64),
                    forecast: 100.0 + i as f64,
                    lower_95: 90.0,
                    upper_95: 110.125,
                })
                .collect(),
        }
    }

    #[test]
    fn csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.csv");
        write_forecast_csv(&path, &output(2)).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "date,forecast,lower_95,upper_95\n\
             2024-06-01,100,90,110.125\n\
             2024-06-02,101,90,110.125\n"
        );
    }

    #[test]
    fn values_keep_full_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.csv");
        let mut out = output(1);
        out.rows[0].forecast = 1.0 / 3.0;
        out.rows[0].upper_95 = 2.0_f64.sqrt() * 1e3;
        write_forecast_csv(&path, &out).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let fields: Vec<&str> = text.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(fields[1].parse::<f64>().unwrap(), 1.0 / 3.0);
        assert_eq!(fields[3].parse::<f64>().unwrap(), 2.0_f64.sqrt() * 1e3);
    }

    #[test]
    fn empty_output_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.csv");
        write_forecast_csv(&path, &output(0)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "date,forecast,lower_95,upper_95\n");
    }

    #[test]
    fn tables_are_named_by_prefix_and_horizon() {
        let dir = tempfile::tempdir().unwrap();
        let outputs: BTreeMap<usize, ForecastOutput> =
            [(30, output(30)), (7, output(7))].into_iter().collect();
        let paths = write_forecast_tables(&dir.path().join("out"), "basmati", &outputs).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["basmati_7d.csv", "basmati_30d.csv"]);
        assert!(paths.iter().all(|p| p.exists()));
    }
}
