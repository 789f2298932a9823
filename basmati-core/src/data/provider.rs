//! Price-source trait, structured errors, and the shared JSON HTTP client.
//!
//! Sources are explicitly constructed clients; nothing here holds process-wide
//! state. Retry with exponential backoff lives in `JsonClient` and nowhere else.

use crate::csv_io::write_price_csv;
use crate::error::ForecastError;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Structured error types for data-source operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("data contract violated: {0}")]
    DataContract(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error(transparent)]
    Write(#[from] ForecastError),
}

/// A source that yields one aggregated price per day.
pub trait PriceSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Daily prices, ascending and unique by date. May be empty.
    fn fetch_daily(&self) -> Result<Vec<(NaiveDate, f64)>, DataError>;
}

/// Fetch from `source` and write a `Date,Price` CSV at `path`.
///
/// An empty result still produces the header row.
pub fn fetch_to_csv(source: &dyn PriceSource, path: &Path) -> Result<usize, DataError> {
    let rows = source.fetch_daily()?;
    if rows.is_empty() {
        tracing::warn!(source = source.name(), "no prices returned; writing header-only table");
    }
    write_price_csv(path, &rows)?;
    tracing::info!(
        source = source.name(),
        rows = rows.len(),
        path = %path.display(),
        "price table written"
    );
    Ok(rows.len())
}

/// Mean price per day, sorted by date. Non-finite prices are skipped.
pub fn daily_mean<I>(points: I) -> Vec<(NaiveDate, f64)>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (date, price) in points.into_iter().filter(|(_, p)| p.is_finite()) {
        let slot = by_day.entry(date).or_insert((0.0, 0));
        slot.0 += price;
        slot.1 += 1;
    }
    by_day
        .into_iter()
        .map(|(date, (sum, n))| (date, sum / n as f64))
        .collect()
}

/// Coerce a JSON scalar to a finite number; numeric strings (with thousands
/// separators) are accepted.
pub fn json_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

pub fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// HTTP behaviour shared by all sources.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Blocking JSON GET client with bounded retry.
pub struct JsonClient {
    client: reqwest::blocking::Client,
    settings: HttpSettings,
}

impl JsonClient {
    pub fn new(settings: HttpSettings) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("basmati-forecast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Client(e.to_string()))?;
        Ok(Self { client, settings })
    }

    /// GET `url` with `query` and decode the JSON body.
    ///
    /// Connection failures, timeouts, 429 and 5xx responses are retried with
    /// exponential backoff; other failures return immediately.
    pub fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = self.settings.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(url, attempt, ?delay, "retrying request");
                std::thread::sleep(delay);
            }

            match self.client.get(url).query(query).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(DataError::AuthenticationRequired(format!(
                            "HTTP {status} from {url}"
                        )));
                    }

                    if status.is_server_error() {
                        last_error = Some(DataError::Http {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                        continue;
                    }

                    if !status.is_success() {
                        return Err(DataError::Http {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }

                    return resp.json::<Value>().map_err(|e| {
                        DataError::ResponseFormatChanged(format!("invalid JSON from {url}: {e}"))
                    });
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::NetworkUnreachable("max retries exceeded".into())))
    }
}

/// Pull the record array out of a response that is either a bare array or an
/// object wrapping one under a well-known key.
pub fn record_array(payload: Value) -> Result<Vec<Value>, DataError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in ["records", "data", "results", "output"] {
                match map.remove(key) {
                    Some(Value::Array(items)) => return Ok(items),
                    Some(Value::Object(inner)) => return record_array(Value::Object(inner)),
                    _ => {}
                }
            }
            Err(DataError::ResponseFormatChanged(
                "response object has no record array".into(),
            ))
        }
        other => Err(DataError::ResponseFormatChanged(format!(
            "expected an array of records, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn daily_mean_groups_and_sorts() {
        let rows = daily_mean(vec![
            (d(2024, 1, 2), 10.0),
            (d(2024, 1, 1), 5.0),
            (d(2024, 1, 2), 20.0),
            (d(2024, 1, 3), f64::NAN),
        ]);
        assert_eq!(rows, vec![(d(2024, 1, 1), 5.0), (d(2024, 1, 2), 15.0)]);
    }

    #[test]
    fn json_number_coerces_strings() {
        assert_eq!(json_number(&json!(12.5)), Some(12.5));
        assert_eq!(json_number(&json!(" 3,450 ")), Some(3450.0));
        assert_eq!(json_number(&json!("NR")), None);
        assert_eq!(json_number(&json!(null)), None);
    }

    #[test]
    fn record_array_unwraps_known_envelopes() {
        assert_eq!(record_array(json!([1, 2])).unwrap().len(), 2);
        assert_eq!(record_array(json!({"records": [1]})).unwrap().len(), 1);
        assert_eq!(
            record_array(json!({"output": {"data": [1, 2, 3]}})).unwrap().len(),
            3
        );
        assert!(matches!(
            record_array(json!("oops")),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    struct Empty;

    impl PriceSource for Empty {
        fn name(&self) -> &str {
            "empty"
        }

        fn fetch_daily(&self) -> Result<Vec<(NaiveDate, f64)>, DataError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn empty_source_writes_header_only_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        let n = fetch_to_csv(&Empty, &path).unwrap();
        assert_eq!(n, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Date,Price\n");
    }
}
