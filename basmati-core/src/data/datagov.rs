//! data.gov.in CKAN resources (e.g. retail and wholesale prices of essential
//! commodities).
//!
//! Field names differ between resources, so date and price fields are detected
//! from the records rather than fixed.

use super::provider::{
    daily_mean, fetch_to_csv, json_number, json_text, record_array, DataError, JsonClient,
    PriceSource,
};
use crate::csv_io::parse_date;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

pub const DATAGOV_BASE_URL: &str = "https://api.data.gov.in/resource";

pub const PAGE_LIMIT: usize = 1000;

pub const DATE_FIELDS: [&str; 3] = ["date", "reported_date", "price_date"];

pub const PRICE_FIELDS: [&str; 4] = ["retail", "wholesale", "modal_price", "price"];

#[derive(Debug, Clone, PartialEq)]
pub struct DataGovQuery {
    pub resource_id: String,
    pub commodity: Option<String>,
    pub state: Option<String>,
    pub centre: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl DataGovQuery {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            commodity: Some("Rice".to_string()),
            state: None,
            centre: None,
            date_from: None,
            date_to: None,
        }
    }

    /// Exact-match CKAN filters; substring matching happens after download.
    fn filters(&self) -> Option<String> {
        let filters: BTreeMap<&str, &str> = [
            ("commodity", self.commodity.as_deref()),
            ("state", self.state.as_deref()),
            ("centre", self.centre.as_deref()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.filter(|v| !v.is_empty()).map(|v| (k, v)))
        .collect();
        if filters.is_empty() {
            None
        } else {
            serde_json::to_string(&filters).ok()
        }
    }

    fn params(&self, api_key: &str, offset: usize) -> Vec<(String, String)> {
        let mut params = vec![
            ("api-key".to_string(), api_key.to_string()),
            ("format".to_string(), "json".to_string()),
            ("limit".to_string(), PAGE_LIMIT.to_string()),
            ("offset".to_string(), offset.to_string()),
        ];
        if let Some(from) = self.date_from {
            params.push(("from".into(), from.to_string()));
        }
        if let Some(to) = self.date_to {
            params.push(("to".into(), to.to_string()));
        }
        if let Some(filters) = self.filters() {
            params.push(("filters".into(), filters));
        }
        params
    }
}

pub struct DataGovClient {
    http: JsonClient,
    api_key: String,
    base_url: String,
}

impl DataGovClient {
    pub fn new(http: JsonClient, api_key: impl Into<String>) -> Self {
        Self::with_base_url(http, api_key, DATAGOV_BASE_URL)
    }

    pub fn with_base_url(http: JsonClient, api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// All records of the resource, following `offset` pagination until a
    /// page comes back short.
    pub fn fetch_records(&self, query: &DataGovQuery) -> Result<Vec<Map<String, Value>>, DataError> {
        let url = format!("{}/{}", self.base_url, query.resource_id);
        let mut offset = 0;
        let mut all = Vec::new();
        loop {
            let payload = self.http.get_json(&url, &query.params(&self.api_key, offset))?;
            let page = record_array(payload)?;
            let n = page.len();
            all.extend(page.into_iter().filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            }));
            tracing::debug!(offset, records = n, "fetched data.gov.in page");
            if n < PAGE_LIMIT {
                break;
            }
            offset += PAGE_LIMIT;
        }
        Ok(all)
    }
}

/// Lowercase every field name.
fn normalise_keys(records: Vec<Map<String, Value>>) -> Vec<Map<String, Value>> {
    records
        .into_iter()
        .map(|r| r.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect())
        .collect()
}

fn has_field(records: &[Map<String, Value>], field: &str) -> bool {
    records.iter().any(|r| r.contains_key(field))
}

/// Keep records whose `field` contains `needle` (case-insensitive). A field
/// absent from every record leaves the set untouched.
fn contains_filter(
    records: Vec<Map<String, Value>>,
    field: &str,
    needle: Option<&str>,
) -> Vec<Map<String, Value>> {
    let Some(needle) = needle.filter(|n| !n.is_empty()) else {
        return records;
    };
    if !has_field(&records, field) {
        return records;
    }
    let needle = needle.to_lowercase();
    records
        .into_iter()
        .filter(|r| {
            r.get(field)
                .and_then(json_text)
                .map_or(false, |v| v.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Choose the price field: a known name, else the first field (excluding the
/// date field) with at least one numeric value.
fn detect_price_field(records: &[Map<String, Value>], date_field: &str) -> Option<String> {
    if let Some(known) = PRICE_FIELDS.iter().find(|f| has_field(records, f)) {
        return Some(known.to_string());
    }
    let mut fields: Vec<&String> = records.iter().flat_map(|r| r.keys()).collect();
    fields.sort();
    fields.dedup();
    fields
        .into_iter()
        .filter(|f| f.as_str() != date_field)
        .find(|f| records.iter().any(|r| r.get(*f).and_then(json_number).is_some()))
        .cloned()
}

/// Reduce raw resource records to one mean price per day.
pub fn daily_prices(
    records: Vec<Map<String, Value>>,
    query: &DataGovQuery,
) -> Result<Vec<(NaiveDate, f64)>, DataError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let records = normalise_keys(records);
    let records = contains_filter(records, "commodity", query.commodity.as_deref());
    let records = contains_filter(records, "state", query.state.as_deref());
    let records = contains_filter(records, "centre", query.centre.as_deref());
    if records.is_empty() {
        tracing::info!(resource = %query.resource_id, "no records left after filtering");
        return Ok(Vec::new());
    }

    let date_field = DATE_FIELDS
        .iter()
        .find(|f| has_field(&records, f))
        .ok_or_else(|| {
            DataError::DataContract(
                "no date field (date, reported_date, price_date) in the resource".into(),
            )
        })?;
    let price_field = detect_price_field(&records, date_field).ok_or_else(|| {
        DataError::DataContract("no numeric price field in the resource".into())
    })?;
    tracing::debug!(date_field, price_field = %price_field, "detected data.gov.in fields");

    let mut points = Vec::with_capacity(records.len());
    for record in &records {
        let Some(raw_date) = record.get(*date_field).and_then(json_text) else {
            continue;
        };
        let date = parse_date(&raw_date).ok_or_else(|| {
            DataError::DataContract(format!("unparseable {date_field} '{raw_date}'"))
        })?;
        if let Some(price) = record.get(&price_field).and_then(json_number) {
            points.push((date, price));
        }
    }
    Ok(daily_mean(points))
}

/// data.gov.in as a daily price source.
pub struct DataGovSource {
    client: DataGovClient,
    query: DataGovQuery,
}

impl DataGovSource {
    pub fn new(client: DataGovClient, query: DataGovQuery) -> Self {
        Self { client, query }
    }
}

impl PriceSource for DataGovSource {
    fn name(&self) -> &str {
        "data.gov.in"
    }

    fn fetch_daily(&self) -> Result<Vec<(NaiveDate, f64)>, DataError> {
        let records = self.client.fetch_records(&self.query)?;
        tracing::info!(
            resource = %self.query.resource_id,
            records = records.len(),
            "fetched data.gov.in records"
        );
        daily_prices(records, &self.query)
    }
}

/// Pull a resource and write its daily prices as a `Date,Price` CSV.
pub fn fetch_datagov_prices_csv(
    client: DataGovClient,
    query: DataGovQuery,
    out_csv: &Path,
) -> Result<usize, DataError> {
    fetch_to_csv(&DataGovSource::new(client, query), out_csv)
}
