//! Agmarknet mandi prices via the CEDA (Ashoka University) public mirror.
//!
//! Basmati is usually listed as a paddy variety, so the default pull asks for
//! `Paddy` and keeps only varieties matching the basmati keywords.

use super::provider::{
    daily_mean, fetch_to_csv, json_number, json_text, record_array, DataError, JsonClient,
    PriceSource,
};
use crate::csv_io::parse_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

pub const CEDA_BASE_URL: &str = "https://api.ceda.ashoka.edu.in";

pub const DEFAULT_COMMODITY: &str = "Paddy";

pub const DEFAULT_VARIETY_KEYWORDS: [&str; 5] = ["Basmati", "1121", "1509", "1718", "PB-1"];

/// One mandi price report with fields renamed to standard names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MandiPrice {
    pub date: NaiveDate,
    pub state: Option<String>,
    pub district: Option<String>,
    pub market: Option<String>,
    pub commodity: Option<String>,
    pub variety: Option<String>,
    pub unit: Option<String>,
    pub arrivals: Option<f64>,
    pub modal_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl MandiPrice {
    fn from_record(record: &Map<String, Value>) -> Option<Self> {
        let text = |key: &str| record.get(key).and_then(json_text);
        let number = |key: &str| record.get(key).and_then(json_number);
        let date = record.get("date").and_then(json_text).and_then(|s| parse_date(&s))?;
        Some(Self {
            date,
            state: text("state"),
            district: text("district"),
            market: text("market"),
            commodity: text("commodity"),
            variety: text("variety"),
            unit: text("unit"),
            arrivals: number("arrival").or_else(|| number("arrivals")),
            modal_price: number("modal_price"),
            min_price: number("min_price"),
            max_price: number("max_price"),
        })
    }

    /// Case-insensitive substring match of the variety against any keyword.
    pub fn variety_matches(&self, keywords: &[String]) -> bool {
        let Some(variety) = &self.variety else {
            return false;
        };
        let variety = variety.to_lowercase();
        keywords
            .iter()
            .any(|k| variety.contains(&k.to_lowercase()))
    }
}

/// Query for `/agmarknet/prices`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuery {
    pub commodity: String,
    pub variety: Option<String>,
    pub state: Option<String>,
    pub market: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: usize,
}

impl Default for PriceQuery {
    fn default() -> Self {
        Self {
            commodity: DEFAULT_COMMODITY.to_string(),
            variety: None,
            state: None,
            market: None,
            date_from: None,
            date_to: None,
            limit: 100_000,
        }
    }
}

impl PriceQuery {
    fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("commodity".to_string(), self.commodity.clone()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        let optional = [
            ("variety", self.variety.clone()),
            ("state", self.state.clone()),
            ("market", self.market.clone()),
            ("from", self.date_from.map(|d| d.to_string())),
            ("to", self.date_to.map(|d| d.to_string())),
        ];
        params.extend(
            optional
                .into_iter()
                .filter_map(|(k, v)| v.map(|v| (k.to_string(), v))),
        );
        params
    }
}

/// Client for the CEDA Agmarknet endpoints.
pub struct AgmarknetClient {
    http: JsonClient,
    base_url: String,
}

impl AgmarknetClient {
    pub fn new(http: JsonClient) -> Self {
        Self::with_base_url(http, CEDA_BASE_URL)
    }

    pub fn with_base_url(http: JsonClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get(&self, path: &str, params: &[(String, String)]) -> Result<Vec<Value>, DataError> {
        let url = format!("{}{path}", self.base_url);
        record_array(self.http.get_json(&url, params)?)
    }

    pub fn commodities(&self) -> Result<Vec<Value>, DataError> {
        self.get("/agmarknet/commodities", &[])
    }

    pub fn states(&self) -> Result<Vec<Value>, DataError> {
        self.get("/agmarknet/states", &[])
    }

    pub fn markets(
        &self,
        state: Option<&str>,
        district: Option<&str>,
    ) -> Result<Vec<Value>, DataError> {
        let params: Vec<(String, String)> = [("state", state), ("district", district)]
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v.to_string())))
            .collect();
        self.get("/agmarknet/markets", &params)
    }

    pub fn prices(&self, query: &PriceQuery) -> Result<Vec<MandiPrice>, DataError> {
        let records = self.get("/agmarknet/prices", &query.params())?;
        Ok(parse_prices(&records))
    }
}

fn parse_prices(records: &[Value]) -> Vec<MandiPrice> {
    let mut skipped = 0usize;
    let prices: Vec<MandiPrice> = records
        .iter()
        .filter_map(|r| {
            let parsed = r.as_object().and_then(MandiPrice::from_record);
            if parsed.is_none() {
                skipped += 1;
            }
            parsed
        })
        .collect();
    if skipped > 0 {
        tracing::warn!(skipped, "dropped Agmarknet records without a usable date");
    }
    prices
}

/// Collapse mandi reports to one price per day.
///
/// Uses the mean modal price when any report carries one, otherwise the
/// midpoint of the mean min and mean max prices.
pub fn aggregate_daily(prices: &[MandiPrice]) -> Vec<(NaiveDate, f64)> {
    if prices.iter().any(|p| p.modal_price.is_some()) {
        return daily_mean(
            prices
                .iter()
                .filter_map(|p| p.modal_price.map(|v| (p.date, v))),
        );
    }

    let mins = daily_mean(prices.iter().filter_map(|p| p.min_price.map(|v| (p.date, v))));
    let maxs = daily_mean(prices.iter().filter_map(|p| p.max_price.map(|v| (p.date, v))));
    if mins.is_empty() || maxs.is_empty() {
        if !prices.is_empty() {
            tracing::warn!("Agmarknet reports carry no modal or min/max prices");
        }
        return Vec::new();
    }
    let maxs: std::collections::BTreeMap<_, _> = maxs.into_iter().collect();
    mins.into_iter()
        .filter_map(|(date, lo)| maxs.get(&date).map(|hi| (date, (lo + hi) / 2.0)))
        .collect()
}

/// Basmati price pull: commodity query, variety keyword filter, daily aggregation.
pub struct BasmatiSource {
    client: AgmarknetClient,
    query: PriceQuery,
    variety_keywords: Vec<String>,
}

impl BasmatiSource {
    pub fn new(client: AgmarknetClient, query: PriceQuery) -> Self {
        Self {
            client,
            query,
            variety_keywords: DEFAULT_VARIETY_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Replace the variety keywords; an empty list disables filtering.
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.variety_keywords = keywords;
        self
    }
}

impl PriceSource for BasmatiSource {
    fn name(&self) -> &str {
        "agmarknet"
    }

    fn fetch_daily(&self) -> Result<Vec<(NaiveDate, f64)>, DataError> {
        let prices = self.client.prices(&self.query)?;
        let total = prices.len();
        let kept: Vec<MandiPrice> = if self.variety_keywords.is_empty() {
            prices
        } else {
            prices
                .into_iter()
                .filter(|p| p.variety_matches(&self.variety_keywords))
                .collect()
        };
        tracing::info!(
            commodity = %self.query.commodity,
            total,
            kept = kept.len(),
            "filtered Agmarknet reports by variety"
        );
        Ok(aggregate_daily(&kept))
    }
}

/// Pull basmati prices and write them as a `Date,Price` CSV.
///
/// Returns the number of days written; an empty pull writes the header only.
pub fn fetch_basmati_prices_csv(
    client: AgmarknetClient,
    query: PriceQuery,
    variety_keywords: Vec<String>,
    out_csv: &Path,
) -> Result<usize, DataError> {
    let source = BasmatiSource::new(client, query).with_keywords(variety_keywords);
    fetch_to_csv(&source, out_csv)
}
