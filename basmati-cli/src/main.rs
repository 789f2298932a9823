//! Basmati CLI: fetch prices, train models, and write forecasts.
//!
//! Commands:
//! - `run-all`: train on the configured CSV and write every forecast table
//! - `train`: train and save models without forecasting
//! - `forecast`: forecast from a saved models directory
//! - `fetch-agmarknet`: pull basmati mandi prices into a `Date,Price` CSV
//! - `fetch-datagov`: pull a data.gov.in resource into a `Date,Price` CSV

use anyhow::{bail, Context, Result};
use basmati_core::data::{
    fetch_basmati_prices_csv, fetch_datagov_prices_csv, AgmarknetClient, DataGovClient,
    DataGovQuery, HttpSettings, JsonClient, PriceQuery,
};
use basmati_runner::pipeline::{forecast_only, run_pipeline, train_only, MODELS_DIR};
use basmati_runner::PipelineConfig;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DATAGOV_KEY_ENV: &str = "DATAGOV_API_KEY";

#[derive(Parser)]
#[command(name = "basmati", about = "Basmati Forecast CLI: hybrid SARIMAX + boosted-tree price forecasts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on the configured price CSV and write forecasts for every horizon.
    RunAll {
        /// Path to the TOML config file. Missing file means all defaults.
        #[arg(long, default_value = "basmati.toml")]
        config: PathBuf,

        /// Forecast horizons in days, e.g. --horizons 7 30 180.
        #[arg(long, num_args = 1..)]
        horizons: Option<Vec<usize>>,

        /// Run date used to name the output directory (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        run_date: Option<String>,
    },
    /// Train and save models without forecasting.
    Train {
        #[arg(long, default_value = "basmati.toml")]
        config: PathBuf,

        /// Models directory. Defaults to {artifacts.dir}/{today}/models.
        #[arg(long)]
        models_dir: Option<PathBuf>,
    },
    /// Forecast from previously saved models.
    Forecast {
        #[arg(long, default_value = "basmati.toml")]
        config: PathBuf,

        /// Directory holding sarimax.json (and optionally gbm.json).
        #[arg(long)]
        models_dir: PathBuf,

        /// Where to write the forecast tables. Defaults to the models directory's parent.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[arg(long, num_args = 1..)]
        horizons: Option<Vec<usize>>,
    },
    /// Fetch basmati paddy prices from Agmarknet (CEDA mirror) into a CSV.
    FetchAgmarknet {
        /// Where to save the filtered CSV.
        #[arg(long, default_value = "data/basmati_prices.csv")]
        out_csv: PathBuf,

        /// State filter, e.g. 'Haryana'.
        #[arg(long)]
        state: Option<String>,

        /// Market/mandi filter, e.g. 'Karnal'.
        #[arg(long)]
        market: Option<String>,

        /// Comma-separated variety keywords to match.
        #[arg(long, default_value = "Basmati,1121,1509,1718,PB-1")]
        variety_keywords: String,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        date_from: Option<String>,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        date_to: Option<String>,

        /// Commodity name (basmati is usually listed under 'Paddy').
        #[arg(long, default_value = "Paddy")]
        commodity: String,
    },
    /// Fetch a data.gov.in price resource into a CSV.
    FetchDatagov {
        /// data.gov.in API key. Falls back to the DATAGOV_API_KEY environment variable.
        #[arg(long)]
        api_key: Option<String>,

        /// CKAN resource id of the dataset.
        #[arg(long)]
        resource_id: String,

        /// Where to save the CSV.
        #[arg(long, default_value = "data/basmati_prices.csv")]
        out_csv: PathBuf,

        /// Commodity filter (dataset dependent).
        #[arg(long, default_value = "Rice")]
        commodity: String,

        #[arg(long)]
        state: Option<String>,

        /// Centre/city filter.
        #[arg(long)]
        centre: Option<String>,

        #[arg(long)]
        date_from: Option<String>,

        #[arg(long)]
        date_to: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("basmati=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunAll {
            config,
            horizons,
            run_date,
        } => run_all(&config, horizons, run_date.as_deref()),
        Commands::Train { config, models_dir } => run_train(&config, models_dir),
        Commands::Forecast {
            config,
            models_dir,
            out_dir,
            horizons,
        } => run_forecast(&config, &models_dir, out_dir, horizons),
        Commands::FetchAgmarknet {
            out_csv,
            state,
            market,
            variety_keywords,
            date_from,
            date_to,
            commodity,
        } => {
            let query = PriceQuery {
                commodity,
                state,
                market,
                date_from: parse_optional_date(date_from.as_deref())?,
                date_to: parse_optional_date(date_to.as_deref())?,
                ..PriceQuery::default()
            };
            let client = AgmarknetClient::new(JsonClient::new(HttpSettings::default())?);
            let rows = fetch_basmati_prices_csv(
                client,
                query,
                split_keywords(&variety_keywords),
                &out_csv,
            )?;
            println!("Saved: {} ({rows} days)", out_csv.display());
            Ok(())
        }
        Commands::FetchDatagov {
            api_key,
            resource_id,
            out_csv,
            commodity,
            state,
            centre,
            date_from,
            date_to,
        } => {
            let api_key = match api_key.or_else(|| std::env::var(DATAGOV_KEY_ENV).ok()) {
                Some(key) if !key.trim().is_empty() => key,
                _ => bail!("--api-key or {DATAGOV_KEY_ENV} is required"),
            };
            let query = DataGovQuery {
                commodity: Some(commodity),
                state,
                centre,
                date_from: parse_optional_date(date_from.as_deref())?,
                date_to: parse_optional_date(date_to.as_deref())?,
                ..DataGovQuery::new(resource_id)
            };
            let client = DataGovClient::new(JsonClient::new(HttpSettings::default())?, api_key);
            let rows = fetch_datagov_prices_csv(client, query, &out_csv)?;
            println!("Saved: {} ({rows} days)", out_csv.display());
            Ok(())
        }
    }
}

/// A missing config file means defaults; a present but invalid one is an error.
fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        info!(path = %path.display(), "config file not found; using defaults");
        return Ok(PipelineConfig::default());
    }
    PipelineConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn run_all(config_path: &Path, horizons: Option<Vec<usize>>, run_date: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let run_date = parse_optional_date(run_date)?.unwrap_or_else(today);
    let report = run_pipeline(&config, horizons, run_date)?;

    println!("Baseline (SARIMAX): {}", report.metrics().baseline);
    println!("Hybrid:             {}", report.metrics().hybrid);
    for path in &report.forecast_paths {
        println!("Saved: {}", path.display());
    }
    println!("Metrics: {}", report.metrics_path.display());
    Ok(())
}

fn run_train(config_path: &Path, models_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let models_dir = models_dir.unwrap_or_else(|| {
        basmati_runner::pipeline::run_dir(&config.artifacts.dir, today()).join(MODELS_DIR)
    });
    let result = train_only(&config, &models_dir)?;
    println!("{}", serde_json::to_string_pretty(&result.metrics)?);
    println!("Models saved to: {}", models_dir.display());
    Ok(())
}

fn run_forecast(
    config_path: &Path,
    models_dir: &Path,
    out_dir: Option<PathBuf>,
    horizons: Option<Vec<usize>>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let out_dir = out_dir.unwrap_or_else(|| {
        models_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    for path in forecast_only(&config, models_dir, &out_dir, horizons)? {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
    })
    .transpose()
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_trimmed_and_nonempty() {
        assert_eq!(
            split_keywords(" Basmati, 1121 ,,PB-1 "),
            vec!["Basmati", "1121", "PB-1"]
        );
    }

    #[test]
    fn dates_parse_iso_only() {
        assert_eq!(
            parse_optional_date(Some("2024-02-29")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert!(parse_optional_date(Some("29/02/2024")).is_err());
        assert_eq!(parse_optional_date(None).unwrap(), None);
    }

    #[test]
    fn cli_parses_horizon_list() {
        let cli = Cli::try_parse_from(["basmati", "run-all", "--horizons", "7", "30"]).unwrap();
        match cli.command {
            Commands::RunAll { horizons, .. } => assert_eq!(horizons, Some(vec![7, 30])),
            _ => panic!("expected run-all"),
        }
    }

    #[test]
    fn missing_config_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/basmati.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
