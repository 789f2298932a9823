//! Pipeline configuration (TOML).
//!
//! Every section and field has a default, so an empty file is a valid config.

use basmati_core::{GbmParams, Order, Sarimax, SeasonalOrder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full configuration for a train-and-forecast run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub artifacts: ArtifactsConfig,
    pub sarimax: SarimaxConfig,
    pub training: TrainingConfig,
    pub residual: ResidualConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// `Date,Price` CSV with the price history.
    pub csv_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/basmati_prices.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Root directory; each run writes into a dated subdirectory.
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarimaxConfig {
    /// `[p, d, q]`
    pub order: [usize; 3],
    /// `[P, D, Q, s]`
    pub seasonal_order: [usize; 4],
}

impl Default for SarimaxConfig {
    fn default() -> Self {
        Self {
            order: [1, 1, 1],
            seasonal_order: [0, 1, 1, 7],
        }
    }
}

impl SarimaxConfig {
    pub fn model(&self) -> Sarimax {
        Sarimax::new(Order::from(self.order), SeasonalOrder::from(self.seasonal_order))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Trailing holdout length in calendar days.
    pub test_size_days: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self { test_size_days: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidualConfig {
    pub enabled: bool,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub seed: u64,
}

impl Default for ResidualConfig {
    fn default() -> Self {
        let p = GbmParams::default();
        Self {
            enabled: true,
            n_estimators: p.n_estimators,
            max_depth: p.max_depth,
            learning_rate: p.learning_rate,
            subsample: p.subsample,
            colsample_bytree: p.colsample_bytree,
            seed: p.seed,
        }
    }
}

impl ResidualConfig {
    pub fn params(&self) -> GbmParams {
        GbmParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            learning_rate: self.learning_rate,
            subsample: self.subsample,
            colsample_bytree: self.colsample_bytree,
            seed: self.seed,
            ..GbmParams::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Horizons in days.
    pub horizons: Vec<usize>,
    /// Output tables are named `{title_prefix}_{h}d.csv`.
    pub title_prefix: String,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizons: vec![7, 30, 180],
            title_prefix: "forecast".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.training.test_size_days == 0 {
            return Err(ConfigError::Invalid(
                "training.test_size_days must be at least 1".into(),
            ));
        }
        validate_horizons(&self.forecast.horizons)?;
        if self.forecast.title_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("forecast.title_prefix is empty".into()));
        }
        self.sarimax
            .model()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.residual.enabled {
            self.residual
                .params()
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    /// Deterministic BLAKE3 digest of the configuration.
    pub fn fingerprint(&self) -> String {
        // Serializing plain data structs cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// Horizons must be non-empty and positive.
pub fn validate_horizons(horizons: &[usize]) -> Result<(), ConfigError> {
    if horizons.is_empty() {
        return Err(ConfigError::Invalid("at least one horizon is required".into()));
    }
    if horizons.contains(&0) {
        return Err(ConfigError::Invalid("horizons must be at least 1 day".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.forecast.horizons, vec![7, 30, 180]);
        assert_eq!(config.training.test_size_days, 60);
        assert_eq!(config.residual.params(), GbmParams::default());
    }

    #[test]
    fn parses_full_config() {
        let text = r#"
            [data]
            csv_path = "prices.csv"

            [sarimax]
            order = [2, 1, 0]
            seasonal_order = [1, 0, 1, 7]

            [training]
            test_size_days = 30

            [residual]
            enabled = false
            n_estimators = 100

            [forecast]
            horizons = [5, 10]
            title_prefix = "basmati"
        "#;
        let config = PipelineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.data.csv_path, PathBuf::from("prices.csv"));
        assert_eq!(config.sarimax.model().order, Order::new(2, 1, 0));
        assert_eq!(config.sarimax.model().seasonal, SeasonalOrder::new(1, 0, 1, 7));
        assert_eq!(config.training.test_size_days, 30);
        assert!(!config.residual.enabled);
        assert_eq!(config.residual.n_estimators, 100);
        assert_eq!(config.residual.max_depth, 4);
        assert_eq!(config.forecast.title_prefix, "basmati");
    }

    #[test]
    fn zero_holdout_is_rejected() {
        let err = PipelineConfig::from_toml_str("[training]\ntest_size_days = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let err = PipelineConfig::from_toml_str("[forecast]\nhorizons = [7, 0]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(validate_horizons(&[]).is_err());
    }

    #[test]
    fn bad_learning_rate_is_rejected_only_when_enabled() {
        assert!(PipelineConfig::from_toml_str("[residual]\nlearning_rate = 2.0").is_err());
        assert!(PipelineConfig::from_toml_str(
            "[residual]\nenabled = false\nlearning_rate = 2.0"
        )
        .is_ok());
    }

    #[test]
    fn fingerprint_is_deterministic_and_sensitive() {
        let a = PipelineConfig::default();
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.training.test_size_days = 30;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config = PipelineConfig::from_toml_str(include_str!("../../basmati.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn mistyped_field_is_a_parse_error() {
        let err = PipelineConfig::from_toml_str("[training]\ntest_size_days = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
