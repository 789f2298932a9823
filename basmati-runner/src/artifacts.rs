//! Model artifact store.
//!
//! One directory per training run:
//! - `sarimax.json`: fitted baseline
//! - `gbm.json`: fitted residual model (absent when residual modelling is off)
//! - `manifest.json`: provenance, split, and holdout metrics
//!
//! Writes are atomic: write to `.tmp`, then rename into place.

use crate::train::{SplitSummary, TrainMetrics};
use basmati_core::{GbmFit, GbmParams, Order, SarimaxFit, SeasonalOrder};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current manifest schema version.
///
/// Bump when the artifact layout or manifest fields change incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

pub const BASELINE_FILE: &str = "sarimax.json";
pub const RESIDUAL_FILE: &str = "gbm.json";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("artifact {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("artifact {path} is missing")]
    Missing { path: PathBuf },

    #[error("manifest schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },
}

/// Provenance for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    /// BLAKE3 digest of the series the deployed models were fitted on.
    pub dataset_hash: String,
    pub history_start: NaiveDate,
    pub history_end: NaiveDate,
    pub order: Order,
    pub seasonal_order: SeasonalOrder,
    /// Residual hyperparameters; `None` when no residual model was saved.
    pub residual: Option<GbmParams>,
    pub split: SplitSummary,
    pub metrics: TrainMetrics,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Reads and writes the artifacts of one run directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create the directory if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| ArtifactError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Open an existing directory for reading.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.dir.join(BASELINE_FILE)
    }

    pub fn residual_path(&self) -> PathBuf {
        self.dir.join(RESIDUAL_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn save_baseline(&self, fit: &SarimaxFit) -> Result<PathBuf, ArtifactError> {
        let path = self.baseline_path();
        write_json(&path, fit)?;
        Ok(path)
    }

    pub fn save_residual(&self, fit: &GbmFit) -> Result<PathBuf, ArtifactError> {
        let path = self.residual_path();
        write_json(&path, fit)?;
        Ok(path)
    }

    /// Remove a residual artifact left by an earlier run in the same directory.
    pub fn clear_residual(&self) -> Result<(), ArtifactError> {
        let path = self.residual_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed stale residual artifact");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ArtifactError::Io { path, source }),
        }
    }

    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<PathBuf, ArtifactError> {
        let path = self.manifest_path();
        write_json(&path, manifest)?;
        Ok(path)
    }

    pub fn load_baseline(&self) -> Result<SarimaxFit, ArtifactError> {
        read_json(&self.baseline_path())
    }

    /// The residual model, or `None` when no artifact exists.
    pub fn load_residual(&self) -> Result<Option<GbmFit>, ArtifactError> {
        let path = self.residual_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn load_manifest(&self) -> Result<ModelManifest, ArtifactError> {
        let manifest: ModelManifest = read_json(&self.manifest_path())?;
        if manifest.schema_version > SCHEMA_VERSION {
            return Err(ArtifactError::UnsupportedSchema {
                found: manifest.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(manifest)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|source| ArtifactError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::Missing {
                path: path.to_path_buf(),
            }
        } else {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use basmati_core::{GradientBoosting, PriceSeries, Sarimax};

    fn series() -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceSeries::daily((0..40).map(|i| {
            (
                start + chrono::Duration::days(i),
                Some(100.0 + i as f64 + (i % 7) as f64),
            )
        }))
        .unwrap()
    }

    #[test]
    fn baseline_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path().join("models")).unwrap();
        let fit = Sarimax::default().fit(&series()).unwrap();
        let path = store.save_baseline(&fit).unwrap();
        assert!(path.ends_with(BASELINE_FILE));
        assert_eq!(store.load_baseline().unwrap(), fit);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_residual_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path()).unwrap();
        assert!(store.load_residual().unwrap().is_none());
    }

    #[test]
    fn clear_residual_removes_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path()).unwrap();
        let fit = GradientBoosting::default()
            .fit(&[vec![0.0], vec![1.0]], &[1.0, 2.0])
            .unwrap();
        store.save_residual(&fit).unwrap();
        assert_eq!(store.load_residual().unwrap(), Some(fit));
        store.clear_residual().unwrap();
        assert!(store.load_residual().unwrap().is_none());
        store.clear_residual().unwrap();
    }

    #[test]
    fn missing_baseline_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        assert!(matches!(
            store.load_baseline(),
            Err(ArtifactError::Missing { .. })
        ));
    }

    #[test]
    fn corrupt_artifact_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path()).unwrap();
        fs::write(store.baseline_path(), "{not json").unwrap();
        assert!(matches!(
            store.load_baseline(),
            Err(ArtifactError::Json { .. })
        ));
    }
}
