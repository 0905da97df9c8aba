//! Persisted model bundles
//!
//! A bundle is an opaque bincode blob holding the weights, bias, ordered
//! feature names and regularization strength of a [`RankingModel`]. Writes go
//! through a temp file that is renamed over the target, so concurrent readers
//! see either the old bundle or the new one, never a partial write.

use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use jobrank_core::{Error, FeatureSchema, Result};
use jobrank_ltr::{RankingModel, TrainingSummary};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Bump when the bundle layout changes.
pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub catalogue_version: u32,
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub inverse_regularization: f64,
    pub training: TrainingSummary,
    pub created_at: DateTime<Utc>,
}

impl ModelBundle {
    pub fn from_model(model: &RankingModel) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            catalogue_version: model.catalogue_version(),
            feature_names: model.feature_names().to_vec(),
            weights: model.weights().to_vec(),
            bias: model.bias(),
            inverse_regularization: model.inverse_regularization(),
            training: model.training().clone(),
            created_at: Utc::now(),
        }
    }

    pub fn into_model(self) -> Result<RankingModel> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::ModelLoad(format!(
                "unsupported bundle format v{}, expected v{}",
                self.format_version, MODEL_FORMAT_VERSION
            )));
        }
        RankingModel::from_parts(
            self.feature_names,
            self.catalogue_version,
            self.weights,
            self.bias,
            self.inverse_regularization,
            self.training,
        )
    }
}

/// Reads and atomically replaces the model bundle at one path.
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write `model`, replacing any existing bundle atomically.
    pub fn save(&self, model: &RankingModel) -> Result<()> {
        let bundle = ModelBundle::from_model(model);
        let bytes = bincode::serialize(&bundle)
            .map_err(|e| Error::Serialization(format!("model bundle: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        AtomicFile::new(&self.path, OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(&bytes))
            .map_err(|e| match e {
                atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => Error::Io(e),
            })?;

        info!(
            "Saved model bundle ({} features, {} bytes) to {:?}",
            bundle.feature_names.len(),
            bytes.len(),
            self.path
        );
        Ok(())
    }

    /// Read the bundle and check it against the schema the caller scores with.
    ///
    /// A missing or corrupt file is [`Error::ModelLoad`]; a bundle trained on a
    /// different feature list is [`Error::FeatureMismatch`].
    pub fn load(&self, expected: &FeatureSchema) -> Result<RankingModel> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| Error::ModelLoad(format!("{:?}: {}", self.path, e)))?;
        let bundle: ModelBundle = bincode::deserialize(&bytes)
            .map_err(|e| Error::ModelLoad(format!("{:?}: corrupt bundle: {}", self.path, e)))?;
        let created_at = bundle.created_at;

        let model = bundle.into_model()?;
        model.ensure_compatible(expected)?;

        info!(
            "Loaded model from {:?} (trained {}, features {:?})",
            self.path,
            created_at.to_rfc3339(),
            model.feature_names()
        );
        Ok(model)
    }
}
