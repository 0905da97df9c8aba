//! Trained pairwise ranking model
//!
//! The classifier is fit on feature differences, but its decision function is
//! linear, so the same weights order single vectors: `score(x) = w·x + b`.
//! Weights are stored in raw feature space, one per feature name, in the order
//! of the schema the model was trained on.

use jobrank_core::{Error, Feature, FeatureSchema, FeatureVector, Result};
use serde::{Deserialize, Serialize};

/// How a model was fit. Informational only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrainingSummary {
    pub pairs: usize,
    pub queries: usize,
    pub iterations: usize,
    pub converged: bool,
    /// Mean logistic loss on the training pairs
    pub log_loss: f64,
}

/// A learned feature weight.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeatureWeight {
    pub feature: String,
    pub weight: f64,
    /// Set when the weight is negative; every feature is oriented higher-is-better
    pub sign_violation: bool,
}

/// An immutable trained model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingModel {
    feature_names: Vec<String>,
    catalogue_version: u32,
    weights: Vec<f64>,
    bias: f64,
    inverse_regularization: f64,
    training: TrainingSummary,
}

impl RankingModel {
    /// Assemble a model, e.g. from a persisted bundle.
    pub fn from_parts(
        feature_names: Vec<String>,
        catalogue_version: u32,
        weights: Vec<f64>,
        bias: f64,
        inverse_regularization: f64,
        training: TrainingSummary,
    ) -> Result<Self> {
        if feature_names.is_empty() {
            return Err(Error::ModelLoad("model has no features".into()));
        }
        if feature_names.len() != weights.len() {
            return Err(Error::ModelLoad(format!(
                "{} feature names but {} weights",
                feature_names.len(),
                weights.len()
            )));
        }
        if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::ModelLoad("non-finite model parameters".into()));
        }
        if !(inverse_regularization.is_finite() && inverse_regularization > 0.0) {
            return Err(Error::ModelLoad(format!(
                "invalid inverse regularization {inverse_regularization}"
            )));
        }
        Ok(Self {
            feature_names,
            catalogue_version,
            weights,
            bias,
            inverse_regularization,
            training,
        })
    }

    pub(crate) fn trained(
        schema: &FeatureSchema,
        weights: Vec<f64>,
        bias: f64,
        inverse_regularization: f64,
        training: TrainingSummary,
    ) -> Self {
        Self {
            feature_names: schema.names(),
            catalogue_version: schema.version(),
            weights,
            bias,
            inverse_regularization,
            training,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn catalogue_version(&self) -> u32 {
        self.catalogue_version
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn inverse_regularization(&self) -> f64 {
        self.inverse_regularization
    }

    pub fn training(&self) -> &TrainingSummary {
        &self.training
    }

    /// Reconstruct the schema the model was trained on.
    pub fn schema(&self) -> Result<FeatureSchema> {
        let features = self
            .feature_names
            .iter()
            .map(|name| name.parse::<Feature>())
            .collect::<Result<Vec<_>>>()?;
        FeatureSchema::new(&features)
    }

    /// Fail unless the model was trained on exactly `expected`.
    pub fn ensure_compatible(&self, expected: &FeatureSchema) -> Result<()> {
        if self.catalogue_version != expected.version() {
            return Err(Error::ModelLoad(format!(
                "model built for feature catalogue v{}, current is v{}",
                self.catalogue_version,
                expected.version()
            )));
        }
        expected.ensure_names(&self.feature_names)
    }

    /// Score a single vector. The vector's feature names must match the model's.
    pub fn score(&self, vector: &FeatureVector) -> Result<f64> {
        let names = vector.schema().names();
        if names != self.feature_names {
            return Err(Error::FeatureMismatch {
                expected: self.feature_names.clone(),
                actual: names,
            });
        }
        let dot: f64 = self
            .weights
            .iter()
            .zip(vector.values())
            .map(|(w, x)| w * x)
            .sum();
        Ok(dot + self.bias)
    }

    /// Weights sorted by absolute value, largest first.
    pub fn feature_weights(&self) -> Vec<FeatureWeight> {
        let mut weights: Vec<FeatureWeight> = self
            .feature_names
            .iter()
            .zip(&self.weights)
            .map(|(name, w)| FeatureWeight {
                feature: name.clone(),
                weight: *w,
                sign_violation: *w < 0.0,
            })
            .collect();
        weights.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));
        weights
    }

    /// Names of features whose learned weight has the wrong sign.
    pub fn sign_violations(&self) -> Vec<&str> {
        self.feature_names
            .iter()
            .zip(&self.weights)
            .filter(|(_, w)| **w < 0.0)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
