//! Multicollinearity diagnostics
//!
//! Near-duplicate features make pairwise weights unstable and can flip their
//! signs, so the trainer checks item-level feature vectors before fitting. Two
//! diagnostics are computed: pairwise Pearson correlation and the variance
//! inflation factor (the diagonal of the inverse correlation matrix).

use crate::linalg;
use jobrank_core::{Error, FeatureSchema, FeatureVector, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_MAX_CORRELATION: f64 = 0.9;
pub const DEFAULT_MAX_VIF: f64 = 10.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CollinearityThresholds {
    /// Flag feature pairs with |r| above this
    pub max_correlation: f64,
    /// Flag features with a VIF above this
    pub max_vif: f64,
}

impl Default for CollinearityThresholds {
    fn default() -> Self {
        Self {
            max_correlation: DEFAULT_MAX_CORRELATION,
            max_vif: DEFAULT_MAX_VIF,
        }
    }
}

/// What training does with a flagged report.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollinearityPolicy {
    /// Refuse to train
    #[default]
    Reject,
    /// Log and continue
    Warn,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorrelatedPair {
    pub first: String,
    pub second: String,
    pub correlation: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InflatedFeature {
    pub feature: String,
    pub vif: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollinearityReport {
    pub features: Vec<String>,
    pub samples: usize,
    /// Pearson correlation matrix in schema order
    pub correlations: Vec<Vec<f64>>,
    /// Variance inflation factor per feature; infinite when the matrix is singular
    pub vif: Vec<f64>,
    pub correlated_pairs: Vec<CorrelatedPair>,
    pub inflated_features: Vec<InflatedFeature>,
}

impl CollinearityReport {
    /// Compute diagnostics over item-level vectors that all use `schema`.
    pub fn compute<'a>(
        schema: &FeatureSchema,
        vectors: impl IntoIterator<Item = &'a FeatureVector>,
        thresholds: &CollinearityThresholds,
    ) -> Result<Self> {
        let names = schema.names();
        let dims = schema.len();
        let mut columns = vec![Vec::new(); dims];
        for vector in vectors {
            schema.ensure_names(&vector.schema().names())?;
            for (column, value) in columns.iter_mut().zip(vector.values()) {
                column.push(*value);
            }
        }
        let samples = columns.first().map_or(0, Vec::len);

        let mut correlations = vec![vec![0.0; dims]; dims];
        for i in 0..dims {
            correlations[i][i] = 1.0;
            for j in i + 1..dims {
                let r = pearson(&columns[i], &columns[j]);
                correlations[i][j] = r;
                correlations[j][i] = r;
            }
        }

        let vif = linalg::inverse_diagonal(&correlations)
            .unwrap_or_else(|| vec![f64::INFINITY; dims]);

        let mut correlated_pairs = Vec::new();
        for i in 0..dims {
            for j in i + 1..dims {
                if correlations[i][j].abs() > thresholds.max_correlation {
                    correlated_pairs.push(CorrelatedPair {
                        first: names[i].clone(),
                        second: names[j].clone(),
                        correlation: correlations[i][j],
                    });
                }
            }
        }
        let inflated_features = names
            .iter()
            .zip(&vif)
            .filter(|(_, v)| **v > thresholds.max_vif)
            .map(|(name, v)| InflatedFeature {
                feature: name.clone(),
                vif: *v,
            })
            .collect();

        Ok(Self {
            features: names,
            samples,
            correlations,
            vif,
            correlated_pairs,
            inflated_features,
        })
    }

    pub fn is_flagged(&self) -> bool {
        !self.correlated_pairs.is_empty() || !self.inflated_features.is_empty()
    }

    pub fn correlation(&self, first: &str, second: &str) -> Option<f64> {
        let i = self.features.iter().position(|f| f == first)?;
        let j = self.features.iter().position(|f| f == second)?;
        Some(self.correlations[i][j])
    }

    pub fn summary(&self) -> String {
        let pairs = self
            .correlated_pairs
            .iter()
            .map(|p| format!("{}~{} r={:.3}", p.first, p.second, p.correlation));
        let inflated = self
            .inflated_features
            .iter()
            .map(|f| format!("{} vif={:.1}", f.feature, f.vif));
        pairs.chain(inflated).collect::<Vec<_>>().join(", ")
    }

    /// Apply `policy` to a flagged report.
    pub fn enforce(&self, policy: CollinearityPolicy) -> Result<()> {
        if !self.is_flagged() {
            return Ok(());
        }
        match policy {
            CollinearityPolicy::Reject => Err(Error::Multicollinearity(self.summary())),
            CollinearityPolicy::Warn => {
                warn!("Training on multicollinear features: {}", self.summary());
                Ok(())
            }
        }
    }
}

/// Pearson correlation; 0 when either column has no variance.
fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom <= f64::EPSILON {
        0.0
    } else {
        (cov / denom).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobrank_core::Feature;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn vectors(schema: &FeatureSchema, rows: &[Vec<f64>]) -> Vec<FeatureVector> {
        rows.iter()
            .map(|r| FeatureVector::new(schema.clone(), r.clone()).unwrap())
            .collect()
    }

    #[test]
    fn test_pearson() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_flags_near_duplicate_features() {
        let schema = FeatureSchema::current();
        let mut rng = StdRng::seed_from_u64(7);
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|_| {
                let coverage: f64 = rng.random_range(0.1..0.9);
                let bonus = (coverage + rng.random_range(-0.02..0.02_f64)).clamp(0.0, 1.0);
                vec![rng.random_range(0.0..1.0), coverage, bonus]
            })
            .collect();
        let report = CollinearityReport::compute(
            &schema,
            &vectors(&schema, &rows),
            &CollinearityThresholds::default(),
        )
        .unwrap();

        assert!(report.is_flagged());
        assert_eq!(report.correlated_pairs.len(), 1);
        assert_eq!(report.correlated_pairs[0].first, "skill_coverage");
        assert_eq!(report.correlated_pairs[0].second, "keyword_bonus");
        assert!(report.vif[1] > DEFAULT_MAX_VIF);
        assert!(matches!(
            report.enforce(CollinearityPolicy::Reject),
            Err(Error::Multicollinearity(_))
        ));
        assert!(report.enforce(CollinearityPolicy::Warn).is_ok());
    }

    #[test]
    fn test_independent_features_pass() {
        let schema = FeatureSchema::learned_default();
        let rows = vec![
            vec![0.1, 0.9],
            vec![0.9, 0.8],
            vec![0.5, 0.1],
            vec![0.3, 0.3],
            vec![0.7, 0.6],
        ];
        let report = CollinearityReport::compute(
            &schema,
            &vectors(&schema, &rows),
            &CollinearityThresholds::default(),
        )
        .unwrap();
        assert!(!report.is_flagged());
        assert_eq!(report.samples, 5);
        assert!(report.vif.iter().all(|v| *v >= 1.0 && *v < DEFAULT_MAX_VIF));
        assert!(report.enforce(CollinearityPolicy::Reject).is_ok());
    }

    #[test]
    fn test_constant_feature_is_not_flagged() {
        let schema = FeatureSchema::new(&[Feature::Similarity, Feature::GapPenalty]).unwrap();
        let rows = vec![vec![0.1, 0.0], vec![0.5, 0.0], vec![0.9, 0.0]];
        let report = CollinearityReport::compute(
            &schema,
            &vectors(&schema, &rows),
            &CollinearityThresholds::default(),
        )
        .unwrap();
        assert_eq!(report.correlation("similarity", "gap_penalty"), Some(0.0));
        assert_eq!(report.vif, vec![1.0, 1.0]);
    }

    #[test]
    fn test_exact_duplicate_is_singular() {
        let schema = FeatureSchema::learned_default();
        let rows = vec![vec![0.1, 0.1], vec![0.5, 0.5], vec![0.9, 0.9]];
        let report = CollinearityReport::compute(
            &schema,
            &vectors(&schema, &rows),
            &CollinearityThresholds::default(),
        )
        .unwrap();
        assert!(report.vif.iter().all(|v| v.is_infinite()));
        assert_eq!(report.inflated_features.len(), 2);
    }
}
