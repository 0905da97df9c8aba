//! Feature catalogue and fixed-order feature vectors
//!
//! Every scorer in the system consumes a [`FeatureVector`]: an ordered tuple of
//! named scalars whose order is defined by a [`FeatureSchema`]. The schema is a
//! selection from the closed [`Feature`] catalogue, always kept in catalogue order,
//! so the name to index mapping is identical between training and inference.
//!
//! ## Compatibility
//!
//! New features are appended to the end of [`Feature::ALL`] and bump
//! [`FEATURE_CATALOGUE_VERSION`]. Removing or reordering a feature is a
//! compatibility break: every persisted model records the feature names and
//! catalogue version it was trained with and is rejected on load when they differ.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Catalogue version. Bump when a feature is appended.
pub const FEATURE_CATALOGUE_VERSION: u32 = 1;

/// A named feature from the closed catalogue.
///
/// All features are oriented so that higher is better. Penalty-style features are
/// pre-negated here, never in a weight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Semantic similarity between query and item text, in [0, 1]
    Similarity,
    /// Share of the item's skills covered by the query, in [0, 1]
    SkillCoverage,
    /// Matched skills with a bonus for high-priority keywords, in [0, 1]
    KeywordBonus,
    /// Negated, normalized count of missing hard skills, in [-1, 0]
    GapPenalty,
}

impl Feature {
    /// Catalogue order. Append only.
    pub const ALL: [Feature; 4] = [
        Feature::Similarity,
        Feature::SkillCoverage,
        Feature::KeywordBonus,
        Feature::GapPenalty,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Similarity => "similarity",
            Feature::SkillCoverage => "skill_coverage",
            Feature::KeywordBonus => "keyword_bonus",
            Feature::GapPenalty => "gap_penalty",
        }
    }

    /// Documented closed range of the feature value.
    pub fn range(self) -> (f64, f64) {
        match self {
            Feature::GapPenalty => (-1.0, 0.0),
            _ => (0.0, 1.0),
        }
    }

    fn catalogue_index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| Error::UnknownFeature(s.to_string()))
    }
}

/// An ordered selection of catalogue features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    version: u32,
    features: Arc<[Feature]>,
}

impl FeatureSchema {
    /// Build a schema from a selection of features.
    ///
    /// The selection must be non-empty, free of duplicates and in catalogue order.
    pub fn new(features: &[Feature]) -> Result<Self> {
        if features.is_empty() {
            return Err(Error::InvalidSchema("schema cannot be empty".into()));
        }
        for pair in features.windows(2) {
            if pair[0] == pair[1] {
                return Err(Error::InvalidSchema(format!("duplicate feature '{}'", pair[0])));
            }
            if pair[0].catalogue_index() > pair[1].catalogue_index() {
                return Err(Error::InvalidSchema(format!(
                    "'{}' must come before '{}'",
                    pair[1], pair[0]
                )));
            }
        }
        Ok(Self {
            version: FEATURE_CATALOGUE_VERSION,
            features: features.into(),
        })
    }

    /// The production feature set: similarity, skill coverage, keyword bonus.
    pub fn current() -> Self {
        Self {
            version: FEATURE_CATALOGUE_VERSION,
            features: Arc::from(
                &[Feature::Similarity, Feature::SkillCoverage, Feature::KeywordBonus][..],
            ),
        }
    }

    /// The minimal complementary set the learned model is trained on.
    ///
    /// Skill coverage and gap penalty are left out: they are near-redundant with each
    /// other and with the keyword bonus (r > 0.9 on real data).
    pub fn learned_default() -> Self {
        Self {
            version: FEATURE_CATALOGUE_VERSION,
            features: Arc::from(&[Feature::Similarity, Feature::KeywordBonus][..]),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn index_of(&self, feature: Feature) -> Option<usize> {
        self.features.iter().position(|f| *f == feature)
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.index_of(feature).is_some()
    }

    /// Check that a persisted name list matches this schema exactly.
    pub fn ensure_names(&self, names: &[String]) -> Result<()> {
        let expected = self.names();
        if expected.as_slice() != names {
            return Err(Error::FeatureMismatch {
                expected,
                actual: names.to_vec(),
            });
        }
        Ok(())
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::current()
    }
}

/// A fixed-order vector of feature values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema: FeatureSchema,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Create a vector, checking arity and documented ranges.
    pub fn new(schema: FeatureSchema, values: Vec<f64>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(Error::InvalidSchema(format!(
                "expected {} values, got {}",
                schema.len(),
                values.len()
            )));
        }
        for (feature, value) in schema.features().iter().zip(&values) {
            let (min, max) = feature.range();
            if !value.is_finite() || *value < min || *value > max {
                return Err(Error::SignalOutOfRange {
                    name: feature.name(),
                    value: *value,
                    min,
                    max,
                });
            }
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.schema.index_of(feature).map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.schema
            .features()
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Explicit feature selection: project onto a sub-schema.
    pub fn select(&self, schema: &FeatureSchema) -> Result<FeatureVector> {
        if schema == &self.schema {
            return Ok(self.clone());
        }
        let values = schema
            .features()
            .iter()
            .map(|f| {
                self.get(*f).ok_or_else(|| Error::FeatureMismatch {
                    expected: schema.names(),
                    actual: self.schema.names(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(FeatureVector {
            schema: schema.clone(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_schema_order() {
        let schema = FeatureSchema::current();
        assert_eq!(schema.names(), vec!["similarity", "skill_coverage", "keyword_bonus"]);
        assert_eq!(schema.version(), FEATURE_CATALOGUE_VERSION);
    }

    #[test]
    fn test_schema_rejects_out_of_order() {
        let err = FeatureSchema::new(&[Feature::KeywordBonus, Feature::Similarity]).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_schema_rejects_duplicates_and_empty() {
        assert!(FeatureSchema::new(&[Feature::Similarity, Feature::Similarity]).is_err());
        assert!(FeatureSchema::new(&[]).is_err());
    }

    #[test]
    fn test_feature_from_str() {
        assert_eq!("gap_penalty".parse::<Feature>().unwrap(), Feature::GapPenalty);
        assert!(matches!("bm25".parse::<Feature>(), Err(Error::UnknownFeature(_))));
    }

    #[test]
    fn test_vector_range_check() {
        let schema = FeatureSchema::current();
        assert!(FeatureVector::new(schema.clone(), vec![0.5, 0.2, 1.0]).is_ok());
        assert!(matches!(
            FeatureVector::new(schema.clone(), vec![1.2, 0.2, 1.0]),
            Err(Error::SignalOutOfRange { name: "similarity", .. })
        ));
        assert!(FeatureVector::new(schema, vec![0.5, 0.2]).is_err());
    }

    #[test]
    fn test_gap_penalty_is_non_positive() {
        let schema = FeatureSchema::new(&[Feature::Similarity, Feature::GapPenalty]).unwrap();
        assert!(FeatureVector::new(schema.clone(), vec![0.5, -0.4]).is_ok());
        assert!(FeatureVector::new(schema, vec![0.5, 0.4]).is_err());
    }

    #[test]
    fn test_select_projects_in_schema_order() {
        let vector = FeatureVector::new(FeatureSchema::current(), vec![0.9, 0.4, 0.7]).unwrap();
        let learned = FeatureSchema::learned_default();
        let projected = vector.select(&learned).unwrap();
        assert_eq!(projected.values(), &[0.9, 0.7]);
        assert_eq!(projected.schema(), &learned);
    }

    #[test]
    fn test_select_missing_feature_fails() {
        let vector = FeatureVector::new(FeatureSchema::learned_default(), vec![0.9, 0.7]).unwrap();
        let err = vector.select(&FeatureSchema::current()).unwrap_err();
        assert!(matches!(err, Error::FeatureMismatch { .. }));
    }

    #[test]
    fn test_ensure_names() {
        let schema = FeatureSchema::current();
        assert!(schema.ensure_names(&schema.names()).is_ok());
        let short = vec!["similarity".to_string(), "skill_coverage".to_string()];
        assert!(matches!(schema.ensure_names(&short), Err(Error::FeatureMismatch { .. })));
    }
}
