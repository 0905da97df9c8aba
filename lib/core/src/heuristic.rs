//! Heuristic scorer
//!
//! `score = Σ wᵢ · fᵢ` over a feature vector with externally configured weights.
//! Used as a production strategy and as the ablation baseline.

use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureSchema, FeatureVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One weight per named feature.
///
/// Weights are non-negative: features are already oriented so that higher is
/// better, and penalties are negated in the feature value instead of the weight.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct HeuristicWeights(BTreeMap<Feature, f64>);

impl HeuristicWeights {
    pub fn new(weights: impl IntoIterator<Item = (Feature, f64)>) -> Self {
        Self(weights.into_iter().collect())
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.0.get(&feature).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.0.iter().map(|(f, w)| (*f, *w))
    }

    /// Check the weights against the schema they will be applied to.
    ///
    /// - every schema feature has a weight
    /// - no weight names a feature outside the schema
    /// - weights are finite and non-negative
    pub fn validate_for(&self, schema: &FeatureSchema) -> Result<()> {
        for feature in schema.features() {
            if !self.0.contains_key(feature) {
                return Err(Error::Config(format!("no heuristic weight for feature '{feature}'")));
            }
        }
        for (feature, weight) in &self.0 {
            if !schema.contains(*feature) {
                return Err(Error::Config(format!(
                    "heuristic weight for '{feature}' which is not a heuristic feature"
                )));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::Config(format!(
                    "feature '{feature}' has invalid weight {weight}"
                )));
            }
        }
        Ok(())
    }

    /// Weighted contribution of every feature in the vector, in schema order.
    pub fn contributions(&self, vector: &FeatureVector) -> Result<Vec<(Feature, f64)>> {
        vector
            .iter()
            .map(|(feature, value)| {
                self.get(feature)
                    .map(|w| (feature, w * value))
                    .ok_or_else(|| {
                        Error::Config(format!("no heuristic weight for feature '{feature}'"))
                    })
            })
            .collect()
    }
}

/// Heuristic relevance score of a feature vector. Deterministic and pure.
pub fn heuristic_score(vector: &FeatureVector, weights: &HeuristicWeights) -> Result<f64> {
    Ok(weights.contributions(vector)?.iter().map(|(_, c)| c).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> HeuristicWeights {
        HeuristicWeights::new([
            (Feature::Similarity, 0.5),
            (Feature::SkillCoverage, 0.3),
            (Feature::KeywordBonus, 0.2),
        ])
    }

    #[test]
    fn test_weighted_sum() {
        let vector = FeatureVector::new(FeatureSchema::current(), vec![0.8, 0.5, 1.0]).unwrap();
        let score = heuristic_score(&vector, &weights()).unwrap();
        assert!((score - (0.4 + 0.15 + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_contributions_in_schema_order() {
        let vector = FeatureVector::new(FeatureSchema::current(), vec![1.0, 1.0, 1.0]).unwrap();
        let contributions = weights().contributions(&vector).unwrap();
        let features: Vec<_> = contributions.iter().map(|(f, _)| *f).collect();
        assert_eq!(features, FeatureSchema::current().features());
    }

    #[test]
    fn test_missing_weight_errors() {
        let schema = FeatureSchema::new(&[Feature::Similarity, Feature::GapPenalty]).unwrap();
        let vector = FeatureVector::new(schema, vec![0.8, -0.5]).unwrap();
        assert!(matches!(heuristic_score(&vector, &weights()), Err(Error::Config(_))));
    }

    #[test]
    fn test_penalty_lowers_score() {
        let schema = FeatureSchema::new(&[Feature::Similarity, Feature::GapPenalty]).unwrap();
        let w = HeuristicWeights::new([(Feature::Similarity, 1.0), (Feature::GapPenalty, 0.5)]);
        w.validate_for(&schema).unwrap();
        let clean = FeatureVector::new(schema.clone(), vec![0.6, 0.0]).unwrap();
        let gappy = FeatureVector::new(schema, vec![0.6, -0.8]).unwrap();
        assert!(heuristic_score(&clean, &w).unwrap() > heuristic_score(&gappy, &w).unwrap());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let w = HeuristicWeights::new([
            (Feature::Similarity, 0.5),
            (Feature::SkillCoverage, -0.3),
            (Feature::KeywordBonus, 0.2),
        ]);
        assert!(matches!(w.validate_for(&FeatureSchema::current()), Err(Error::Config(_))));
    }

    #[test]
    fn test_extra_weight_rejected() {
        let mut w = weights();
        w.0.insert(Feature::GapPenalty, 0.1);
        assert!(w.validate_for(&FeatureSchema::current()).is_err());
    }

    #[test]
    fn test_serde_uses_feature_names() {
        let json = serde_json::to_string(&weights()).unwrap();
        assert!(json.contains("\"skill_coverage\":0.3"));
        let parsed: HeuristicWeights = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, weights());
    }
}
