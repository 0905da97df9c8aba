//! Ranking configuration
//!
//! Heuristic weights, keyword and critical-skill lists, and the feature
//! selections used by each ranking strategy. A config value is immutable once
//! validated; reloading produces a new value that replaces the old one as a whole.

use crate::builder::FeatureBuilder;
use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureSchema};
use crate::heuristic::HeuristicWeights;
use serde::{Deserialize, Serialize};

/// Complete ranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingConfig {
    /// Config version for future compatibility
    #[serde(default = "default_version")]
    pub version: u32,

    /// One non-negative weight per heuristic feature
    pub heuristic_weights: HeuristicWeights,

    /// Keyword and critical-skill lists
    #[serde(flatten)]
    pub skills: SkillConfig,

    /// Features combined by the heuristic scorer
    #[serde(default = "default_heuristic_features")]
    pub heuristic_features: Vec<Feature>,

    /// Features the learned model is trained and served on
    #[serde(default = "default_learned_features")]
    pub learned_features: Vec<Feature>,
}

fn default_version() -> u32 {
    1
}

fn default_heuristic_features() -> Vec<Feature> {
    FeatureSchema::current().features().to_vec()
}

fn default_learned_features() -> Vec<Feature> {
    FeatureSchema::learned_default().features().to_vec()
}

impl RankingConfig {
    /// Validate the whole config. Nothing is defaulted silently.
    pub fn validate(&self) -> Result<()> {
        let heuristic = self.heuristic_schema()?;
        self.learned_schema()?;
        self.heuristic_weights.validate_for(&heuristic)?;
        self.skills.validate()
    }

    pub fn heuristic_schema(&self) -> Result<FeatureSchema> {
        FeatureSchema::new(&self.heuristic_features)
            .map_err(|e| Error::Config(format!("heuristic_features: {e}")))
    }

    pub fn learned_schema(&self) -> Result<FeatureSchema> {
        FeatureSchema::new(&self.learned_features)
            .map_err(|e| Error::Config(format!("learned_features: {e}")))
    }

    /// Union of the heuristic and learned selections, in catalogue order.
    ///
    /// Datasets and candidates are built in this schema; each strategy then
    /// selects its own features from the vector.
    pub fn dataset_schema(&self) -> Result<FeatureSchema> {
        let features: Vec<Feature> = Feature::ALL
            .into_iter()
            .filter(|f| self.heuristic_features.contains(f) || self.learned_features.contains(f))
            .collect();
        FeatureSchema::new(&features).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn dataset_builder(&self) -> Result<FeatureBuilder> {
        Ok(FeatureBuilder::new(self.dataset_schema()?, self.skills.clone()))
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RankingConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Keyword and gap settings consumed by the feature builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillConfig {
    pub keywords: KeywordConfig,
    pub gaps: GapConfig,
}

impl SkillConfig {
    pub fn validate(&self) -> Result<()> {
        let k = &self.keywords;
        if !k.high_priority_multiplier.is_finite() || k.high_priority_multiplier <= 0.0 {
            return Err(Error::Config(format!(
                "keywords.high_priority_multiplier must be positive, got {}",
                k.high_priority_multiplier
            )));
        }
        let g = &self.gaps;
        if !g.critical_multiplier.is_finite() || g.critical_multiplier <= 0.0 {
            return Err(Error::Config(format!(
                "gaps.critical_multiplier must be positive, got {}",
                g.critical_multiplier
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordConfig {
    /// Keywords that count `high_priority_multiplier` times when matched
    #[serde(default)]
    pub high_priority: Vec<String>,
    #[serde(default = "default_multiplier")]
    pub high_priority_multiplier: f64,
    /// Normalizer for the keyword bonus
    pub max_keywords: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GapConfig {
    /// Skills that count `critical_multiplier` times when missing
    #[serde(default)]
    pub critical_skills: Vec<String>,
    #[serde(default = "default_multiplier")]
    pub critical_multiplier: f64,
    /// Normalizer for the gap penalty
    pub max_gaps: usize,
}

fn default_multiplier() -> f64 {
    1.5
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "heuristic_weights": {
            "similarity": 0.5,
            "skill_coverage": 0.3,
            "keyword_bonus": 0.2
        },
        "keywords": {
            "high_priority": ["Rust", "Python"],
            "high_priority_multiplier": 1.5,
            "max_keywords": 10
        },
        "gaps": {
            "critical_skills": ["AWS"],
            "critical_multiplier": 2.0,
            "max_gaps": 10
        }
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = RankingConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.heuristic_schema().unwrap(), FeatureSchema::current());
        assert_eq!(config.learned_schema().unwrap(), FeatureSchema::learned_default());
    }

    #[test]
    fn test_dataset_schema_is_union() {
        let mut config = RankingConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.dataset_schema().unwrap(), FeatureSchema::current());
        config.learned_features = vec![Feature::Similarity, Feature::GapPenalty];
        assert_eq!(
            config.dataset_schema().unwrap().features(),
            &Feature::ALL[..]
        );
    }

    #[test]
    fn test_missing_weight_is_fatal() {
        let json = CONFIG.replace("\"keyword_bonus\": 0.2", "\"gap_penalty\": 0.2");
        let err = RankingConfig::from_json(&json).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");
    }

    #[test]
    fn test_malformed_config_is_fatal() {
        let err = RankingConfig::from_json("{\"heuristic_weights\": 3}").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unordered_learned_features_rejected() {
        let mut config = RankingConfig::from_json(CONFIG).unwrap();
        config.learned_features = vec![Feature::KeywordBonus, Feature::Similarity];
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_non_positive_multiplier_rejected() {
        let mut config = RankingConfig::from_json(CONFIG).unwrap();
        config.skills.gaps.critical_multiplier = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = RankingConfig::from_json(CONFIG).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(RankingConfig::from_json(&json).unwrap(), config);
    }
}
