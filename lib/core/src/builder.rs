//! Feature vector construction
//!
//! Turns externally supplied signals for a (query, item) pair into a
//! [`FeatureVector`] in the builder's schema order. The similarity score and the
//! normalized skill sets come from collaborators outside this crate; the builder
//! only combines them and fails fast when a signal the schema needs is missing.

use crate::config::SkillConfig;
use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureSchema, FeatureVector};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upstream signals for one (query, item) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureSignals {
    /// Semantic similarity in [0, 1]
    #[serde(default)]
    pub similarity: Option<f64>,
    /// Canonical skills of the query profile (declared + extracted from free text)
    #[serde(default)]
    pub query_skills: Option<BTreeSet<String>>,
    /// Canonical skills required by the item
    #[serde(default)]
    pub item_skills: Option<BTreeSet<String>>,
    /// Canonical skills classified as soft skills; never penalized
    #[serde(default)]
    pub soft_skills: BTreeSet<String>,
}

impl FeatureSignals {
    pub fn new(
        similarity: f64,
        query_skills: impl IntoIterator<Item = impl Into<String>>,
        item_skills: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            similarity: Some(similarity),
            query_skills: Some(query_skills.into_iter().map(Into::into).collect()),
            item_skills: Some(item_skills.into_iter().map(Into::into).collect()),
            soft_skills: BTreeSet::new(),
        }
    }

    pub fn with_soft_skills(mut self, soft: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.soft_skills = soft.into_iter().map(Into::into).collect();
        self
    }
}

/// Builds feature vectors for a fixed schema.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    schema: FeatureSchema,
    skills: SkillConfig,
}

impl FeatureBuilder {
    pub fn new(schema: FeatureSchema, skills: SkillConfig) -> Self {
        Self { schema, skills }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Build the feature vector for one pair. Pure; no side effects.
    pub fn build(&self, signals: &FeatureSignals) -> Result<FeatureVector> {
        let skills = SkillSets::from_signals(signals, &self.schema)?;
        let values = self
            .schema
            .features()
            .iter()
            .map(|feature| self.compute(*feature, signals, skills.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        FeatureVector::new(self.schema.clone(), values)
    }

    fn compute(
        &self,
        feature: Feature,
        signals: &FeatureSignals,
        sets: Option<&SkillSets>,
    ) -> Result<f64> {
        let skills = || sets.ok_or(Error::MissingSignal("item_skills"));
        match feature {
            Feature::Similarity => {
                let value = signals.similarity.ok_or(Error::MissingSignal("similarity"))?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(Error::SignalOutOfRange {
                        name: "similarity",
                        value,
                        min: 0.0,
                        max: 1.0,
                    });
                }
                Ok(value)
            }
            Feature::SkillCoverage => Ok(skills()?.coverage()),
            Feature::KeywordBonus => Ok(skills()?.keyword_bonus(&self.skills)),
            Feature::GapPenalty => Ok(skills()?.gap_penalty(&self.skills)),
        }
    }
}

/// Lower-cased skill sets; comparison is case-insensitive.
struct SkillSets {
    query: AHashSet<String>,
    item: AHashSet<String>,
    soft: AHashSet<String>,
}

impl SkillSets {
    fn from_signals(signals: &FeatureSignals, schema: &FeatureSchema) -> Result<Option<Self>> {
        let needs_skills = schema.features().iter().any(|f| *f != Feature::Similarity);
        if !needs_skills {
            return Ok(None);
        }
        let query = signals
            .query_skills
            .as_ref()
            .ok_or(Error::MissingSignal("query_skills"))?;
        let item = signals
            .item_skills
            .as_ref()
            .ok_or(Error::MissingSignal("item_skills"))?;
        Ok(Some(Self {
            query: lowercase(query),
            item: lowercase(item),
            soft: lowercase(&signals.soft_skills),
        }))
    }

    fn matched(&self) -> impl Iterator<Item = &String> {
        self.item.iter().filter(|s| self.query.contains(*s))
    }

    fn coverage(&self) -> f64 {
        if self.item.is_empty() {
            return 0.0;
        }
        self.matched().count() as f64 / self.item.len() as f64
    }

    fn keyword_bonus(&self, config: &SkillConfig) -> f64 {
        let keywords = &config.keywords;
        if keywords.max_keywords == 0 {
            return 0.0;
        }
        let high_priority = lowercase(&keywords.high_priority);
        let total: f64 = self
            .matched()
            .map(|s| {
                if high_priority.contains(s) {
                    keywords.high_priority_multiplier
                } else {
                    1.0
                }
            })
            .sum();
        (total / keywords.max_keywords as f64).min(1.0)
    }

    fn gap_penalty(&self, config: &SkillConfig) -> f64 {
        let gaps = &config.gaps;
        if gaps.max_gaps == 0 {
            return 0.0;
        }
        let critical = lowercase(&gaps.critical_skills);
        let total: f64 = self
            .item
            .iter()
            .filter(|s| !self.query.contains(*s) && !self.soft.contains(*s))
            .map(|s| {
                if critical.contains(s) {
                    gaps.critical_multiplier
                } else {
                    1.0
                }
            })
            .sum();
        // Pre-negated so that higher stays better.
        -(total / gaps.max_gaps as f64).min(1.0)
    }
}

fn lowercase<'a>(skills: impl IntoIterator<Item = &'a String>) -> AHashSet<String> {
    skills.into_iter().map(|s| s.to_lowercase()).collect()
}
