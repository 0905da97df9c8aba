//! Weak labels
//!
//! A [`LabeledExample`] ties a (query, item) pair to its feature vector and an
//! ordinal relevance grade produced by an external weak-labeling process. A
//! [`LabelSet`] groups examples by query and checks that the full
//! query × item product is covered before any evaluation runs.

use crate::error::{Error, MissingPair, Result};
use crate::feature::{FeatureSchema, FeatureVector};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ordinal relevance grade in 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Grade(u8);

impl Grade {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Option<Self> {
        (i64::from(Self::MIN)..=i64::from(Self::MAX))
            .contains(&value)
            .then_some(Grade(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Gain used by the rank metrics.
    pub fn gain(self) -> f64 {
        f64::from(self.0)
    }
}

impl TryFrom<i64> for Grade {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        Grade::new(value).ok_or_else(|| format!("grade {value} outside 1..=5"))
    }
}

impl From<Grade> for u8 {
    fn from(grade: Grade) -> Self {
        grade.0
    }
}

/// A weakly labeled (query, item) pair. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub query_id: String,
    pub item_id: String,
    pub features: FeatureVector,
    pub label: Grade,
}

impl LabeledExample {
    pub fn new(
        query_id: impl Into<String>,
        item_id: impl Into<String>,
        features: FeatureVector,
        label: i64,
    ) -> Result<Self> {
        let query_id = query_id.into();
        let item_id = item_id.into();
        let label = Grade::new(label).ok_or_else(|| Error::InvalidLabel {
            query_id: query_id.clone(),
            item_id: item_id.clone(),
            label,
        })?;
        Ok(Self {
            query_id,
            item_id,
            features,
            label,
        })
    }
}

/// A validated collection of labeled examples sharing one feature schema.
#[derive(Debug, Clone)]
pub struct LabelSet {
    examples: Vec<LabeledExample>,
    schema: FeatureSchema,
    queries: Vec<String>,
    items: Vec<String>,
}

impl LabelSet {
    /// Build a label set.
    ///
    /// Rejects an empty input, duplicate (query, item) pairs and mixed schemas.
    /// The query and item universes are the distinct ids seen in the examples.
    pub fn new(examples: Vec<LabeledExample>) -> Result<Self> {
        let schema = examples
            .first()
            .map(|e| e.features.schema().clone())
            .ok_or(Error::EmptyLabelSet)?;

        let mut seen = AHashSet::with_capacity(examples.len());
        let mut queries = BTreeSet::new();
        let mut items = BTreeSet::new();
        for example in &examples {
            if example.features.schema() != &schema {
                return Err(Error::FeatureMismatch {
                    expected: schema.names(),
                    actual: example.features.schema().names(),
                });
            }
            if !seen.insert((example.query_id.as_str(), example.item_id.as_str())) {
                return Err(Error::DuplicateLabel(MissingPair {
                    query_id: example.query_id.clone(),
                    item_id: example.item_id.clone(),
                }));
            }
            queries.insert(example.query_id.clone());
            items.insert(example.item_id.clone());
        }

        Ok(Self {
            examples,
            schema,
            queries: queries.into_iter().collect(),
            items: items.into_iter().collect(),
        })
    }

    pub fn examples(&self) -> &[LabeledExample] {
        &self.examples
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Distinct query ids, sorted.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    /// Distinct item ids, sorted.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Examples grouped by query, queries sorted, items in input order.
    pub fn by_query(&self) -> BTreeMap<&str, Vec<&LabeledExample>> {
        let mut groups: BTreeMap<&str, Vec<&LabeledExample>> = BTreeMap::new();
        for example in &self.examples {
            groups.entry(example.query_id.as_str()).or_default().push(example);
        }
        groups
    }

    pub fn for_query<'a>(&'a self, query_id: &'a str) -> impl Iterator<Item = &'a LabeledExample> {
        self.examples.iter().filter(move |e| e.query_id == query_id)
    }

    pub fn excluding_query<'a>(
        &'a self,
        query_id: &'a str,
    ) -> impl Iterator<Item = &'a LabeledExample> {
        self.examples.iter().filter(move |e| e.query_id != query_id)
    }

    /// Pairs of the query × item product without a label, sorted.
    pub fn missing_pairs(&self) -> Vec<MissingPair> {
        self.missing_pairs_for(&self.queries, &self.items)
    }

    /// Pairs of an explicit query × item product without a label, sorted.
    pub fn missing_pairs_for(&self, queries: &[String], items: &[String]) -> Vec<MissingPair> {
        let labeled: AHashSet<(&str, &str)> = self
            .examples
            .iter()
            .map(|e| (e.query_id.as_str(), e.item_id.as_str()))
            .collect();
        let mut missing = Vec::new();
        for query_id in queries {
            for item_id in items {
                if !labeled.contains(&(query_id.as_str(), item_id.as_str())) {
                    missing.push(MissingPair {
                        query_id: query_id.clone(),
                        item_id: item_id.clone(),
                    });
                }
            }
        }
        missing.sort();
        missing
    }

    /// Fail with every missing pair enumerated unless the product is fully covered.
    pub fn ensure_full_coverage(&self) -> Result<()> {
        let missing = self.missing_pairs();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingLabels { missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;

    fn vector(sim: f64) -> FeatureVector {
        let schema = FeatureSchema::new(&[Feature::Similarity]).unwrap();
        FeatureVector::new(schema, vec![sim]).unwrap()
    }

    fn example(q: &str, i: &str, label: i64) -> LabeledExample {
        LabeledExample::new(q, i, vector(0.5), label).unwrap()
    }

    #[test]
    fn test_grade_bounds() {
        assert!(Grade::new(0).is_none());
        assert!(Grade::new(6).is_none());
        assert_eq!(Grade::new(3).unwrap().value(), 3);
        assert!(matches!(
            LabeledExample::new("r1", "j1", vector(0.1), 9),
            Err(Error::InvalidLabel { label: 9, .. })
        ));
    }

    #[test]
    fn test_grade_serde() {
        let grade: Grade = serde_json::from_str("4").unwrap();
        assert_eq!(grade.value(), 4);
        assert!(serde_json::from_str::<Grade>("7").is_err());
    }

    #[test]
    fn test_full_coverage() {
        let set = LabelSet::new(vec![
            example("r1", "j1", 5),
            example("r1", "j2", 1),
            example("r2", "j1", 3),
            example("r2", "j2", 2),
        ])
        .unwrap();
        assert_eq!(set.queries(), &["r1", "r2"]);
        assert_eq!(set.items(), &["j1", "j2"]);
        assert!(set.ensure_full_coverage().is_ok());
    }

    #[test]
    fn test_missing_pair_enumerated() {
        let set = LabelSet::new(vec![
            example("r1", "j1", 5),
            example("r1", "j2", 1),
            example("r2", "j1", 3),
        ])
        .unwrap();
        match set.ensure_full_coverage() {
            Err(Error::MissingLabels { missing }) => {
                assert_eq!(
                    missing,
                    vec![MissingPair { query_id: "r2".into(), item_id: "j2".into() }]
                );
            }
            other => panic!("expected missing labels, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = LabelSet::new(vec![example("r1", "j1", 5), example("r1", "j1", 2)]).unwrap_err();
        assert!(matches!(err, Error::DuplicateLabel(_)));
    }

    #[test]
    fn test_mixed_schema_rejected() {
        let other = FeatureVector::new(FeatureSchema::learned_default(), vec![0.2, 0.3]).unwrap();
        let err = LabelSet::new(vec![
            example("r1", "j1", 5),
            LabeledExample::new("r1", "j2", other, 2).unwrap(),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::FeatureMismatch { .. }));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(LabelSet::new(vec![]), Err(Error::EmptyLabelSet)));
    }

    #[test]
    fn test_grouping() {
        let set = LabelSet::new(vec![
            example("r2", "j1", 3),
            example("r1", "j1", 5),
            example("r1", "j2", 1),
        ])
        .unwrap();
        let groups = set.by_query();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["r1", "r2"]);
        assert_eq!(groups["r1"].len(), 2);
        assert_eq!(set.excluding_query("r1").count(), 1);
        assert_eq!(set.for_query("r1").count(), 2);
    }
}
