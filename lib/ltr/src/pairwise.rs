//! Pairwise dataset construction
//!
//! Turns weakly labeled examples into "A should outrank B" classification
//! examples. Pairs are only formed between items of the same query and only
//! when the label gap is at least `min_gap`; near-ties in weak labels are noise.
//!
//! Every positive example `(f(A) - f(B), 1)` is followed by its mirror `(f(B) - f(A), 0)`.
//! Without the mirror a query whose labels separate cleanly yields a single
//! class and the classifier cannot be fit at all.

use jobrank_core::{Error, FeatureSchema, LabeledExample, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_MIN_GAP: u8 = 2;
pub const DEFAULT_MIN_EXAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairwiseConfig {
    /// Minimum label difference for a pair, on the 1..=5 scale
    #[serde(default = "default_min_gap")]
    pub min_gap: u8,
    /// Emit the negated, label-0 mirror of every positive example
    #[serde(default = "default_mirror")]
    pub mirror: bool,
    /// Below this many examples (mirrors included) training is infeasible
    #[serde(default = "default_min_examples")]
    pub min_examples: usize,
}

fn default_min_gap() -> u8 {
    DEFAULT_MIN_GAP
}

fn default_mirror() -> bool {
    true
}

fn default_min_examples() -> usize {
    DEFAULT_MIN_EXAMPLES
}

impl Default for PairwiseConfig {
    fn default() -> Self {
        Self {
            min_gap: DEFAULT_MIN_GAP,
            mirror: true,
            min_examples: DEFAULT_MIN_EXAMPLES,
        }
    }
}

impl PairwiseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_gap == 0 {
            return Err(Error::Config("min_gap must be at least 1".into()));
        }
        Ok(())
    }
}

/// One classification example: a feature difference and whether the first
/// item of the pair is preferred.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseExample {
    pub difference: Vec<f64>,
    pub preferred: bool,
}

/// Why a dataset cannot be trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Infeasibility {
    TooFewExamples { found: usize, required: usize },
    SingleClass { found: usize },
    /// Training features failed the collinearity check
    Collinear { detail: String },
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Infeasibility::TooFewExamples { found, required } => {
                write!(f, "{found} pairwise examples, at least {required} required")
            }
            Infeasibility::SingleClass { found } => {
                write!(f, "all {found} pairwise examples share one class")
            }
            Infeasibility::Collinear { detail } => {
                write!(f, "multicollinear training features: {detail}")
            }
        }
    }
}

/// Pairwise examples for one training run.
#[derive(Debug, Clone)]
pub struct PairwiseDataset {
    schema: FeatureSchema,
    examples: Vec<PairwiseExample>,
    positives_per_query: BTreeMap<String, usize>,
}

impl PairwiseDataset {
    /// Build the dataset from labeled examples, grouped by query.
    ///
    /// All example vectors must use `schema`. Items keep their input order within
    /// a query, so the output order is deterministic.
    pub fn build<'a>(
        schema: &FeatureSchema,
        examples: impl IntoIterator<Item = &'a LabeledExample>,
        config: &PairwiseConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut groups: BTreeMap<&str, Vec<&LabeledExample>> = BTreeMap::new();
        for example in examples {
            schema.ensure_names(&example.features.schema().names())?;
            groups.entry(example.query_id.as_str()).or_default().push(example);
        }

        let min_gap = i16::from(config.min_gap);
        let mut pairs = Vec::new();
        let mut positives_per_query = BTreeMap::new();
        for (query_id, items) in &groups {
            let mut positives = 0;
            for winner in items {
                for loser in items {
                    let gap = i16::from(winner.label.value()) - i16::from(loser.label.value());
                    if gap < min_gap {
                        continue;
                    }
                    let difference: Vec<f64> = winner
                        .features
                        .values()
                        .iter()
                        .zip(loser.features.values())
                        .map(|(w, l)| w - l)
                        .collect();
                    let mirror = config.mirror.then(|| PairwiseExample {
                        difference: difference.iter().map(|d| -d).collect(),
                        preferred: false,
                    });
                    pairs.push(PairwiseExample {
                        difference,
                        preferred: true,
                    });
                    pairs.extend(mirror);
                    positives += 1;
                }
            }
            positives_per_query.insert(query_id.to_string(), positives);
        }

        Ok(Self {
            schema: schema.clone(),
            examples: pairs,
            positives_per_query,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn examples(&self) -> &[PairwiseExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.examples.iter().filter(|e| e.preferred).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }

    /// Positive (un-mirrored) pairs contributed by each query, zeros included.
    pub fn positives_per_query(&self) -> &BTreeMap<String, usize> {
        &self.positives_per_query
    }

    /// `None` when the dataset can be trained on.
    pub fn infeasibility(&self, min_examples: usize) -> Option<Infeasibility> {
        if self.len() < min_examples {
            return Some(Infeasibility::TooFewExamples {
                found: self.len(),
                required: min_examples,
            });
        }
        if self.positives() == 0 || self.negatives() == 0 {
            return Some(Infeasibility::SingleClass { found: self.len() });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobrank_core::{Feature, FeatureVector};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn schema() -> FeatureSchema {
        FeatureSchema::new(&[Feature::Similarity, Feature::KeywordBonus]).unwrap()
    }

    fn example(q: &str, i: &str, sim: f64, kw: f64, label: i64) -> LabeledExample {
        let v = FeatureVector::new(schema(), vec![sim, kw]).unwrap();
        LabeledExample::new(q, i, v, label).unwrap()
    }

    #[test]
    fn test_pairs_respect_min_gap() {
        let examples = vec![
            example("r1", "a", 0.9, 0.8, 5),
            example("r1", "b", 0.7, 0.4, 4),
            example("r1", "c", 0.2, 0.1, 2),
        ];
        let config = PairwiseConfig { mirror: false, ..Default::default() };
        let dataset = PairwiseDataset::build(&schema(), &examples, &config).unwrap();
        // 5 vs 2 and 4 vs 2; 5 vs 4 is too close
        assert_eq!(dataset.len(), 2);
        assert!(dataset.examples().iter().all(|e| e.preferred));
        let first = &dataset.examples()[0].difference;
        assert!((first[0] - 0.7).abs() < 1e-12);
        assert!((first[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_mirroring_balances_classes() {
        let examples = vec![
            example("r1", "a", 0.9, 0.8, 5),
            example("r1", "b", 0.7, 0.4, 3),
            example("r1", "c", 0.2, 0.1, 1),
            example("r2", "a", 0.3, 0.8, 1),
            example("r2", "b", 0.6, 0.2, 4),
        ];
        let dataset =
            PairwiseDataset::build(&schema(), &examples, &PairwiseConfig::default()).unwrap();
        assert_eq!(dataset.positives(), dataset.negatives());
        assert_eq!(dataset.positives(), 4);
        for pair in dataset.examples().chunks(2) {
            let negated: Vec<f64> = pair[0].difference.iter().map(|d| -d).collect();
            assert_eq!(pair[1].difference, negated);
            assert!(pair[0].preferred && !pair[1].preferred);
        }
    }

    #[test]
    fn test_mirroring_balances_any_gap() {
        let mut rng = StdRng::seed_from_u64(11);
        for round in 0..50 {
            let queries = rng.random_range(1..=4);
            let mut examples = Vec::new();
            for q in 0..queries {
                let items = rng.random_range(2..=8);
                for i in 0..items {
                    examples.push(example(
                        &format!("r{q}"),
                        &format!("j{i}"),
                        rng.random_range(0.0..1.0_f64),
                        rng.random_range(0.0..1.0_f64),
                        rng.random_range(1..=5),
                    ));
                }
            }

            for min_gap in 1..=4 {
                let config = PairwiseConfig { min_gap, ..Default::default() };
                let dataset = PairwiseDataset::build(&schema(), &examples, &config).unwrap();
                assert_eq!(
                    dataset.positives(),
                    dataset.negatives(),
                    "round {round}, min_gap {min_gap}"
                );
                if !dataset.is_empty() {
                    assert!(
                        !matches!(dataset.infeasibility(0), Some(Infeasibility::SingleClass { .. })),
                        "round {round}, min_gap {min_gap}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_unmirrored_is_single_class() {
        let examples: Vec<_> = (0..5)
            .map(|i| example("r1", &format!("j{i}"), 0.2 * i as f64, 0.1, i + 1))
            .collect();
        let config = PairwiseConfig { mirror: false, min_examples: 1, ..Default::default() };
        let dataset = PairwiseDataset::build(&schema(), &examples, &config).unwrap();
        assert!(matches!(
            dataset.infeasibility(config.min_examples),
            Some(Infeasibility::SingleClass { .. })
        ));

        let mirrored =
            PairwiseDataset::build(&schema(), &examples, &PairwiseConfig::default()).unwrap();
        assert_eq!(mirrored.infeasibility(DEFAULT_MIN_EXAMPLES), None);
    }

    #[test]
    fn test_tied_query_contributes_nothing() {
        let examples = vec![
            example("flat", "a", 0.9, 0.8, 3),
            example("flat", "b", 0.1, 0.2, 3),
            example("flat", "c", 0.5, 0.5, 3),
            example("r1", "a", 0.9, 0.8, 5),
            example("r1", "b", 0.1, 0.2, 1),
        ];
        let dataset =
            PairwiseDataset::build(&schema(), &examples, &PairwiseConfig::default()).unwrap();
        assert_eq!(dataset.positives_per_query()["flat"], 0);
        assert_eq!(dataset.positives_per_query()["r1"], 1);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_no_cross_query_pairs() {
        let examples = vec![example("r1", "a", 0.9, 0.8, 5), example("r2", "b", 0.1, 0.1, 1)];
        let dataset =
            PairwiseDataset::build(&schema(), &examples, &PairwiseConfig::default()).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(
            dataset.infeasibility(DEFAULT_MIN_EXAMPLES),
            Some(Infeasibility::TooFewExamples { found: 0, required: 10 })
        );
    }

    #[test]
    fn test_schema_mismatch() {
        let other = FeatureVector::new(FeatureSchema::current(), vec![0.1, 0.2, 0.3]).unwrap();
        let examples = vec![LabeledExample::new("r1", "a", other, 5).unwrap()];
        let err = PairwiseDataset::build(&schema(), &examples, &PairwiseConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::FeatureMismatch { .. }));
    }

    #[test]
    fn test_zero_gap_rejected() {
        let config = PairwiseConfig { min_gap: 0, ..Default::default() };
        assert!(PairwiseDataset::build(&schema(), &Vec::new(), &config).is_err());
    }
}
