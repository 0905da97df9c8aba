//! Runtime ranker selection
//!
//! The selector owns the handle to the persisted learned model. The model is
//! loaded on first use, shared read-only behind an [`Arc`], and replaced only by
//! swapping the handle in [`RankerSelector::reload_model`].
//!
//! A request for the learned ranker that cannot be honored (no model, corrupt
//! bundle, feature-list mismatch) is served by the heuristic and reported as
//! [`RankerId::HeuristicFallback`], never silently.

use jobrank_core::{
    heuristic_score, sort_by_score_desc, Candidate, FeatureSchema, RankedItem, RankingConfig,
    Result,
};
use jobrank_ltr::RankingModel;
use jobrank_storage::ModelStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Strategy requested by the caller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RankerKind {
    #[default]
    Heuristic,
    Learned,
}

impl FromStr for RankerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "heuristic" => Ok(RankerKind::Heuristic),
            "learned" => Ok(RankerKind::Learned),
            other => Err(format!("unknown ranker '{other}', expected 'heuristic' or 'learned'")),
        }
    }
}

/// Strategy that actually produced a ranking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RankerId {
    Learned,
    Heuristic,
    HeuristicFallback,
}

impl RankerId {
    pub fn as_str(self) -> &'static str {
        match self {
            RankerId::Learned => "learned",
            RankerId::Heuristic => "heuristic",
            RankerId::HeuristicFallback => "heuristic_fallback",
        }
    }
}

impl fmt::Display for RankerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingResponse {
    pub requested: RankerKind,
    pub ranker: RankerId,
    /// Why the learned ranker was not used, when it was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub items: Vec<RankedItem>,
}

enum ModelSlot {
    Unloaded,
    Loaded(Arc<RankingModel>),
    Failed(String),
}

pub struct RankerSelector {
    store: Option<ModelStore>,
    learned_schema: FeatureSchema,
    slot: RwLock<ModelSlot>,
}

impl RankerSelector {
    /// Serve the model persisted in `store`, validated against `learned_schema`.
    pub fn new(store: ModelStore, learned_schema: FeatureSchema) -> Self {
        Self {
            store: Some(store),
            learned_schema,
            slot: RwLock::new(ModelSlot::Unloaded),
        }
    }

    /// A selector with no model configured; learned requests always fall back.
    pub fn without_model(learned_schema: FeatureSchema) -> Self {
        Self {
            store: None,
            learned_schema,
            slot: RwLock::new(ModelSlot::Failed("no model configured".into())),
        }
    }

    pub fn learned_schema(&self) -> &FeatureSchema {
        &self.learned_schema
    }

    /// The learned model, loading it on first use. A failed load is remembered
    /// until the next [`reload_model`](Self::reload_model).
    pub fn model(&self) -> std::result::Result<Arc<RankingModel>, String> {
        {
            let slot = self.slot.read();
            match &*slot {
                ModelSlot::Loaded(model) => return Ok(model.clone()),
                ModelSlot::Failed(reason) => return Err(reason.clone()),
                ModelSlot::Unloaded => {}
            }
        }

        let mut slot = self.slot.write();
        if let ModelSlot::Unloaded = &*slot {
            *slot = self.load_slot();
        }
        match &*slot {
            ModelSlot::Loaded(model) => Ok(model.clone()),
            ModelSlot::Failed(reason) => Err(reason.clone()),
            ModelSlot::Unloaded => Err("model not loaded".into()),
        }
    }

    /// Load the persisted model now and swap it in.
    ///
    /// On failure the selector serves the heuristic fallback until a later
    /// reload succeeds, and the error is returned to the operator.
    pub fn reload_model(&self) -> Result<()> {
        let loaded = match &self.store {
            Some(store) => store.load(&self.learned_schema),
            None => {
                *self.slot.write() = ModelSlot::Failed("no model configured".into());
                return Ok(());
            }
        };
        match loaded {
            Ok(model) => {
                *self.slot.write() = ModelSlot::Loaded(Arc::new(model));
                Ok(())
            }
            Err(e) => {
                warn!("Model reload failed: {}", e);
                *self.slot.write() = ModelSlot::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn load_slot(&self) -> ModelSlot {
        let Some(store) = &self.store else {
            return ModelSlot::Failed("no model configured".into());
        };
        match store.load(&self.learned_schema) {
            Ok(model) => ModelSlot::Loaded(Arc::new(model)),
            Err(e) => {
                warn!("Failed to load model from {:?}: {}", store.path(), e);
                ModelSlot::Failed(e.to_string())
            }
        }
    }

    /// Rank candidates for one query with the requested strategy.
    ///
    /// `config` is the caller's snapshot and stays fixed for the whole call.
    pub fn rank(
        &self,
        requested: RankerKind,
        config: &RankingConfig,
        candidates: &[Candidate],
    ) -> Result<RankingResponse> {
        let (ranker, fallback_reason, scores) = match requested {
            RankerKind::Heuristic => (RankerId::Heuristic, None, heuristic_scores(config, candidates)?),
            RankerKind::Learned => match self.model() {
                Ok(model) => (
                    RankerId::Learned,
                    None,
                    self.learned_scores(&model, candidates)?,
                ),
                Err(reason) => {
                    warn!("Learned ranker unavailable, using heuristic: {}", reason);
                    (
                        RankerId::HeuristicFallback,
                        Some(reason),
                        heuristic_scores(config, candidates)?,
                    )
                }
            },
        };

        let mut scored: Vec<(&Candidate, f64)> = candidates.iter().zip(scores).collect();
        sort_by_score_desc(&mut scored, |(c, score)| (*score, c.item_id.as_str()));
        let items = scored
            .into_iter()
            .enumerate()
            .map(|(i, (candidate, score))| RankedItem {
                rank: i + 1,
                item_id: candidate.item_id.clone(),
                score,
                features: candidate
                    .features
                    .iter()
                    .map(|(f, v)| (f.name().to_string(), v))
                    .collect(),
            })
            .collect();

        debug!("Ranked {} candidates with {}", candidates.len(), ranker);
        Ok(RankingResponse {
            requested,
            ranker,
            fallback_reason,
            items,
        })
    }

    fn learned_scores(&self, model: &RankingModel, candidates: &[Candidate]) -> Result<Vec<f64>> {
        candidates
            .iter()
            .map(|c| model.score(&c.features.select(&self.learned_schema)?))
            .collect()
    }
}

fn heuristic_scores(config: &RankingConfig, candidates: &[Candidate]) -> Result<Vec<f64>> {
    let schema = config.heuristic_schema()?;
    candidates
        .iter()
        .map(|c| heuristic_score(&c.features.select(&schema)?, &config.heuristic_weights))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobrank_core::{Error, Feature, FeatureVector, HeuristicWeights};
    use jobrank_ltr::TrainingSummary;
    use tempfile::TempDir;

    fn config() -> RankingConfig {
        RankingConfig::from_json(
            r#"{
                "heuristic_weights": {"similarity": 0.5, "skill_coverage": 0.3, "keyword_bonus": 0.2},
                "keywords": {"max_keywords": 10},
                "gaps": {"max_gaps": 10}
            }"#,
        )
        .unwrap()
    }

    fn candidates() -> Vec<Candidate> {
        [("a", [0.9, 0.1, 0.2]), ("b", [0.2, 0.9, 0.9]), ("c", [0.5, 0.5, 0.5])]
            .into_iter()
            .map(|(id, values)| Candidate {
                item_id: id.to_string(),
                features: FeatureVector::new(FeatureSchema::current(), values.to_vec()).unwrap(),
            })
            .collect()
    }

    fn save_model(dir: &TempDir, names: &[&str], weights: Vec<f64>) -> ModelStore {
        let store = ModelStore::new(dir.path().join("ranker.bin"));
        let model = RankingModel::from_parts(
            names.iter().map(|n| n.to_string()).collect(),
            1,
            weights,
            0.0,
            0.1,
            TrainingSummary::default(),
        )
        .unwrap();
        store.save(&model).unwrap();
        store
    }

    fn order(response: &RankingResponse) -> Vec<&str> {
        response.items.iter().map(|i| i.item_id.as_str()).collect()
    }

    #[test]
    fn test_learned_model_used_when_available() {
        let dir = TempDir::new().unwrap();
        // Keyword-heavy model prefers b; heuristic prefers a
        let store = save_model(&dir, &["similarity", "keyword_bonus"], vec![0.1, 2.0]);
        let selector = RankerSelector::new(store, FeatureSchema::learned_default());

        let response = selector.rank(RankerKind::Learned, &config(), &candidates()).unwrap();
        assert_eq!(response.ranker, RankerId::Learned);
        assert!(response.fallback_reason.is_none());
        assert_eq!(order(&response), vec!["b", "c", "a"]);
        assert_eq!(response.items[0].rank, 1);
        assert_eq!(response.items[0].features["keyword_bonus"], 0.9);
    }

    #[test]
    fn test_heuristic_requested() {
        let dir = TempDir::new().unwrap();
        let store = save_model(&dir, &["similarity", "keyword_bonus"], vec![0.1, 2.0]);
        let selector = RankerSelector::new(store, FeatureSchema::learned_default());

        let response = selector.rank(RankerKind::Heuristic, &config(), &candidates()).unwrap();
        assert_eq!(response.ranker, RankerId::Heuristic);
        // a: 0.52, b: 0.55, c: 0.5
        assert_eq!(order(&response), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_mismatched_model_falls_back() {
        let dir = TempDir::new().unwrap();
        let store = save_model(&dir, &["similarity", "skill_coverage"], vec![1.0, 1.0]);
        let selector = RankerSelector::new(store, FeatureSchema::current());

        let response = selector.rank(RankerKind::Learned, &config(), &candidates()).unwrap();
        assert_eq!(response.ranker, RankerId::HeuristicFallback);
        assert_eq!(response.ranker.as_str(), "heuristic_fallback");
        assert!(response.fallback_reason.unwrap().contains("mismatch"));
        assert!(matches!(selector.reload_model(), Err(Error::FeatureMismatch { .. })));
    }

    #[test]
    fn test_missing_model_falls_back() {
        let dir = TempDir::new().unwrap();
        let selector = RankerSelector::new(
            ModelStore::new(dir.path().join("absent.bin")),
            FeatureSchema::learned_default(),
        );
        let response = selector.rank(RankerKind::Learned, &config(), &candidates()).unwrap();
        assert_eq!(response.ranker, RankerId::HeuristicFallback);

        let none = RankerSelector::without_model(FeatureSchema::learned_default());
        let response = none.rank(RankerKind::Learned, &config(), &candidates()).unwrap();
        assert_eq!(response.ranker, RankerId::HeuristicFallback);
    }

    #[test]
    fn test_reload_swaps_model() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ranker.bin");
        let selector = RankerSelector::new(ModelStore::new(&path), FeatureSchema::learned_default());
        assert!(selector.model().is_err());

        let store = save_model(&dir, &["similarity", "keyword_bonus"], vec![1.0, 0.0]);
        assert_eq!(store.path(), path.as_path());
        // Failure is remembered until an explicit reload
        assert!(selector.model().is_err());
        selector.reload_model().unwrap();

        let held = selector.model().unwrap();
        let response = selector.rank(RankerKind::Learned, &config(), &candidates()).unwrap();
        assert_eq!(response.ranker, RankerId::Learned);
        assert_eq!(order(&response), vec!["a", "c", "b"]);

        save_model(&dir, &["similarity", "keyword_bonus"], vec![0.0, 1.0]);
        selector.reload_model().unwrap();
        // Handles taken before the swap keep the old weights
        assert_eq!(held.weights(), &[1.0, 0.0]);
        assert_eq!(selector.model().unwrap().weights(), &[0.0, 1.0]);
    }

    #[test]
    fn test_heuristic_ignores_learned_only_features() {
        let mut config = config();
        config.learned_features = vec![Feature::Similarity, Feature::GapPenalty];
        config.heuristic_weights = HeuristicWeights::new([
            (Feature::Similarity, 1.0),
            (Feature::SkillCoverage, 0.0),
            (Feature::KeywordBonus, 0.0),
        ]);
        let schema = config.dataset_schema().unwrap();
        let candidates = vec![Candidate {
            item_id: "x".into(),
            features: FeatureVector::new(schema, vec![0.4, 0.1, 0.1, -0.5]).unwrap(),
        }];
        let selector = RankerSelector::without_model(config.learned_schema().unwrap());
        let response = selector.rank(RankerKind::Heuristic, &config, &candidates).unwrap();
        assert!((response.items[0].score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_ranker_kind_parse() {
        assert_eq!("learned".parse::<RankerKind>().unwrap(), RankerKind::Learned);
        assert!("neural".parse::<RankerKind>().is_err());
    }
}
