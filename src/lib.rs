//! # jobrank
//!
//! Explainable resume-to-job ranking with a pairwise learning-to-rank model
//! trained from weak labels.
//!
//! jobrank scores (resume, job) pairs from a small, versioned set of
//! interpretable features. Two scorers share that feature vector: a configured
//! weighted sum (the heuristic) and a linear model learned from pairwise
//! preferences. Every ranking reports which scorer produced it.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! jobrank --config config/ranking.json train --labels data/labels.jsonl
//! jobrank --config config/ranking.json evaluate --labels data/labels.jsonl --parallel
//! jobrank --config config/ranking.json rank --candidates data/candidates.jsonl --ranker learned --model data/model.bin
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use jobrank::prelude::*;
//!
//! # fn main() -> jobrank::Result<()> {
//! let config = RankingConfig::from_json(&std::fs::read_to_string("config/ranking.json")?)?;
//! let labels = load_label_set("data/labels.jsonl", &config.dataset_builder()?)?;
//! labels.ensure_full_coverage()?;
//!
//! let outcome = train_pairwise_model(
//!     &config.learned_schema()?,
//!     labels.examples(),
//!     &TrainingConfig::default(),
//! )?;
//! if let Some(model) = outcome.model() {
//!     ModelStore::new("data/model.bin").save(model)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - [`jobrank-core`](jobrank_core) - Feature catalogue, builder, heuristic scorer, config, labels
//! - [`jobrank-ltr`](jobrank_ltr) - Pairwise dataset, collinearity checks, model training
//! - [`jobrank-storage`](jobrank_storage) - Model bundles, hot-reloadable config, JSONL datasets
//! - [`jobrank-serving`](jobrank_serving) - Learned ranker with explicit heuristic fallback
//! - [`jobrank-eval`](jobrank_eval) - LOOCV ablation, NDCG and precision

// Re-export core types
pub use jobrank_core::{
    heuristic_score, Candidate, Error, Feature, FeatureBuilder, FeatureSchema, FeatureSignals,
    FeatureVector, Grade, HeuristicWeights, LabelSet, LabeledExample, RankedItem, RankingConfig,
    Result, FEATURE_CATALOGUE_VERSION,
};

// Re-export learning-to-rank
pub use jobrank_ltr::{
    train_pairwise_model, CollinearityPolicy, CollinearityReport, Infeasibility, PairwiseConfig,
    PairwiseDataset, RankingModel, TrainingConfig, TrainingOutcome,
};

// Re-export storage
pub use jobrank_storage::{load_candidates, load_label_set, ConfigStore, ModelStore};

// Re-export serving
pub use jobrank_serving::{RankerId, RankerKind, RankerSelector, RankingResponse};

// Re-export evaluation
pub use jobrank_eval::{run_loocv_ablation, AblationReport, CancellationToken, LoocvConfig, Strategy};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        heuristic_score, load_candidates, load_label_set, run_loocv_ablation,
        train_pairwise_model, AblationReport, CancellationToken, Candidate, ConfigStore, Error,
        Feature, FeatureBuilder, FeatureSchema, FeatureSignals, FeatureVector, LabelSet,
        LoocvConfig, ModelStore, RankerId, RankerKind, RankerSelector, RankingConfig,
        RankingModel, Result, TrainingConfig, TrainingOutcome,
    };
}

/// Rank-quality metrics
pub mod metrics {
    pub use jobrank_eval::metrics::{ndcg_at_k, precision_at_k, Judgments};
}
