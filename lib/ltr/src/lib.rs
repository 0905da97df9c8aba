//! # jobrank LTR
//!
//! Pairwise learning-to-rank over weakly labeled (query, item) examples.
//!
//! - [`PairwiseDataset`] - same-query, gap-thresholded, mirrored pair construction
//! - [`CollinearityReport`] - Pearson correlation and VIF diagnostics
//! - [`train_pairwise_model`] - L2 logistic regression on pair differences
//! - [`RankingModel`] - immutable linear scorer with its feature-name list
//!
//! Redundant features are handled by selection, not transformation: the model
//! is trained on an explicit sub-schema and training refuses multicollinear
//! inputs unless told to only warn.

mod linalg;

pub mod collinearity;
pub mod model;
pub mod pairwise;
pub mod trainer;

pub use collinearity::{
    CollinearityPolicy, CollinearityReport, CollinearityThresholds, CorrelatedPair,
    InflatedFeature,
};
pub use model::{FeatureWeight, RankingModel, TrainingSummary};
pub use pairwise::{Infeasibility, PairwiseConfig, PairwiseDataset, PairwiseExample};
pub use trainer::{train_pairwise_model, TrainingConfig, TrainingOutcome};
