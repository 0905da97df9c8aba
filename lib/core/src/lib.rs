//! # jobrank Core
//!
//! Core library for jobrank.
//!
//! This crate provides the building blocks shared by every ranking strategy:
//!
//! - [`FeatureVector`] - Fixed-order, versioned vector of named features
//! - [`FeatureBuilder`] - Signals for a (query, item) pair to a feature vector
//! - [`heuristic_score`] - Configurable weighted sum over a feature vector
//! - [`RankingConfig`] - Validated weights, keyword lists and feature selections
//! - [`LabelSet`] - Weakly labeled examples with coverage checks
//!
//! ## Example
//!
//! ```rust
//! use jobrank_core::{
//!     heuristic_score, Feature, FeatureBuilder, FeatureSchema, FeatureSignals,
//!     GapConfig, HeuristicWeights, KeywordConfig, SkillConfig,
//! };
//!
//! let skills = SkillConfig {
//!     keywords: KeywordConfig {
//!         high_priority: vec!["Rust".to_string()],
//!         high_priority_multiplier: 1.5,
//!         max_keywords: 10,
//!     },
//!     gaps: GapConfig {
//!         critical_skills: vec![],
//!         critical_multiplier: 1.5,
//!         max_gaps: 10,
//!     },
//! };
//! let builder = FeatureBuilder::new(FeatureSchema::current(), skills);
//! let signals = FeatureSignals::new(0.82, ["rust", "sql"], ["rust", "go"]);
//! let vector = builder.build(&signals).unwrap();
//!
//! let weights = HeuristicWeights::new([
//!     (Feature::Similarity, 0.5),
//!     (Feature::SkillCoverage, 0.3),
//!     (Feature::KeywordBonus, 0.2),
//! ]);
//! let score = heuristic_score(&vector, &weights).unwrap();
//! assert!(score > 0.0);
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod feature;
pub mod heuristic;
pub mod label;
pub mod rank;

pub use builder::{FeatureBuilder, FeatureSignals};
pub use config::{GapConfig, KeywordConfig, RankingConfig, SkillConfig};
pub use error::{Error, MissingPair, Result};
pub use feature::{Feature, FeatureSchema, FeatureVector, FEATURE_CATALOGUE_VERSION};
pub use heuristic::{heuristic_score, HeuristicWeights};
pub use label::{Grade, LabelSet, LabeledExample};
pub use rank::{ranked_ids, sort_by_score_desc, Candidate, RankedItem};
