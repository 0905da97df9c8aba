//! # jobrank Eval
//!
//! Leave-one-query-out evaluation of the ranking strategies.
//!
//! - [`run_loocv_ablation`] - one fold per query, a fresh model per fold
//! - [`ndcg_at_k`], [`precision_at_k`] - rank-quality metrics on weak labels
//! - [`AblationReport`] - per-fold records and mean ± std per strategy

pub mod loocv;
pub mod metrics;
pub mod report;

pub use loocv::{run_loocv_ablation, CancellationToken, LoocvConfig};
pub use metrics::{ndcg_at_k, precision_at_k, Judgments};
pub use report::{AblationReport, FoldResult, MetricSummary, MetricValues, Strategy};
