//! Leave-one-query-out cross-validation and strategy ablation
//!
//! Every distinct query is held out exactly once. A fresh pairwise model is
//! trained on the remaining queries, then every item of the held-out query is
//! scored by each strategy and the resulting orderings are evaluated against
//! the weak labels.
//!
//! The label set must cover the full query × item product; a gap aborts the run
//! before any fold is trained. Folds whose training set is infeasible, or whose
//! features are rejected as multicollinear, still report their embedding-only
//! and heuristic metrics and are flagged as fallback folds.

use crate::metrics::{ndcg_at_k, precision_at_k, Judgments};
use crate::report::{AblationReport, FoldResult, MetricValues, Strategy};
use jobrank_core::{
    heuristic_score, sort_by_score_desc, Error, Feature, FeatureSchema, Grade, LabelSet,
    LabeledExample, RankingConfig, Result,
};
use jobrank_ltr::{train_pairwise_model, Infeasibility, TrainingConfig, TrainingOutcome};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_CUTOFFS: [usize; 2] = [5, 10];
pub const DEFAULT_RELEVANCE_THRESHOLD: u8 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoocvConfig {
    #[serde(default)]
    pub training: TrainingConfig,
    /// Rank cutoffs for NDCG and precision
    #[serde(default = "default_cutoffs")]
    pub cutoffs: Vec<usize>,
    /// Minimum label counted as relevant by precision
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: u8,
    /// Run folds on the rayon thread pool
    #[serde(default)]
    pub parallel: bool,
}

fn default_cutoffs() -> Vec<usize> {
    DEFAULT_CUTOFFS.to_vec()
}

fn default_relevance_threshold() -> u8 {
    DEFAULT_RELEVANCE_THRESHOLD
}

impl Default for LoocvConfig {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            cutoffs: default_cutoffs(),
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            parallel: false,
        }
    }
}

impl LoocvConfig {
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        if self.cutoffs.is_empty() || self.cutoffs.contains(&0) {
            return Err(Error::Config("cutoffs must be non-empty and positive".into()));
        }
        self.threshold()?;
        Ok(())
    }

    fn threshold(&self) -> Result<Grade> {
        Grade::new(i64::from(self.relevance_threshold)).ok_or_else(|| {
            Error::Config(format!(
                "relevance_threshold {} outside 1..=5",
                self.relevance_threshold
            ))
        })
    }

    /// Metric names in report order: all NDCG cutoffs, then all precision cutoffs.
    pub fn metric_names(&self) -> Vec<String> {
        let ndcg = self.cutoffs.iter().map(|k| format!("ndcg@{k}"));
        let precision = self.cutoffs.iter().map(|k| format!("precision@{k}"));
        ndcg.chain(precision).collect()
    }
}

/// Coarse cancellation for a long evaluation run.
///
/// Checked before each fold starts; a fold in progress always completes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Schemas and weights shared by every fold.
struct FoldContext<'a> {
    labels: &'a LabelSet,
    config: &'a RankingConfig,
    loocv: &'a LoocvConfig,
    heuristic_schema: FeatureSchema,
    learned_schema: FeatureSchema,
    threshold: Grade,
}

/// Run the LOOCV ablation over a fully covered label set.
pub fn run_loocv_ablation(
    labels: &LabelSet,
    config: &RankingConfig,
    loocv: &LoocvConfig,
    cancel: &CancellationToken,
) -> Result<AblationReport> {
    labels.ensure_full_coverage()?;
    loocv.validate()?;
    config.validate()?;
    if !labels.schema().contains(Feature::Similarity) {
        return Err(Error::FeatureMismatch {
            expected: vec![Feature::Similarity.name().to_string()],
            actual: labels.schema().names(),
        });
    }

    let ctx = FoldContext {
        labels,
        config,
        loocv,
        heuristic_schema: config.heuristic_schema()?,
        learned_schema: config.learned_schema()?,
        threshold: loocv.threshold()?,
    };
    let queries = labels.queries();
    info!(
        "Starting LOOCV over {} queries x {} items ({})",
        queries.len(),
        labels.items().len(),
        if loocv.parallel { "parallel" } else { "sequential" }
    );

    let run = |(index, query_id): (usize, &String)| -> Result<Option<FoldResult>> {
        if cancel.is_cancelled() {
            debug!("Skipping fold for {}: cancelled", query_id);
            return Ok(None);
        }
        let fold = run_fold(&ctx, query_id)?;
        info!(
            "Fold {}/{} held out {}: {}",
            index + 1,
            queries.len(),
            query_id,
            if fold.fell_back { "fell back to heuristic" } else { "trained" }
        );
        Ok(Some(fold))
    };

    let outcomes: Vec<Option<FoldResult>> = if loocv.parallel {
        queries
            .par_iter()
            .enumerate()
            .map(run)
            .collect::<Result<_>>()?
    } else {
        queries
            .iter()
            .enumerate()
            .map(run)
            .collect::<Result<_>>()?
    };
    let folds: Vec<FoldResult> = outcomes.into_iter().flatten().collect();

    let report = AblationReport::new(queries.len(), loocv.metric_names(), folds);
    if report.partial {
        warn!(
            "LOOCV cancelled: {} of {} folds completed",
            report.completed_folds, report.total_queries
        );
    } else {
        info!(
            "LOOCV complete: {} folds, {} fell back",
            report.completed_folds, report.fallback_folds
        );
    }
    Ok(report)
}

fn run_fold(ctx: &FoldContext<'_>, held_out: &str) -> Result<FoldResult> {
    let outcome = match train_pairwise_model(
        &ctx.learned_schema,
        ctx.labels.excluding_query(held_out),
        &ctx.loocv.training,
    ) {
        Ok(outcome) => outcome,
        Err(Error::Multicollinearity(detail)) => {
            TrainingOutcome::Infeasible(Infeasibility::Collinear { detail })
        }
        Err(e) => return Err(e),
    };
    let test: Vec<&LabeledExample> = ctx.labels.for_query(held_out).collect();
    let judgments: Judgments<'_> = test.iter().map(|e| (e.item_id.as_str(), e.label)).collect();

    let mut metrics = BTreeMap::new();
    let embedding = score_all(&test, |e| {
        e.features
            .get(Feature::Similarity)
            .ok_or(Error::MissingSignal("similarity"))
    })?;
    metrics.insert(Strategy::EmbeddingOnly, ctx.evaluate(embedding, &judgments));

    let heuristic = score_all(&test, |e| {
        heuristic_score(
            &e.features.select(&ctx.heuristic_schema)?,
            &ctx.config.heuristic_weights,
        )
    })?;
    let heuristic_metrics = ctx.evaluate(heuristic, &judgments);
    metrics.insert(Strategy::Heuristic, heuristic_metrics.clone());

    let (model, infeasibility) = match outcome {
        TrainingOutcome::Trained(model) => {
            let learned = score_all(&test, |e| {
                model.score(&e.features.select(&ctx.learned_schema)?)
            })?;
            let learned_metrics = ctx.evaluate(learned, &judgments);
            metrics.insert(Strategy::Learned, learned_metrics.clone());
            metrics.insert(Strategy::LearnedWithFallback, learned_metrics);
            (Some(model), None)
        }
        TrainingOutcome::Infeasible(reason) => {
            warn!("Fold {} falls back to heuristic: {}", held_out, reason);
            metrics.insert(Strategy::LearnedWithFallback, heuristic_metrics);
            (None, Some(reason))
        }
    };

    Ok(FoldResult {
        held_out: held_out.to_string(),
        test_items: test.len(),
        fell_back: model.is_none(),
        model,
        infeasibility,
        metrics,
    })
}

fn score_all<'a>(
    test: &[&'a LabeledExample],
    score: impl Fn(&LabeledExample) -> Result<f64>,
) -> Result<Vec<(&'a str, f64)>> {
    test.iter()
        .map(|&e| Ok((e.item_id.as_str(), score(e)?)))
        .collect()
}

impl FoldContext<'_> {
    fn evaluate(&self, mut scored: Vec<(&str, f64)>, judgments: &Judgments<'_>) -> MetricValues {
        sort_by_score_desc(&mut scored, |(id, score)| (*score, *id));
        let ranked: Vec<&str> = scored.into_iter().map(|(id, _)| id).collect();

        let mut values = MetricValues::new();
        for &k in &self.loocv.cutoffs {
            values.insert(format!("ndcg@{k}"), ndcg_at_k(&ranked, judgments, k));
        }
        for &k in &self.loocv.cutoffs {
            values.insert(
                format!("precision@{k}"),
                precision_at_k(&ranked, judgments, k, self.threshold),
            );
        }
        values
    }
}
