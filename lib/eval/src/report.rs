//! Ablation results and aggregation

use chrono::{DateTime, Utc};
use jobrank_core::Result;
use jobrank_ltr::{Infeasibility, RankingModel};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// A ranking strategy compared by the ablation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Similarity score alone
    EmbeddingOnly,
    /// Configured weighted sum
    Heuristic,
    /// The fold's learned model; folds that fell back are excluded
    Learned,
    /// The learned model where trained, the heuristic where the fold fell back
    LearnedWithFallback,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::EmbeddingOnly,
        Strategy::Heuristic,
        Strategy::Learned,
        Strategy::LearnedWithFallback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::EmbeddingOnly => "embedding_only",
            Strategy::Heuristic => "heuristic",
            Strategy::Learned => "learned",
            Strategy::LearnedWithFallback => "learned_with_fallback",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric values keyed by metric name, e.g. `ndcg@5`.
pub type MetricValues = BTreeMap<String, f64>;

/// One LOOCV split.
#[derive(Debug, Clone, Serialize)]
pub struct FoldResult {
    pub held_out: String,
    pub test_items: usize,
    /// The fold's model, absent when training was infeasible
    pub model: Option<RankingModel>,
    /// Set when the learned strategy fell back to the heuristic
    pub fell_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infeasibility: Option<Infeasibility>,
    pub metrics: BTreeMap<Strategy, MetricValues>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub folds: usize,
}

impl MetricSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Some(Self {
            mean,
            std: variance.sqrt(),
            folds: values.len(),
        })
    }
}

/// Output of a LOOCV ablation run.
#[derive(Debug, Clone, Serialize)]
pub struct AblationReport {
    pub generated_at: DateTime<Utc>,
    pub total_queries: usize,
    pub completed_folds: usize,
    /// Set when the run was cancelled before every fold completed
    pub partial: bool,
    pub fallback_folds: usize,
    /// Metric names in display order
    pub metric_names: Vec<String>,
    pub summary: BTreeMap<Strategy, BTreeMap<String, MetricSummary>>,
    pub folds: Vec<FoldResult>,
}

impl AblationReport {
    pub fn new(total_queries: usize, metric_names: Vec<String>, folds: Vec<FoldResult>) -> Self {
        let mut summary = BTreeMap::new();
        for strategy in Strategy::ALL {
            let mut per_metric = BTreeMap::new();
            for name in &metric_names {
                let values: Vec<f64> = folds
                    .iter()
                    .filter_map(|f| f.metrics.get(&strategy)?.get(name).copied())
                    .collect();
                if let Some(s) = MetricSummary::from_values(&values) {
                    per_metric.insert(name.clone(), s);
                }
            }
            if !per_metric.is_empty() {
                summary.insert(strategy, per_metric);
            }
        }

        Self {
            generated_at: Utc::now(),
            total_queries,
            completed_folds: folds.len(),
            partial: folds.len() < total_queries,
            fallback_folds: folds.iter().filter(|f| f.fell_back).count(),
            metric_names,
            summary,
            folds,
        }
    }

    pub fn summary_for(&self, strategy: Strategy, metric: &str) -> Option<&MetricSummary> {
        self.summary.get(&strategy)?.get(metric)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the aggregate table.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# LOOCV Ablation Report\n");
        let _ = writeln!(out, "Generated: {}\n", self.generated_at.to_rfc3339());
        let _ = writeln!(
            out,
            "Queries: {} | Completed folds: {} | Fallback folds: {}\n",
            self.total_queries, self.completed_folds, self.fallback_folds
        );
        if self.partial {
            let _ = writeln!(
                out,
                "**Partial run**: {} of {} folds completed; aggregates cover completed folds only.\n",
                self.completed_folds, self.total_queries
            );
        }

        let _ = writeln!(out, "| Strategy | Folds | {} |", self.metric_names.join(" | "));
        let _ = writeln!(out, "|---|---|{}", "---|".repeat(self.metric_names.len()));
        for (strategy, metrics) in &self.summary {
            let folds = metrics.values().map(|m| m.folds).max().unwrap_or(0);
            let cells: Vec<String> = self
                .metric_names
                .iter()
                .map(|name| match metrics.get(name) {
                    Some(m) => format!("{:.4} ± {:.4}", m.mean, m.std),
                    None => "n/a".to_string(),
                })
                .collect();
            let _ = writeln!(out, "| {} | {} | {} |", strategy, folds, cells.join(" | "));
        }

        if self.fallback_folds > 0 {
            let held_out: Vec<&str> = self
                .folds
                .iter()
                .filter(|f| f.fell_back)
                .map(|f| f.held_out.as_str())
                .collect();
            let _ = writeln!(
                out,
                "\nFolds that fell back to the heuristic: {}",
                held_out.join(", ")
            );
        }
        out
    }
}
