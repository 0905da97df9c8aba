//! Pairwise model training
//!
//! `train_pairwise_model` runs the whole pipeline for one training set:
//!
//! 1. project every example onto the learned feature schema
//! 2. build mirrored pairwise examples and check feasibility
//! 3. check the item-level vectors for multicollinearity
//! 4. fit an L2-regularized logistic regression on standardized differences
//!
//! The fit is full-batch Newton on `Σ logloss + ||w||² / (2C)` with an
//! unpenalized bias. It is deterministic: the same examples always produce
//! bit-identical weights.

use crate::collinearity::{CollinearityPolicy, CollinearityReport, CollinearityThresholds};
use crate::linalg;
use crate::model::{RankingModel, TrainingSummary};
use crate::pairwise::{Infeasibility, PairwiseConfig, PairwiseDataset};
use jobrank_core::{Error, FeatureSchema, LabeledExample, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const DEFAULT_INVERSE_REGULARIZATION: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingConfig {
    #[serde(default)]
    pub pairwise: PairwiseConfig,
    /// Inverse L2 strength `C`; smaller is stronger
    #[serde(default = "default_inverse_regularization")]
    pub inverse_regularization: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub collinearity: CollinearityThresholds,
    #[serde(default)]
    pub collinearity_policy: CollinearityPolicy,
}

fn default_inverse_regularization() -> f64 {
    DEFAULT_INVERSE_REGULARIZATION
}

fn default_max_iterations() -> usize {
    100
}

fn default_tolerance() -> f64 {
    1e-10
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            pairwise: PairwiseConfig::default(),
            inverse_regularization: DEFAULT_INVERSE_REGULARIZATION,
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            collinearity: CollinearityThresholds::default(),
            collinearity_policy: CollinearityPolicy::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        self.pairwise.validate()?;
        if !(self.inverse_regularization.is_finite() && self.inverse_regularization > 0.0) {
            return Err(Error::Config(format!(
                "inverse_regularization must be positive, got {}",
                self.inverse_regularization
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".into()));
        }
        Ok(())
    }
}

/// Result of a training attempt. Infeasibility is expected on small folds and
/// is resolved by the caller falling back to the heuristic.
#[derive(Debug, Clone)]
pub enum TrainingOutcome {
    Trained(RankingModel),
    Infeasible(Infeasibility),
}

impl TrainingOutcome {
    pub fn model(&self) -> Option<&RankingModel> {
        match self {
            TrainingOutcome::Trained(model) => Some(model),
            TrainingOutcome::Infeasible(_) => None,
        }
    }

    pub fn into_model(self) -> Option<RankingModel> {
        match self {
            TrainingOutcome::Trained(model) => Some(model),
            TrainingOutcome::Infeasible(_) => None,
        }
    }
}

/// Train a pairwise model on `schema`, projecting each example onto it first.
///
/// Errors are structural: an example missing a schema feature, an invalid
/// config, or flagged multicollinearity under [`CollinearityPolicy::Reject`].
pub fn train_pairwise_model<'a>(
    schema: &FeatureSchema,
    examples: impl IntoIterator<Item = &'a LabeledExample>,
    config: &TrainingConfig,
) -> Result<TrainingOutcome> {
    config.validate()?;

    let projected = examples
        .into_iter()
        .map(|e| {
            Ok(LabeledExample {
                features: e.features.select(schema)?,
                ..e.clone()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let dataset = PairwiseDataset::build(schema, &projected, &config.pairwise)?;
    if let Some(reason) = dataset.infeasibility(config.pairwise.min_examples) {
        info!("Pairwise training infeasible: {}", reason);
        return Ok(TrainingOutcome::Infeasible(reason));
    }

    let report = CollinearityReport::compute(
        schema,
        projected.iter().map(|e| &e.features),
        &config.collinearity,
    )?;
    report.enforce(config.collinearity_policy)?;

    let fit = fit_logistic(&dataset, config);
    let summary = TrainingSummary {
        pairs: dataset.len(),
        queries: dataset.positives_per_query().len(),
        iterations: fit.iterations,
        converged: fit.converged,
        log_loss: fit.log_loss,
    };
    if !fit.converged {
        warn!(
            "Logistic fit did not converge after {} iterations",
            fit.iterations
        );
    }

    let model = RankingModel::trained(
        schema,
        fit.weights,
        fit.bias,
        config.inverse_regularization,
        summary,
    );
    let violations = model.sign_violations();
    if !violations.is_empty() {
        warn!(
            "Learned negative weights for {:?}; check feature redundancy",
            violations
        );
    }
    info!(
        "Trained pairwise model on {} pairs from {} queries: weights {:?}, bias {:.4}",
        dataset.len(),
        model.training().queries,
        model.weights(),
        model.bias()
    );
    Ok(TrainingOutcome::Trained(model))
}

struct Fit {
    weights: Vec<f64>,
    bias: f64,
    iterations: usize,
    converged: bool,
    log_loss: f64,
}

/// Per-column mean and scale of the difference matrix. A constant column keeps
/// scale 1 so it maps to a zero weight instead of dividing by zero.
fn column_stats(rows: &[&[f64]], dims: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len() as f64;
    let mut means = vec![0.0; dims];
    for row in rows {
        for (m, x) in means.iter_mut().zip(row.iter()) {
            *m += x;
        }
    }
    means.iter_mut().for_each(|m| *m /= n);

    let mut scales = vec![0.0; dims];
    for row in rows {
        for ((s, x), m) in scales.iter_mut().zip(row.iter()).zip(&means) {
            *s += (x - m) * (x - m);
        }
    }
    for s in scales.iter_mut() {
        let std = (*s / n).sqrt();
        *s = if std > f64::EPSILON { std } else { 1.0 };
    }
    (means, scales)
}

/// Numerically stable `ln(1 + e^z)`.
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn fit_logistic(dataset: &PairwiseDataset, config: &TrainingConfig) -> Fit {
    let dims = dataset.schema().len();
    let rows: Vec<&[f64]> = dataset
        .examples()
        .iter()
        .map(|e| e.difference.as_slice())
        .collect();
    let targets: Vec<f64> = dataset
        .examples()
        .iter()
        .map(|e| if e.preferred { 1.0 } else { 0.0 })
        .collect();
    let (means, scales) = column_stats(&rows, dims);
    let standardized: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&means)
                .zip(&scales)
                .map(|((x, m), s)| (x - m) / s)
                .collect()
        })
        .collect();

    let lambda = 1.0 / config.inverse_regularization;
    // theta = [w_0 .. w_{d-1}, b]
    let mut theta = vec![0.0; dims + 1];
    let objective = |theta: &[f64]| -> (f64, f64) {
        let mut loss = 0.0;
        for (z_row, y) in standardized.iter().zip(&targets) {
            let z = linear(theta, z_row);
            loss += softplus(z) - y * z;
        }
        let penalty: f64 = theta[..dims].iter().map(|w| w * w).sum::<f64>() * lambda / 2.0;
        (loss + penalty, loss)
    };

    let (mut current, _) = objective(&theta);
    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iterations {
        iterations += 1;

        let mut gradient = vec![0.0; dims + 1];
        let mut hessian = vec![vec![0.0; dims + 1]; dims + 1];
        for (z_row, y) in standardized.iter().zip(&targets) {
            let p = sigmoid(linear(&theta, z_row));
            let residual = p - y;
            let curvature = p * (1.0 - p);
            for i in 0..=dims {
                let xi = augmented(z_row, i);
                gradient[i] += residual * xi;
                for j in 0..=dims {
                    hessian[i][j] += curvature * xi * augmented(z_row, j);
                }
            }
        }
        for i in 0..dims {
            gradient[i] += lambda * theta[i];
            hessian[i][i] += lambda;
        }

        let Some(step) = linalg::solve(hessian, gradient) else {
            debug!("Singular Hessian at iteration {}", iterations);
            break;
        };

        // Backtrack when a full Newton step overshoots.
        let mut scale = 1.0;
        let mut candidate = theta.clone();
        let mut accepted = false;
        for _ in 0..30 {
            for ((c, t), s) in candidate.iter_mut().zip(&theta).zip(&step) {
                *c = t - scale * s;
            }
            let (value, _) = objective(&candidate);
            if value <= current {
                current = value;
                accepted = true;
                break;
            }
            scale /= 2.0;
        }
        if !accepted {
            converged = true;
            break;
        }

        let step_size = step.iter().map(|s| (scale * s).abs()).fold(0.0, f64::max);
        theta = candidate;
        if step_size < config.tolerance {
            converged = true;
            break;
        }
    }

    let (_, data_loss) = objective(&theta);
    let bias_shift: f64 = (0..dims).map(|j| theta[j] * means[j] / scales[j]).sum();
    Fit {
        weights: (0..dims).map(|j| theta[j] / scales[j]).collect(),
        bias: theta[dims] - bias_shift,
        iterations,
        converged,
        log_loss: data_loss / targets.len() as f64,
    }
}

fn linear(theta: &[f64], row: &[f64]) -> f64 {
    let dims = row.len();
    theta[..dims].iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + theta[dims]
}

fn augmented(row: &[f64], i: usize) -> f64 {
    row.get(i).copied().unwrap_or(1.0)
}
