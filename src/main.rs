use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use jobrank_core::{FeatureVector, RankingConfig};
use jobrank_eval::{run_loocv_ablation, CancellationToken, LoocvConfig};
use jobrank_ltr::{
    train_pairwise_model, CollinearityPolicy, CollinearityReport, CollinearityThresholds,
    PairwiseConfig, RankingModel, TrainingConfig, TrainingOutcome,
};
use jobrank_serving::{RankerKind, RankerSelector};
use jobrank_storage::{load_candidates, load_label_set, ConfigStore, ModelStore};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Explainable resume-to-job ranking with a pairwise model trained from weak labels
#[derive(Parser, Debug)]
#[command(name = "jobrank")]
#[command(about = "Train, evaluate and serve a pairwise ranking model", long_about = None)]
struct Args {
    /// Path to the ranking config
    #[arg(short, long, default_value = "./config/ranking.json", global = true)]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on every labeled query and save the model bundle
    Train {
        /// Labeled examples (JSONL)
        #[arg(long)]
        labels: PathBuf,

        /// Where to write the model bundle
        #[arg(long, default_value = "./data/model.bin")]
        model_out: PathBuf,

        #[command(flatten)]
        training: TrainingArgs,
    },

    /// Leave-one-query-out evaluation of every ranking strategy
    Evaluate {
        /// Labeled examples (JSONL)
        #[arg(long)]
        labels: PathBuf,

        /// Write the full report as JSON
        #[arg(long)]
        json_out: Option<PathBuf>,

        /// Write the aggregate table as Markdown
        #[arg(long)]
        markdown_out: Option<PathBuf>,

        /// Rank cutoffs for NDCG and precision
        #[arg(long, value_delimiter = ',', default_value = "5,10")]
        cutoffs: Vec<usize>,

        /// Minimum label counted as relevant by precision
        #[arg(long, default_value_t = jobrank_eval::loocv::DEFAULT_RELEVANCE_THRESHOLD)]
        relevance_threshold: u8,

        /// Run folds in parallel
        #[arg(long)]
        parallel: bool,

        #[command(flatten)]
        training: TrainingArgs,
    },

    /// Print the weights of a saved model, largest first
    Weights {
        #[arg(long, default_value = "./data/model.bin")]
        model: PathBuf,
    },

    /// Pearson correlations and VIF over a label set
    Collinearity {
        /// Labeled examples (JSONL)
        #[arg(long)]
        labels: PathBuf,

        /// Report every dataset feature instead of the learned selection
        #[arg(long)]
        all_features: bool,
    },

    /// Rank candidate items for one query
    Rank {
        /// Candidate items (JSONL)
        #[arg(long)]
        candidates: PathBuf,

        /// Saved model bundle; without it learned requests fall back
        #[arg(long)]
        model: Option<PathBuf>,

        /// heuristic or learned
        #[arg(long, default_value = "heuristic")]
        ranker: RankerKind,
    },
}

#[derive(clap::Args, Debug)]
struct TrainingArgs {
    /// Inverse L2 regularization strength
    #[arg(long = "inverse-regularization", default_value_t = jobrank_ltr::trainer::DEFAULT_INVERSE_REGULARIZATION)]
    c: f64,

    /// Minimum label gap for a preference pair
    #[arg(long, default_value_t = jobrank_ltr::pairwise::DEFAULT_MIN_GAP)]
    min_gap: u8,

    /// Skip mirrored pairs
    #[arg(long)]
    no_mirror: bool,

    /// Warn instead of failing on multicollinear features
    #[arg(long)]
    allow_collinear: bool,
}

impl TrainingArgs {
    fn to_config(&self) -> TrainingConfig {
        TrainingConfig {
            pairwise: PairwiseConfig {
                min_gap: self.min_gap,
                mirror: !self.no_mirror,
                ..PairwiseConfig::default()
            },
            inverse_regularization: self.c,
            collinearity_policy: if self.allow_collinear {
                CollinearityPolicy::Warn
            } else {
                CollinearityPolicy::Reject
            },
            ..TrainingConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Reports go to stdout, logs to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting jobrank v{}", env!("CARGO_PKG_VERSION"));

    let store = ConfigStore::open(&args.config)
        .with_context(|| format!("loading config {:?}", args.config))?;
    let config = store.snapshot();

    match args.command {
        Command::Train {
            labels,
            model_out,
            training,
        } => train(&config, &labels, &model_out, &training.to_config()),
        Command::Evaluate {
            labels,
            json_out,
            markdown_out,
            cutoffs,
            relevance_threshold,
            parallel,
            training,
        } => {
            let loocv = LoocvConfig {
                training: training.to_config(),
                cutoffs,
                relevance_threshold,
                parallel,
            };
            evaluate(&config, labels, loocv, json_out, markdown_out).await
        }
        Command::Weights { model } => weights(&config, &model),
        Command::Collinearity {
            labels,
            all_features,
        } => collinearity(&config, &labels, all_features),
        Command::Rank {
            candidates,
            model,
            ranker,
        } => rank(&config, &candidates, model, ranker),
    }
}

fn train(
    config: &RankingConfig,
    labels: &Path,
    model_out: &Path,
    training: &TrainingConfig,
) -> anyhow::Result<()> {
    let labels = load_label_set(labels, &config.dataset_builder()?)?;
    labels.ensure_full_coverage()?;

    let model = match train_pairwise_model(&config.learned_schema()?, labels.examples(), training)? {
        TrainingOutcome::Trained(model) => model,
        TrainingOutcome::Infeasible(reason) => {
            bail!("Training is infeasible: {reason}; the heuristic remains in effect")
        }
    };
    print_weights(&model);

    ModelStore::new(model_out).save(&model)?;
    info!("Model saved to {:?}", model_out);
    Ok(())
}

async fn evaluate(
    config: &RankingConfig,
    labels: PathBuf,
    loocv: LoocvConfig,
    json_out: Option<PathBuf>,
    markdown_out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let labels = load_label_set(&labels, &config.dataset_builder()?)?;
    let config = config.clone();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let mut harness = tokio::task::spawn_blocking(move || {
        run_loocv_ablation(&labels, &config, &loocv, &token)
    });

    let report = tokio::select! {
        joined = &mut harness => joined??,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, stopping after the current fold");
            cancel.cancel();
            harness.await??
        }
    };

    let markdown = report.to_markdown();
    if let Some(path) = json_out {
        std::fs::write(&path, report.to_json()?)?;
        info!("JSON report written to {:?}", path);
    }
    if let Some(path) = markdown_out {
        std::fs::write(&path, &markdown)?;
        info!("Markdown report written to {:?}", path);
    }
    println!("{markdown}");
    Ok(())
}

fn weights(config: &RankingConfig, path: &Path) -> anyhow::Result<()> {
    let model = ModelStore::new(path).load(&config.learned_schema()?)?;
    print_weights(&model);
    Ok(())
}

fn print_weights(model: &RankingModel) {
    let summary = model.training();
    println!(
        "Trained on {} pairs from {} queries ({} iterations, log loss {:.4})",
        summary.pairs, summary.queries, summary.iterations, summary.log_loss
    );
    for weight in model.feature_weights() {
        let flag = if weight.sign_violation { "  <- negative" } else { "" };
        println!("  {:<16} {:>+.4}{}", weight.feature, weight.weight, flag);
    }
    println!("  {:<16} {:>+.4}", "bias", model.bias());

    let violations = model.sign_violations();
    if !violations.is_empty() {
        warn!(
            "Features expected to help have negative weights: {}",
            violations.join(", ")
        );
    }
}

fn collinearity(config: &RankingConfig, labels: &Path, all_features: bool) -> anyhow::Result<()> {
    let labels = load_label_set(labels, &config.dataset_builder()?)?;
    let schema = if all_features {
        labels.schema().clone()
    } else {
        config.learned_schema()?
    };
    let vectors = labels
        .examples()
        .iter()
        .map(|e| e.features.select(&schema))
        .collect::<jobrank_core::Result<Vec<FeatureVector>>>()?;

    let report =
        CollinearityReport::compute(&schema, &vectors, &CollinearityThresholds::default())?;
    if report.is_flagged() {
        warn!("{}", report.summary());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn rank(
    config: &RankingConfig,
    candidates: &Path,
    model: Option<PathBuf>,
    ranker: RankerKind,
) -> anyhow::Result<()> {
    let candidates = load_candidates(candidates, &config.dataset_builder()?)?;
    let learned_schema = config.learned_schema()?;
    let selector = match model {
        Some(path) => RankerSelector::new(ModelStore::new(path), learned_schema),
        None => RankerSelector::without_model(learned_schema),
    };

    let response = selector.rank(ranker, config, &candidates)?;
    info!("Ranked {} candidates with {}", response.items.len(), response.ranker);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
