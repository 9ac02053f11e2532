use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use grantwise_eval::{CrossValidation, Evaluator, FoldStrategy, SummaryRow};
use grantwise_features::{
    CategoricalTable, FittedPreprocessor, ImputingPreprocessor, OneHotPreprocessor, StratifiedSplit,
};
use grantwise_io::{
    EvaluationReport, ExperimentName, ModelReport, ReportWriter, RequestReader, SplitSummary,
    SubmissionWriter, TrainingReader, TrainingSet,
};
use grantwise_models::{
    CategoricalBoostingConfig, DynEstimator, Estimator, FeatureImportance, FittedPipeline,
    GradientBoostingConfig, LogisticRegressionConfig, Model, Pipeline, RandomForestConfig,
    SoftVoting,
};

/// Ranked features kept per model in the evaluation report.
const TOP_FEATURES: usize = 15;

#[derive(Parser)]
#[command(name = "grantwise")]
#[command(about = "Employee access-grant prediction from categorical role attributes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Shared size parameters for the four classifiers.
#[derive(Args, Debug, Clone)]
struct TuningArgs {
    /// Number of trees in the random forest
    #[arg(long, default_value_t = 300)]
    n_trees: usize,

    /// Number of gradient-boosting rounds
    #[arg(long, default_value_t = 300)]
    n_rounds: usize,

    /// Maximum depth of random-forest and gradient-boosting trees
    #[arg(long, default_value_t = 16)]
    max_depth: usize,

    /// Number of categorical-boosting iterations
    #[arg(long, default_value_t = 500)]
    n_iterations: usize,

    /// Depth of categorical-boosting oblivious trees
    #[arg(long, default_value_t = 6)]
    depth: usize,
}

/// The selectable final models.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModelKind {
    Logistic,
    Forest,
    GradientBoosting,
    CategoricalBoosting,
    SoftVoting,
}

impl ModelKind {
    fn name(self) -> &'static str {
        match self {
            Self::Logistic => "logistic",
            Self::Forest => "forest",
            Self::GradientBoosting => "gradient-boosting",
            Self::CategoricalBoosting => "categorical-boosting",
            Self::SoftVoting => "soft-voting",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Split the training file, cross-validate every model and write a JSON report
    Evaluate {
        /// Path to the labelled training CSV file
        #[arg(long)]
        train: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Fraction of rows held out as the test partition
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,

        /// Number of cross-validation folds
        #[arg(long, default_value_t = 5)]
        cv_folds: usize,

        /// Keep the class ratio inside every fold; without it a single-class
        /// fold is scored NaN and left out of the means
        #[arg(long, default_value_t = false)]
        stratified_folds: bool,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Fit one model on the whole training file and decide every request
    Predict {
        /// Path to the labelled training CSV file
        #[arg(long)]
        train: PathBuf,

        /// Path to the id-keyed request CSV file
        #[arg(long)]
        test: PathBuf,

        /// Path of the id,ACTION submission to write
        #[arg(long)]
        output: PathBuf,

        /// Model fitted for the decisions
        #[arg(long, value_enum, default_value_t = ModelKind::CategoricalBoosting)]
        model: ModelKind,

        /// Probability above which a request is granted
        #[arg(long, default_value_t = 0.5)]
        threshold: f64,

        #[command(flatten)]
        tuning: TuningArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct EvaluateOutput {
    experiment: String,
    n_train: usize,
    n_test: usize,
    n_folds: usize,
    report: PathBuf,
    models: Vec<SummaryRow>,
}

#[derive(Serialize)]
struct PredictOutput {
    model: &'static str,
    n_train: usize,
    n_requests: usize,
    n_granted: usize,
    threshold: f64,
    output: PathBuf,
}

/// The four standalone pipelines, configured from the CLI.
struct Estimators {
    logistic: Pipeline<OneHotPreprocessor, LogisticRegressionConfig>,
    forest: Pipeline<OneHotPreprocessor, RandomForestConfig>,
    boosting: Pipeline<OneHotPreprocessor, GradientBoostingConfig>,
    categorical: Pipeline<ImputingPreprocessor, CategoricalBoostingConfig>,
}

impl Estimators {
    fn new(tuning: &TuningArgs, seed: u64) -> Result<Self> {
        Ok(Self {
            logistic: Pipeline::new(OneHotPreprocessor::new(), LogisticRegressionConfig::new()),
            forest: Pipeline::new(
                OneHotPreprocessor::new(),
                RandomForestConfig::new(tuning.n_trees)?
                    .with_max_depth(Some(tuning.max_depth))
                    .with_seed(seed),
            ),
            boosting: Pipeline::new(
                OneHotPreprocessor::new(),
                GradientBoostingConfig::new(tuning.n_rounds)?
                    .with_max_depth(tuning.max_depth)
                    .with_seed(seed),
            ),
            categorical: Pipeline::new(
                ImputingPreprocessor::new(),
                CategoricalBoostingConfig::new(tuning.n_iterations)?
                    .with_depth(tuning.depth)
                    .with_seed(seed),
            ),
        })
    }

    fn soft_voting(&self) -> Result<SoftVoting> {
        Ok(SoftVoting::new(vec![
            member(ModelKind::Logistic, self.logistic.clone()),
            member(ModelKind::Forest, self.forest.clone()),
            member(ModelKind::GradientBoosting, self.boosting.clone()),
            member(ModelKind::CategoricalBoosting, self.categorical.clone()),
        ])?)
    }

    fn select(&self, kind: ModelKind) -> Result<Box<dyn DynEstimator>> {
        Ok(match kind {
            ModelKind::Logistic => Box::new(self.logistic.clone()),
            ModelKind::Forest => Box::new(self.forest.clone()),
            ModelKind::GradientBoosting => Box::new(self.boosting.clone()),
            ModelKind::CategoricalBoosting => Box::new(self.categorical.clone()),
            ModelKind::SoftVoting => Box::new(self.soft_voting()?),
        })
    }
}

fn member(
    kind: ModelKind,
    estimator: impl DynEstimator + 'static,
) -> (String, Box<dyn DynEstimator>) {
    (kind.name().to_string(), Box::new(estimator))
}

/// Evaluate one standalone pipeline and report its top-ranked features.
fn evaluate_pipeline<E, F, M>(
    evaluator: &Evaluator,
    kind: ModelKind,
    estimator: &E,
    fit_part: &TrainingSet,
    test_part: &TrainingSet,
) -> Result<ModelReport>
where
    E: Estimator<CategoricalTable, Model = FittedPipeline<F, M>>,
    F: FittedPreprocessor,
    M: FeatureImportance,
{
    let evaluation = evaluator
        .evaluate(
            kind.name(),
            estimator,
            &fit_part.table,
            &fit_part.labels,
            &test_part.table,
            &test_part.labels,
        )
        .with_context(|| format!("evaluation of {} failed", kind.name()))?;
    let ranked = evaluation.model.ranked_importances();
    Ok(ModelReport::new(&evaluation, ranked, TOP_FEATURES))
}

fn read_training(path: &Path) -> Result<TrainingSet> {
    TrainingReader::new(path)
        .read()
        .with_context(|| format!("failed to read training CSV {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Evaluate {
            train,
            experiment,
            output_dir,
            test_fraction,
            cv_folds,
            stratified_folds,
            tuning,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;

            // 1. Read and split
            let dataset = read_training(&train)?;
            let split = StratifiedSplit::new(test_fraction)?
                .with_seed(cli.seed)
                .split(&dataset.labels)
                .context("train/test split failed")?;
            let fit_part = dataset.select(&split.train);
            let test_part = dataset.select(&split.test);
            info!(
                n_train = fit_part.len(),
                n_test = test_part.len(),
                train_positive_rate = fit_part.positive_rate(),
                test_positive_rate = test_part.positive_rate(),
                "dataset split"
            );

            // 2. Cross-validate every model on both partitions
            let strategy = if stratified_folds {
                FoldStrategy::Stratified
            } else {
                FoldStrategy::Shuffled
            };
            let evaluator = Evaluator::new(
                CrossValidation::new(cv_folds)?
                    .with_seed(cli.seed)
                    .with_strategy(strategy),
            );
            let estimators = Estimators::new(&tuning, cli.seed)?;

            let mut models = vec![
                evaluate_pipeline(
                    &evaluator,
                    ModelKind::Logistic,
                    &estimators.logistic,
                    &fit_part,
                    &test_part,
                )?,
                evaluate_pipeline(
                    &evaluator,
                    ModelKind::Forest,
                    &estimators.forest,
                    &fit_part,
                    &test_part,
                )?,
                evaluate_pipeline(
                    &evaluator,
                    ModelKind::GradientBoosting,
                    &estimators.boosting,
                    &fit_part,
                    &test_part,
                )?,
                evaluate_pipeline(
                    &evaluator,
                    ModelKind::CategoricalBoosting,
                    &estimators.categorical,
                    &fit_part,
                    &test_part,
                )?,
            ];

            let ensemble = evaluator
                .evaluate(
                    ModelKind::SoftVoting.name(),
                    &estimators.soft_voting()?,
                    &fit_part.table,
                    &fit_part.labels,
                    &test_part.table,
                    &test_part.labels,
                )
                .context("evaluation of soft-voting failed")?;
            models.push(ModelReport::new(&ensemble, Vec::new(), TOP_FEATURES));

            // 3. Write evaluation JSON
            let report = EvaluationReport {
                experiment: experiment.clone(),
                seed: cli.seed,
                n_folds: cv_folds,
                split: SplitSummary {
                    n_train: fit_part.len(),
                    n_test: test_part.len(),
                    train_positive_rate: fit_part.positive_rate(),
                    test_positive_rate: test_part.positive_rate(),
                },
                models,
            };
            let writer = ReportWriter::new(&output_dir, experiment_name)?;
            let report_path = writer.write_evaluation(&report)?;

            // 4. Print summary
            let output = EvaluateOutput {
                experiment,
                n_train: fit_part.len(),
                n_test: test_part.len(),
                n_folds: cv_folds,
                report: report_path,
                models: report.summary().into_iter().cloned().collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            train,
            test,
            output,
            model,
            threshold,
            tuning,
        } => {
            if !(0.0..=1.0).contains(&threshold) {
                anyhow::bail!("threshold must be in [0, 1], got {threshold}");
            }

            // 1. Read both files
            let dataset = read_training(&train)?;
            let requests = RequestReader::new(&test)
                .read()
                .with_context(|| format!("failed to read request CSV {}", test.display()))?;

            // 2. Fit the selected model on every training row
            let estimator = Estimators::new(&tuning, cli.seed)?.select(model)?;
            let fitted = estimator
                .fit_boxed(&dataset.table, &dataset.labels)
                .with_context(|| format!("training {} failed", model.name()))?;
            info!(model = model.name(), n_train = dataset.len(), "final model trained");

            // 3. Decide every request
            let probabilities = fitted
                .predict_proba(&requests.table)
                .context("prediction failed")?;
            let decisions: Vec<bool> = probabilities.iter().map(|&p| p > threshold).collect();
            SubmissionWriter::new(&output).write(&requests.ids, &decisions)?;

            // 4. Print summary
            let summary = PredictOutput {
                model: model.name(),
                n_train: dataset.len(),
                n_requests: requests.ids.len(),
                n_granted: decisions.iter().filter(|&&d| d).count(),
                threshold,
                output,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
