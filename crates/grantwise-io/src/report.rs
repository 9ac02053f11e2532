//! The JSON evaluation report.

use grantwise_eval::{BinaryConfusion, CvScores, ModelEvaluation, RocCurve, SummaryRow};
use grantwise_models::RankedFeature;
use serde::Serialize;

/// Sizes and class balance of the train/test split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    /// Rows in the train partition.
    pub n_train: usize,
    /// Rows in the test partition.
    pub n_test: usize,
    /// Fraction of granted rows in the train partition.
    pub train_positive_rate: f64,
    /// Fraction of granted rows in the test partition.
    pub test_positive_rate: f64,
}

/// Everything reported about one model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    /// The comparison row.
    pub summary: SummaryRow,
    /// Fold scores on the train partition.
    pub train_cv: CvScores,
    /// Fold scores on the test partition.
    pub test_cv: CvScores,
    /// Test-partition decisions of the model fitted on the train partition.
    pub test_confusion: BinaryConfusion,
    /// Test-partition ROC curve of the same model.
    pub roc: RocCurve,
    /// Highest-ranked input features; empty for the ensemble.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_features: Vec<RankedFeature>,
}

impl ModelReport {
    /// Copy the report fields out of an evaluation, keeping the first
    /// `top_k` of `ranked`.
    #[must_use]
    pub fn new<M>(evaluation: &ModelEvaluation<M>, mut ranked: Vec<RankedFeature>, top_k: usize) -> Self {
        ranked.truncate(top_k);
        Self {
            summary: evaluation.summary.clone(),
            train_cv: evaluation.train_cv.clone(),
            test_cv: evaluation.test_cv.clone(),
            test_confusion: evaluation.confusion,
            roc: evaluation.roc.clone(),
            top_features: ranked,
        }
    }
}

/// The `{experiment}_evaluate.json` artifact.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Experiment name.
    pub experiment: String,
    /// Seed shared by the split, the folds and every model.
    pub seed: u64,
    /// Folds per cross-validation run.
    pub n_folds: usize,
    /// Split sizes and class balance.
    pub split: SplitSummary,
    /// One entry per evaluated model, in evaluation order.
    pub models: Vec<ModelReport>,
}

impl EvaluationReport {
    /// Return the summary rows of every model.
    #[must_use]
    pub fn summary(&self) -> Vec<&SummaryRow> {
        self.models.iter().map(|m| &m.summary).collect()
    }
}
