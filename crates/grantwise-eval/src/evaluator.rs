//! Train/test evaluation of one named estimator.

use grantwise_features::Rows;
use grantwise_models::{Estimator, Model, decide};
use serde::Serialize;
use tracing::{info, instrument};

use crate::confusion::BinaryConfusion;
use crate::cv::{CrossValidation, CvScores};
use crate::error::EvalError;
use crate::metrics::{RocCurve, roc_curve};

/// One line of the model comparison table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    /// Model name.
    pub name: String,
    /// Mean cross-validated ROC-AUC on the train partition.
    pub train_roc_auc: f64,
    /// Mean cross-validated ROC-AUC on the test partition.
    pub test_roc_auc: f64,
    /// Mean cross-validated MCC on the train partition.
    pub train_mcc: f64,
    /// Mean cross-validated MCC on the test partition.
    pub test_mcc: f64,
}

/// Everything learned about one estimator.
#[derive(Debug)]
pub struct ModelEvaluation<M> {
    /// The comparison row.
    pub summary: SummaryRow,
    /// Fold scores on the train partition.
    pub train_cv: CvScores,
    /// Fold scores on the test partition.
    pub test_cv: CvScores,
    /// ROC curve of `model` on the test partition.
    pub roc: RocCurve,
    /// Decisions of `model` on the test partition.
    pub confusion: BinaryConfusion,
    /// The model fitted on the whole train partition.
    pub model: M,
}

/// Cross-validates estimators on both partitions of a train/test split.
#[derive(Debug, Clone)]
pub struct Evaluator {
    cv: CrossValidation,
}

impl Evaluator {
    /// Create an evaluator running `cv` on each partition.
    #[must_use]
    pub fn new(cv: CrossValidation) -> Self {
        Self { cv }
    }

    /// Return the cross-validation config.
    #[must_use]
    pub fn cv(&self) -> &CrossValidation {
        &self.cv
    }

    /// Evaluate `estimator`.
    ///
    /// Cross-validates independently on the train and on the test partition,
    /// and fits one model on the full train partition whose test-partition
    /// ROC curve and confusion counts are reported. The three jobs run in
    /// parallel.
    ///
    /// # Errors
    ///
    /// Propagates [`CrossValidation::evaluate`] errors, plus
    /// [`EvalError::Model`] if the full fit fails and
    /// [`EvalError::SingleClass`] if the test partition has a single class.
    #[instrument(skip_all, fields(model = name, n_train = train_x.n_rows(), n_test = test_x.n_rows()))]
    pub fn evaluate<X, E>(
        &self,
        name: &str,
        estimator: &E,
        train_x: &X,
        train_y: &[bool],
        test_x: &X,
        test_y: &[bool],
    ) -> Result<ModelEvaluation<E::Model>, EvalError>
    where
        X: Rows + Sync,
        E: Estimator<X>,
    {
        let ((train_cv, test_cv), model) = rayon::join(
            || {
                rayon::join(
                    || self.cv.evaluate(estimator, train_x, train_y),
                    || self.cv.evaluate(estimator, test_x, test_y),
                )
            },
            || estimator.fit(train_x, train_y),
        );
        let (train_cv, test_cv, model) = (train_cv?, test_cv?, model?);

        let probabilities = model.predict_proba(test_x)?;
        let roc = roc_curve(test_y, &probabilities)?;
        let predictions: Vec<bool> = probabilities.iter().copied().map(decide).collect();
        let confusion = BinaryConfusion::from_predictions(test_y, &predictions)?;

        let summary = SummaryRow {
            name: name.to_string(),
            train_roc_auc: train_cv.mean_roc_auc,
            test_roc_auc: test_cv.mean_roc_auc,
            train_mcc: train_cv.mean_mcc,
            test_mcc: test_cv.mean_mcc,
        };
        info!(
            train_roc_auc = summary.train_roc_auc,
            test_roc_auc = summary.test_roc_auc,
            train_mcc = summary.train_mcc,
            test_mcc = summary.test_mcc,
            "model evaluated"
        );

        Ok(ModelEvaluation {
            summary,
            train_cv,
            test_cv,
            roc,
            confusion,
            model,
        })
    }
}
