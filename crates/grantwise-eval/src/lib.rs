//! Scoring binary classifiers: ROC-AUC, ROC curves, MCC and k-fold
//! cross-validation.
//!
//! Every evaluation takes an [`Estimator`](grantwise_models::Estimator) and
//! refits it per fold; the models crate knows nothing about metrics.

mod confusion;
mod cv;
mod error;
mod evaluator;
mod metrics;

pub use confusion::BinaryConfusion;
pub use cv::{CrossValidation, CvScores, FoldScore, FoldStrategy};
pub use error::EvalError;
pub use evaluator::{Evaluator, ModelEvaluation, SummaryRow};
pub use metrics::{RocCurve, mcc, roc_auc, roc_curve};
