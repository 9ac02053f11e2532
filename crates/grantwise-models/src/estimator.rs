//! The fit/predict interface shared by every classifier.

use crate::error::ModelError;

/// Probability above which a row is classified as granted.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Turn a positive-class probability into a hard decision.
///
/// Exactly 0.5 maps to "not granted", matching an argmax over
/// `[p_negative, p_positive]` that prefers the first class on ties.
#[must_use]
pub fn decide(probability: f64) -> bool {
    probability > DECISION_THRESHOLD
}

/// An unfitted classifier configuration over input representation `X`.
///
/// Fitting never mutates the configuration, so the same estimator can be
/// refitted on every cross-validation fold.
pub trait Estimator<X: ?Sized>: Send + Sync {
    /// The fitted model type.
    type Model: Model<X>;

    /// Fit a model on `x` with one label per row (`true` = granted).
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] when the inputs or hyperparameters are invalid.
    fn fit(&self, x: &X, labels: &[bool]) -> Result<Self::Model, ModelError>;
}

/// A fitted binary classifier.
pub trait Model<X: ?Sized>: Send + Sync {
    /// Return the probability of the positive class for every row of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::FeatureCountMismatch`] when `x` is not shaped
    /// like the training input.
    fn predict_proba(&self, x: &X) -> Result<Vec<f64>, ModelError>;

    /// Return a hard decision for every row of `x`.
    ///
    /// # Errors
    ///
    /// Same as [`Model::predict_proba`].
    fn predict(&self, x: &X) -> Result<Vec<bool>, ModelError> {
        Ok(self.predict_proba(x)?.into_iter().map(decide).collect())
    }
}

/// Per-input-feature importance or coefficient vector.
pub trait FeatureImportance {
    /// Return one value per input feature, in input column order.
    fn feature_importances(&self) -> Vec<f64>;
}

/// Validate a training set and return its positive count.
pub(crate) fn check_training_set(n_rows: usize, labels: &[bool]) -> Result<usize, ModelError> {
    if n_rows == 0 {
        return Err(ModelError::EmptyDataset);
    }
    if labels.len() != n_rows {
        return Err(ModelError::LabelCountMismatch {
            n_rows,
            n_labels: labels.len(),
        });
    }
    let n_positive = labels.iter().filter(|&&l| l).count();
    if n_positive == 0 || n_positive == n_rows {
        return Err(ModelError::SingleClass {
            class: n_positive == n_rows,
        });
    }
    Ok(n_positive)
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

pub(crate) fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}
