//! Binary confusion counts and the metrics derived from them.

use std::fmt;

use serde::Serialize;

use crate::error::EvalError;

/// Counts of a binary classifier's decisions against the true labels.
///
/// `true` is the positive (granted) class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BinaryConfusion {
    /// Positives predicted positive.
    pub true_positives: usize,
    /// Negatives predicted negative.
    pub true_negatives: usize,
    /// Negatives predicted positive.
    pub false_positives: usize,
    /// Positives predicted negative.
    pub false_negatives: usize,
}

impl BinaryConfusion {
    /// Count decisions against labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EvalError::EmptyInput`] | zero labels |
    /// | [`EvalError::LengthMismatch`] | `labels.len() != predictions.len()` |
    pub fn from_predictions(labels: &[bool], predictions: &[bool]) -> Result<Self, EvalError> {
        if labels.is_empty() {
            return Err(EvalError::EmptyInput);
        }
        if labels.len() != predictions.len() {
            return Err(EvalError::LengthMismatch {
                n_labels: labels.len(),
                n_scores: predictions.len(),
            });
        }
        let mut counts = Self::default();
        for (&truth, &predicted) in labels.iter().zip(predictions) {
            match (truth, predicted) {
                (true, true) => counts.true_positives += 1,
                (false, false) => counts.true_negatives += 1,
                (false, true) => counts.false_positives += 1,
                (true, false) => counts.false_negatives += 1,
            }
        }
        Ok(counts)
    }

    /// Return the total number of decisions.
    #[must_use]
    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    /// Proportion of correct decisions.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.true_positives + self.true_negatives) as f64 / total as f64
        }
    }

    /// Precision: TP / (TP + FP). 0.0 when nothing was predicted positive.
    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// Recall: TP / (TP + FN). 0.0 when there are no positives.
    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// Matthews correlation coefficient.
    ///
    /// `(TP·TN − FP·FN) / sqrt((TP+FP)(TP+FN)(TN+FP)(TN+FN))`, and 0.0 when
    /// any factor of the denominator is zero.
    #[must_use]
    pub fn mcc(&self) -> f64 {
        let tp = self.true_positives as f64;
        let tn = self.true_negatives as f64;
        let fp = self.false_positives as f64;
        let fn_ = self.false_negatives as f64;
        let denominator = (tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_);
        if denominator == 0.0 {
            return 0.0;
        }
        (tp * tn - fp * fn_) / denominator.sqrt()
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl fmt::Display for BinaryConfusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>10} {:>8} {:>8}", "", "pred_0", "pred_1")?;
        writeln!(
            f,
            "{:>10} {:>8} {:>8}",
            "true_0", self.true_negatives, self.false_positives
        )?;
        writeln!(
            f,
            "{:>10} {:>8} {:>8}",
            "true_1", self.false_negatives, self.true_positives
        )
    }
}
