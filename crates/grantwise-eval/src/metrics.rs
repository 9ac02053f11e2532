//! Threshold-free and thresholded binary classification metrics.

use serde::Serialize;

use crate::confusion::BinaryConfusion;
use crate::error::EvalError;

/// Check lengths and class balance; return `(n_positive, n_negative)`.
fn check_scored(labels: &[bool], scores: &[f64]) -> Result<(usize, usize), EvalError> {
    if labels.is_empty() {
        return Err(EvalError::EmptyInput);
    }
    if labels.len() != scores.len() {
        return Err(EvalError::LengthMismatch {
            n_labels: labels.len(),
            n_scores: scores.len(),
        });
    }
    let n_positive = labels.iter().filter(|&&l| l).count();
    let n_negative = labels.len() - n_positive;
    if n_positive == 0 || n_negative == 0 {
        return Err(EvalError::SingleClass {
            class: n_positive > 0,
        });
    }
    Ok((n_positive, n_negative))
}

/// 1-based ranks of `scores`, tied scores sharing the mean of their ranks.
fn average_ranks(scores: &[f64]) -> Vec<f64> {
    let n = scores.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks start+1 ..= end.
        let rank = (start + 1 + end) as f64 / 2.0;
        for &row in &order[start..end] {
            ranks[row] = rank;
        }
        start = end;
    }
    ranks
}

/// Area under the ROC curve.
///
/// Computed as the Mann-Whitney U statistic over tie-averaged ranks, so a
/// positive and a negative with equal scores count as half a correct pair.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`EvalError::EmptyInput`] | zero labels |
/// | [`EvalError::LengthMismatch`] | `labels.len() != scores.len()` |
/// | [`EvalError::SingleClass`] | only one class is present |
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> Result<f64, EvalError> {
    let (n_positive, n_negative) = check_scored(labels, scores)?;
    let ranks = average_ranks(scores);
    let positive_rank_sum: f64 = ranks
        .iter()
        .zip(labels)
        .filter(|&(_, &l)| l)
        .map(|(r, _)| r)
        .sum();
    let n_pos = n_positive as f64;
    let u = positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_negative as f64))
}

/// Points of a ROC curve, one per distinct score plus the origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    /// False positive rate at each threshold, non-decreasing.
    pub fpr: Vec<f64>,
    /// True positive rate at each threshold, non-decreasing.
    pub tpr: Vec<f64>,
    /// Descending thresholds; a row is positive when its score is `>=` the
    /// threshold. The first entry is `+∞` (serialized as `null` in JSON).
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Return the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    /// Return whether the curve has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Trapezoidal area under the curve.
    #[must_use]
    pub fn auc(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
            .sum()
    }
}

/// ROC curve over every distinct score.
///
/// Starts at `(0, 0)` with threshold `+∞` and ends at `(1, 1)`; no
/// collinear points are dropped.
///
/// # Errors
///
/// Same as [`roc_auc`].
pub fn roc_curve(labels: &[bool], scores: &[f64]) -> Result<RocCurve, EvalError> {
    let (n_positive, n_negative) = check_scored(labels, scores)?;
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if labels[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        curve.fpr.push(fp as f64 / n_negative as f64);
        curve.tpr.push(tp as f64 / n_positive as f64);
        curve.thresholds.push(threshold);
    }
    Ok(curve)
}

/// Matthews correlation coefficient of hard decisions.
///
/// # Errors
///
/// Same as [`BinaryConfusion::from_predictions`].
pub fn mcc(labels: &[bool], predictions: &[bool]) -> Result<f64, EvalError> {
    Ok(BinaryConfusion::from_predictions(labels, predictions)?.mcc())
}
