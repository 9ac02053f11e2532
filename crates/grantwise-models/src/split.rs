use grantwise_features::OneHotMatrix;
use rand::Rng;

use crate::node::{FeatureIndex, Impurity};

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// Returns `0.0` when `n_samples` is zero.
    ///
    /// For `Gini`: `1 - Σ(p_i²)` where `p_i = count_i / n_samples`.
    /// For `Entropy`: `-Σ(p_i · ln(p_i))` summed only over classes where `p_i > 0`.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let value = match self {
            SplitCriterion::Gini => {
                let sum_sq: f64 = class_counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            SplitCriterion::Entropy => -class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        };
        Impurity::new(value)
    }

    pub(crate) fn binary(&self, n_positive: usize, n_samples: usize) -> Impurity {
        self.impurity(&[n_samples - n_positive, n_positive], n_samples)
    }
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    /// Weighted impurity decrease from this split (MDI formula).
    pub(crate) impurity_decrease: f64,
    /// Samples whose indicator is inactive.
    pub(crate) left_indices: Vec<usize>,
    /// Samples whose indicator is active.
    pub(crate) right_indices: Vec<usize>,
}

/// Per-column accumulation buffers reused across the nodes of one tree.
///
/// Only the columns listed in `touched` are non-zero between calls.
#[derive(Debug)]
pub(crate) struct SplitScratch {
    active: Vec<usize>,
    active_positive: Vec<usize>,
    touched: Vec<usize>,
}

impl SplitScratch {
    pub(crate) fn new(n_columns: usize) -> Self {
        Self {
            active: vec![0; n_columns],
            active_positive: vec![0; n_columns],
            touched: Vec::new(),
        }
    }

    fn clear(&mut self) {
        for &col in &self.touched {
            self.active[col] = 0;
            self.active_positive[col] = 0;
        }
        self.touched.clear();
    }
}

/// Find the best indicator split among a random subset of columns.
///
/// Counts, for every column active in at least one sample, how many samples
/// (and positive samples) have it active. Columns active in some but not all
/// samples are the candidates; up to `max_features` of them are drawn at
/// random and scored by weighted impurity decrease.
///
/// `samples` may repeat rows (bootstrap draws); each repeat counts.
///
/// Returns `None` when no candidate exists or every candidate would violate
/// `min_samples_leaf`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_best_split(
    x: &OneHotMatrix,
    labels: &[bool],
    samples: &[usize],
    criterion: SplitCriterion,
    max_features: usize,
    min_samples_leaf: usize,
    scratch: &mut SplitScratch,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_samples = samples.len();
    if n_samples == 0 {
        return None;
    }

    let mut n_positive = 0usize;
    for &si in samples {
        let positive = labels[si];
        n_positive += usize::from(positive);
        for &col in x.row(si) {
            if scratch.active[col] == 0 {
                scratch.touched.push(col);
            }
            scratch.active[col] += 1;
            scratch.active_positive[col] += usize::from(positive);
        }
    }
    let parent_impurity = criterion.binary(n_positive, n_samples);

    let mut candidates: Vec<usize> = scratch
        .touched
        .iter()
        .copied()
        .filter(|&col| scratch.active[col] < n_samples)
        .collect();
    candidates.sort_unstable();

    // Partial Fisher-Yates: shuffle only the first `max_features` positions.
    let take = max_features.min(candidates.len());
    for i in 0..take {
        let j = rng.gen_range(i..candidates.len());
        candidates.swap(i, j);
    }

    let mut best_decrease = f64::NEG_INFINITY;
    let mut best: Option<FeatureIndex> = None;

    for &col in &candidates[..take] {
        let n_right = scratch.active[col];
        let n_left = n_samples - n_right;
        if n_left < min_samples_leaf || n_right < min_samples_leaf {
            continue;
        }
        let right_positive = scratch.active_positive[col];
        let left_impurity = criterion.binary(n_positive - right_positive, n_left);
        let right_impurity = criterion.binary(right_positive, n_right);

        // MDI formula (matches scikit-learn).
        let decrease = (n_samples as f64) * parent_impurity.value()
            - (n_left as f64) * left_impurity.value()
            - (n_right as f64) * right_impurity.value();

        if decrease > best_decrease {
            best_decrease = decrease;
            best = Some(FeatureIndex::new(col));
        }
    }

    scratch.clear();
    let feature = best?;

    let (right_indices, left_indices): (Vec<usize>, Vec<usize>) = samples
        .iter()
        .partition(|&&si| x.is_active(si, feature.index()));

    Some(SplitResult {
        feature,
        impurity_decrease: best_decrease,
        left_indices,
        right_indices,
    })
}
