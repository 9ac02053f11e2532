//! Boosted oblivious trees over ordered target statistics.
//!
//! Raw category codes never reach the trees. Each column is replaced by a
//! target statistic (see [`crate::ctr`]) quantized into quantile borders,
//! and every tree level applies one `(column, border)` test to all of its
//! nodes, so a tree of depth `d` is `d` tests and `2^d` leaf values.

use grantwise_features::{Category, ImputedTable, Rows};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::borders::QuantileBorders;
use crate::ctr::{TargetStatistics, ordered_ctr};
use crate::error::ModelError;
use crate::estimator::{Estimator, FeatureImportance, Model, check_training_set, logit, sigmoid};

/// Deepest oblivious tree supported (`2^16` leaves).
const MAX_OBLIVIOUS_DEPTH: usize = 16;
const MAX_BORDER_COUNT: usize = 255;

/// Configuration for native-categorical boosting.
///
/// # Defaults
///
/// | Parameter       | Default |
/// |-----------------|---------|
/// | `depth`         | 6       |
/// | `learning_rate` | 0.08    |
/// | `l2_leaf_reg`   | 1.0     |
/// | `border_count`  | 32      |
/// | `seed`          | 42      |
#[derive(Debug, Clone)]
pub struct CategoricalBoostingConfig {
    n_iterations: usize,
    depth: usize,
    learning_rate: f64,
    l2_leaf_reg: f64,
    border_count: usize,
    seed: u64,
}

impl CategoricalBoostingConfig {
    /// Create a config with `n_iterations` boosting rounds.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTreeCount`] if `n_iterations` is zero.
    pub fn new(n_iterations: usize) -> Result<Self, ModelError> {
        if n_iterations == 0 {
            return Err(ModelError::InvalidTreeCount {
                n_trees: n_iterations,
            });
        }
        Ok(Self {
            n_iterations,
            depth: 6,
            learning_rate: 0.08,
            l2_leaf_reg: 1.0,
            border_count: 32,
            seed: 42,
        })
    }

    /// Set the depth of every oblivious tree.
    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Set the shrinkage applied to leaf values.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the L2 penalty on leaf values.
    #[must_use]
    pub fn with_l2_leaf_reg(mut self, l2_leaf_reg: f64) -> Self {
        self.l2_leaf_reg = l2_leaf_reg;
        self
    }

    /// Set the maximum number of quantile borders per column.
    #[must_use]
    pub fn with_border_count(mut self, border_count: usize) -> Self {
        self.border_count = border_count;
        self
    }

    /// Set the seed of the permutation behind the ordered statistics.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of boosting rounds.
    #[must_use]
    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    /// Return the tree depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Return the learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Return the L2 leaf penalty.
    #[must_use]
    pub fn l2_leaf_reg(&self) -> f64 {
        self.l2_leaf_reg
    }

    /// Return the border count.
    #[must_use]
    pub fn border_count(&self) -> usize {
        self.border_count
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.depth == 0 || self.depth > MAX_OBLIVIOUS_DEPTH {
            return Err(ModelError::InvalidMaxDepth {
                max_depth: self.depth,
                limit: MAX_OBLIVIOUS_DEPTH,
            });
        }
        if self.border_count == 0 || self.border_count > MAX_BORDER_COUNT {
            return Err(ModelError::InvalidBorderCount {
                border_count: self.border_count,
            });
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ModelError::InvalidParameter {
                name: "learning_rate",
                requirement: "in (0, 1]",
                value: self.learning_rate,
            });
        }
        if !(self.l2_leaf_reg > 0.0 && self.l2_leaf_reg.is_finite()) {
            return Err(ModelError::InvalidParameter {
                name: "l2_leaf_reg",
                requirement: "finite and > 0",
                value: self.l2_leaf_reg,
            });
        }
        Ok(())
    }

    /// Fit the booster on an imputed categorical table.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ModelError::InvalidMaxDepth`] | `depth` is 0 or above 16 |
    /// | [`ModelError::InvalidBorderCount`] | `border_count` is 0 or above 255 |
    /// | [`ModelError::InvalidParameter`] | `learning_rate` or `l2_leaf_reg` is out of range |
    /// | [`ModelError::EmptyDataset`] | `table` has zero rows |
    /// | [`ModelError::LabelCountMismatch`] | `labels.len() != table.n_rows()` |
    /// | [`ModelError::SingleClass`] | every label is the same |
    #[instrument(skip_all, fields(n_iterations = self.n_iterations, n_rows = table.n_rows()))]
    pub fn fit(
        &self,
        table: &ImputedTable,
        labels: &[bool],
    ) -> Result<CategoricalBoosting, ModelError> {
        self.validate()?;
        let n_rows = table.n_rows();
        let n_positive = check_training_set(n_rows, labels)?;
        let n_columns = table.n_columns();
        let prior = n_positive as f64 / n_rows as f64;

        let columns: Vec<Vec<_>> = (0..n_columns)
            .map(|col| table.rows().iter().map(|row| row[col]).collect())
            .collect();

        let mut permutation: Vec<usize> = (0..n_rows).collect();
        permutation.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));

        let train_ctr: Vec<Vec<f64>> = columns
            .par_iter()
            .map(|column| ordered_ctr(column, labels, &permutation, prior))
            .collect();
        let statistics: Vec<TargetStatistics> = columns
            .iter()
            .map(|column| TargetStatistics::fit(column, labels, prior))
            .collect();
        let borders = QuantileBorders::build(&train_ctr, self.border_count);
        let bins: Vec<Vec<usize>> = train_ctr
            .iter()
            .enumerate()
            .map(|(col, values)| values.iter().map(|&v| borders.bin(col, v)).collect())
            .collect();

        debug!(
            prior,
            n_categories = ?statistics.iter().map(TargetStatistics::n_categories).collect::<Vec<_>>(),
            "target statistics computed"
        );

        let base_margin = logit(prior);
        let mut margins = vec![base_margin; n_rows];
        let mut gains = vec![0.0; n_columns];
        let mut trees = Vec::with_capacity(self.n_iterations);

        for iteration in 0..self.n_iterations {
            let (grad, hess): (Vec<f64>, Vec<f64>) = margins
                .iter()
                .zip(labels)
                .map(|(&z, &y)| {
                    let p = sigmoid(z);
                    (p - f64::from(u8::from(y)), p * (1.0 - p))
                })
                .unzip();

            let tree = self.grow_tree(&bins, &borders, &grad, &hess, &mut gains);
            for (row, margin) in margins.iter_mut().enumerate() {
                *margin += tree.leaf_values[tree.leaf_of(|col| bins[col][row])];
            }

            debug!(iteration, depth = tree.splits.len(), "oblivious tree fitted");
            trees.push(tree);
        }

        info!(n_trees = trees.len(), prior, "categorical boosting fitted");

        Ok(CategoricalBoosting {
            columns: table.columns().to_vec(),
            statistics,
            borders,
            trees,
            base_margin,
            gains,
        })
    }

    /// Grow one oblivious tree, adding each chosen split's gain to `gains`.
    fn grow_tree(
        &self,
        bins: &[Vec<usize>],
        borders: &QuantileBorders,
        grad: &[f64],
        hess: &[f64],
        gains: &mut [f64],
    ) -> ObliviousTree {
        let lambda = self.l2_leaf_reg;
        let n_rows = grad.len();
        let mut leaf = vec![0usize; n_rows];
        let mut n_leaves = 1usize;
        let mut splits = Vec::with_capacity(self.depth);

        for _ in 0..self.depth {
            let (leaf_g, leaf_h) = leaf_sums(&leaf, n_leaves, grad, hess);
            let parent: f64 = leaf_g
                .iter()
                .zip(&leaf_h)
                .map(|(g, h)| g * g / (h + lambda))
                .sum();

            let per_column: Vec<Option<(f64, usize)>> = (0..bins.len())
                .into_par_iter()
                .map(|col| {
                    best_border(&bins[col], borders.n_borders(col), &leaf, n_leaves, grad, hess, lambda)
                })
                .collect();

            // First column wins ties.
            let mut best: Option<(f64, usize, usize)> = None;
            for (col, candidate) in per_column.into_iter().enumerate() {
                if let Some((score, border)) = candidate
                    && best.is_none_or(|(b, _, _)| score > b)
                {
                    best = Some((score, col, border));
                }
            }
            let Some((score, col, border)) = best else {
                break;
            };

            gains[col] += (score - parent).max(0.0);
            for (row, l) in leaf.iter_mut().enumerate() {
                *l = *l * 2 + usize::from(bins[col][row] > border);
            }
            n_leaves *= 2;
            splits.push((col, border));
        }

        let (leaf_g, leaf_h) = leaf_sums(&leaf, n_leaves, grad, hess);
        let leaf_values = leaf_g
            .iter()
            .zip(&leaf_h)
            .map(|(g, h)| -g / (h + lambda) * self.learning_rate)
            .collect();

        ObliviousTree {
            splits,
            leaf_values,
        }
    }
}

impl Estimator<ImputedTable> for CategoricalBoostingConfig {
    type Model = CategoricalBoosting;

    fn fit(&self, table: &ImputedTable, labels: &[bool]) -> Result<CategoricalBoosting, ModelError> {
        CategoricalBoostingConfig::fit(self, table, labels)
    }
}

fn leaf_sums(leaf: &[usize], n_leaves: usize, grad: &[f64], hess: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut g = vec![0.0; n_leaves];
    let mut h = vec![0.0; n_leaves];
    for ((&l, &gi), &hi) in leaf.iter().zip(grad).zip(hess) {
        g[l] += gi;
        h[l] += hi;
    }
    (g, h)
}

/// Score every border of one column summed over all current leaves.
///
/// Returns the best `(score, border)`, or `None` for a column without borders.
fn best_border(
    bins: &[usize],
    n_borders: usize,
    leaf: &[usize],
    n_leaves: usize,
    grad: &[f64],
    hess: &[f64],
    lambda: f64,
) -> Option<(f64, usize)> {
    if n_borders == 0 {
        return None;
    }
    let n_bins = n_borders + 1;
    let mut hist_g = vec![0.0; n_leaves * n_bins];
    let mut hist_h = vec![0.0; n_leaves * n_bins];
    for (row, &bin) in bins.iter().enumerate() {
        let slot = leaf[row] * n_bins + bin;
        hist_g[slot] += grad[row];
        hist_h[slot] += hess[row];
    }

    let mut scores = vec![0.0; n_borders];
    for l in 0..n_leaves {
        let g_leaf = &hist_g[l * n_bins..(l + 1) * n_bins];
        let h_leaf = &hist_h[l * n_bins..(l + 1) * n_bins];
        let (g_total, h_total): (f64, f64) = (g_leaf.iter().sum(), h_leaf.iter().sum());
        let (mut g_left, mut h_left) = (0.0, 0.0);
        for (k, score) in scores.iter_mut().enumerate() {
            g_left += g_leaf[k];
            h_left += h_leaf[k];
            let (g_right, h_right) = (g_total - g_left, h_total - h_left);
            *score += g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda);
        }
    }

    let mut best: Option<(f64, usize)> = None;
    for (k, &score) in scores.iter().enumerate() {
        if best.is_none_or(|(b, _)| score > b) {
            best = Some((score, k));
        }
    }
    best
}

/// A symmetric tree: one `(column, border)` test per level.
#[derive(Debug, Clone)]
struct ObliviousTree {
    splits: Vec<(usize, usize)>,
    leaf_values: Vec<f64>,
}

impl ObliviousTree {
    fn leaf_of(&self, bin: impl Fn(usize) -> usize) -> usize {
        self.splits
            .iter()
            .fold(0, |idx, &(col, border)| idx * 2 + usize::from(bin(col) > border))
    }
}

/// A fitted native-categorical booster.
#[derive(Debug, Clone)]
pub struct CategoricalBoosting {
    columns: Vec<String>,
    statistics: Vec<TargetStatistics>,
    borders: QuantileBorders,
    trees: Vec<ObliviousTree>,
    base_margin: f64,
    gains: Vec<f64>,
}

impl CategoricalBoosting {
    /// Return the column names seen at fit time.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Return the number of boosting rounds.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn margin_row(&self, row: &[Category]) -> f64 {
        let bins: Vec<usize> = row
            .iter()
            .zip(&self.statistics)
            .enumerate()
            .map(|(col, (&category, stats))| self.borders.bin(col, stats.value(category)))
            .collect();
        self.base_margin
            + self
                .trees
                .iter()
                .map(|tree| tree.leaf_values[tree.leaf_of(|col| bins[col])])
                .sum::<f64>()
    }
}

impl Model<ImputedTable> for CategoricalBoosting {
    fn predict_proba(&self, table: &ImputedTable) -> Result<Vec<f64>, ModelError> {
        if table.n_columns() != self.columns.len() {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.columns.len(),
                got: table.n_columns(),
            });
        }
        Ok(table
            .rows()
            .par_iter()
            .map(|row| sigmoid(self.margin_row(row)))
            .collect())
    }
}

impl FeatureImportance for CategoricalBoosting {
    /// Total split gain per input column, normalized to sum to 1.0.
    fn feature_importances(&self) -> Vec<f64> {
        let sum: f64 = self.gains.iter().sum();
        if sum > 0.0 {
            self.gains.iter().map(|g| g / sum).collect()
        } else {
            self.gains.clone()
        }
    }
}
