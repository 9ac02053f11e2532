//! Newton-boosted regression trees on log-loss over one-hot indicators.

use grantwise_features::{OneHotMatrix, Rows};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelRefIterator, IndexedParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::error::ModelError;
use crate::estimator::{Estimator, FeatureImportance, Model, check_training_set, logit, sigmoid};
use crate::node::{FeatureIndex, NodeIndex, branch};
use crate::tree::MAX_DEPTH_LIMIT;

const MIN_HESSIAN: f64 = 1e-16;

/// Configuration for gradient-boosted trees.
///
/// Each round fits a depth-wise regression tree to the first and second
/// derivatives of the log-loss and adds its leaf weights to the margins.
///
/// # Defaults
///
/// | Parameter          | Default |
/// |--------------------|---------|
/// | `max_depth`        | 16      |
/// | `learning_rate`    | 0.1     |
/// | `lambda`           | 1.0     |
/// | `gamma`            | 0.0     |
/// | `min_child_weight` | 1.0     |
/// | `base_score`       | 0.5     |
/// | `subsample`        | 1.0     |
/// | `seed`             | 42      |
#[derive(Debug, Clone)]
pub struct GradientBoostingConfig {
    n_rounds: usize,
    max_depth: usize,
    learning_rate: f64,
    lambda: f64,
    gamma: f64,
    min_child_weight: f64,
    base_score: f64,
    subsample: f64,
    seed: u64,
}

impl GradientBoostingConfig {
    /// Create a config with `n_rounds` boosting rounds.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTreeCount`] if `n_rounds` is zero.
    pub fn new(n_rounds: usize) -> Result<Self, ModelError> {
        if n_rounds == 0 {
            return Err(ModelError::InvalidTreeCount { n_trees: n_rounds });
        }
        Ok(Self {
            n_rounds,
            max_depth: 16,
            learning_rate: 0.1,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
            base_score: 0.5,
            subsample: 1.0,
            seed: 42,
        })
    }

    /// Set the maximum depth of each tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the shrinkage applied to every leaf weight.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the L2 penalty on leaf weights.
    #[must_use]
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the minimum gain required to keep a split.
    #[must_use]
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set the minimum hessian sum in each child.
    #[must_use]
    pub fn with_min_child_weight(mut self, min_child_weight: f64) -> Self {
        self.min_child_weight = min_child_weight;
        self
    }

    /// Set the initial probability for every row.
    #[must_use]
    pub fn with_base_score(mut self, base_score: f64) -> Self {
        self.base_score = base_score;
        self
    }

    /// Set the fraction of rows drawn without replacement per round.
    #[must_use]
    pub fn with_subsample(mut self, subsample: f64) -> Self {
        self.subsample = subsample;
        self
    }

    /// Set the random seed for row subsampling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of boosting rounds.
    #[must_use]
    pub fn n_rounds(&self) -> usize {
        self.n_rounds
    }

    /// Return the maximum tree depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Return the L2 leaf penalty.
    #[must_use]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Return the minimum split gain.
    #[must_use]
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Return the minimum child hessian sum.
    #[must_use]
    pub fn min_child_weight(&self) -> f64 {
        self.min_child_weight
    }

    /// Return the base score.
    #[must_use]
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Return the row subsample fraction.
    #[must_use]
    pub fn subsample(&self) -> f64 {
        self.subsample
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.max_depth == 0 || self.max_depth > MAX_DEPTH_LIMIT {
            return Err(ModelError::InvalidMaxDepth {
                max_depth: self.max_depth,
                limit: MAX_DEPTH_LIMIT,
            });
        }
        let checks: [(&'static str, &'static str, f64, bool); 6] = [
            (
                "learning_rate",
                "in (0, 1]",
                self.learning_rate,
                self.learning_rate > 0.0 && self.learning_rate <= 1.0,
            ),
            ("lambda", ">= 0", self.lambda, self.lambda >= 0.0),
            ("gamma", ">= 0", self.gamma, self.gamma >= 0.0),
            (
                "min_child_weight",
                ">= 0",
                self.min_child_weight,
                self.min_child_weight >= 0.0,
            ),
            (
                "base_score",
                "in (0, 1)",
                self.base_score,
                self.base_score > 0.0 && self.base_score < 1.0,
            ),
            (
                "subsample",
                "in (0, 1]",
                self.subsample,
                self.subsample > 0.0 && self.subsample <= 1.0,
            ),
        ];
        for (name, requirement, value, ok) in checks {
            if !ok {
                return Err(ModelError::InvalidParameter {
                    name,
                    requirement,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Fit the boosted ensemble on one-hot encoded rows.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ModelError::InvalidMaxDepth`] | `max_depth` is 0 or above the depth limit |
    /// | [`ModelError::InvalidParameter`] | a real-valued hyperparameter is out of range |
    /// | [`ModelError::EmptyDataset`] | `x` has zero rows |
    /// | [`ModelError::ZeroFeatures`] | `x` has zero columns |
    /// | [`ModelError::LabelCountMismatch`] | `labels.len() != x.n_rows()` |
    /// | [`ModelError::SingleClass`] | every label is the same |
    #[instrument(skip_all, fields(n_rounds = self.n_rounds, n_rows = x.n_rows()))]
    pub fn fit(
        &self,
        x: &OneHotMatrix,
        labels: &[bool],
    ) -> Result<GradientBoostedTrees, ModelError> {
        self.validate()?;
        let n_rows = x.n_rows();
        check_training_set(n_rows, labels)?;
        if x.n_columns() == 0 {
            return Err(ModelError::ZeroFeatures);
        }

        let base_margin = logit(self.base_score);
        let mut margins = vec![base_margin; n_rows];
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut scratch = GradientScratch::new(x.n_columns());
        let n_draw = ((n_rows as f64) * self.subsample).ceil() as usize;
        let mut trees = Vec::with_capacity(self.n_rounds);

        for round in 0..self.n_rounds {
            let (grad, hess): (Vec<f64>, Vec<f64>) = margins
                .par_iter()
                .zip(labels.par_iter())
                .map(|(&z, &y)| {
                    let p = sigmoid(z);
                    (p - f64::from(u8::from(y)), (p * (1.0 - p)).max(MIN_HESSIAN))
                })
                .unzip();

            let samples = if n_draw < n_rows {
                rand::seq::index::sample(&mut rng, n_rows, n_draw).into_vec()
            } else {
                (0..n_rows).collect()
            };

            let mut builder = RegressionTreeBuilder {
                x,
                grad: &grad,
                hess: &hess,
                config: self,
                scratch: &mut scratch,
                nodes: Vec::new(),
            };
            builder.build(&samples, 0);
            let tree = RegressionTree {
                nodes: builder.nodes,
            };

            margins
                .iter_mut()
                .zip(x.rows())
                .for_each(|(z, row)| *z += tree.predict_row(row));

            debug!(round, n_nodes = tree.nodes.len(), "boosting round complete");
            trees.push(tree);
        }

        info!(n_trees = trees.len(), "gradient boosting fitted");

        Ok(GradientBoostedTrees {
            trees,
            base_margin,
            n_features: x.n_columns(),
        })
    }
}

impl Estimator<OneHotMatrix> for GradientBoostingConfig {
    type Model = GradientBoostedTrees;

    fn fit(&self, x: &OneHotMatrix, labels: &[bool]) -> Result<GradientBoostedTrees, ModelError> {
        GradientBoostingConfig::fit(self, x, labels)
    }
}

#[derive(Debug, Clone)]
enum RegressionNode {
    Split {
        feature: FeatureIndex,
        left: NodeIndex,
        right: NodeIndex,
        gain: f64,
    },
    Leaf {
        weight: f64,
    },
}

/// One boosting round: a regression tree emitting margin increments.
#[derive(Debug, Clone)]
struct RegressionTree {
    nodes: Vec<RegressionNode>,
}

impl RegressionTree {
    fn predict_row(&self, active: &[usize]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                RegressionNode::Leaf { weight } => return *weight,
                RegressionNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => idx = branch(*feature, *left, *right, active).index(),
            }
        }
    }
}

/// Per-column gradient sums reused across nodes.
struct GradientScratch {
    grad: Vec<f64>,
    hess: Vec<f64>,
    seen: Vec<bool>,
    touched: Vec<usize>,
}

impl GradientScratch {
    fn new(n_columns: usize) -> Self {
        Self {
            grad: vec![0.0; n_columns],
            hess: vec![0.0; n_columns],
            seen: vec![false; n_columns],
            touched: Vec::new(),
        }
    }

    fn clear(&mut self) {
        for &col in &self.touched {
            self.grad[col] = 0.0;
            self.hess[col] = 0.0;
            self.seen[col] = false;
        }
        self.touched.clear();
    }
}

struct RegressionTreeBuilder<'a> {
    x: &'a OneHotMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    config: &'a GradientBoostingConfig,
    scratch: &'a mut GradientScratch,
    nodes: Vec<RegressionNode>,
}

impl RegressionTreeBuilder<'_> {
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.lambda)
    }

    /// Return the best `(feature, gain)` among columns active in some samples.
    fn best_split(&mut self, samples: &[usize], g_total: f64, h_total: f64) -> Option<(usize, f64)> {
        for &si in samples {
            for &col in self.x.row(si) {
                if !self.scratch.seen[col] {
                    self.scratch.seen[col] = true;
                    self.scratch.touched.push(col);
                }
                self.scratch.grad[col] += self.grad[si];
                self.scratch.hess[col] += self.hess[si];
            }
        }
        self.scratch.touched.sort_unstable();

        let parent = self.score(g_total, h_total);
        let mcw = self.config.min_child_weight;
        let mut best: Option<(usize, f64)> = None;
        for &col in &self.scratch.touched {
            let (g_right, h_right) = (self.scratch.grad[col], self.scratch.hess[col]);
            let (g_left, h_left) = (g_total - g_right, h_total - h_right);
            if h_left < mcw || h_right < mcw {
                continue;
            }
            let gain = 0.5 * (self.score(g_left, h_left) + self.score(g_right, h_right) - parent)
                - self.config.gamma;
            if gain > 0.0 && best.is_none_or(|(_, b)| gain > b) {
                best = Some((col, gain));
            }
        }
        self.scratch.clear();
        best
    }

    fn build(&mut self, samples: &[usize], depth: usize) -> NodeIndex {
        let g_total: f64 = samples.iter().map(|&si| self.grad[si]).sum();
        let h_total: f64 = samples.iter().map(|&si| self.hess[si]).sum();

        let split = if depth < self.config.max_depth && samples.len() >= 2 {
            self.best_split(samples, g_total, h_total)
        } else {
            None
        };

        let node_idx = self.nodes.len();
        let weight = -g_total / (h_total + self.config.lambda) * self.config.learning_rate;
        self.nodes.push(RegressionNode::Leaf { weight });

        let Some((feature, gain)) = split else {
            return NodeIndex::new(node_idx);
        };

        let (right_samples, left_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&si| self.x.is_active(si, feature));
        let left = self.build(&left_samples, depth + 1);
        let right = self.build(&right_samples, depth + 1);
        self.nodes[node_idx] = RegressionNode::Split {
            feature: FeatureIndex::new(feature),
            left,
            right,
            gain,
        };
        NodeIndex::new(node_idx)
    }
}

/// A fitted gradient-boosted ensemble.
#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    trees: Vec<RegressionTree>,
    base_margin: f64,
    n_features: usize,
}

impl GradientBoostedTrees {
    /// Return the raw log-odds margin for one encoded row.
    #[must_use]
    pub fn margin_row(&self, active: &[usize]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict_row(active)).sum::<f64>()
    }

    /// Return the number of boosting rounds.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Model<OneHotMatrix> for GradientBoostedTrees {
    fn predict_proba(&self, x: &OneHotMatrix) -> Result<Vec<f64>, ModelError> {
        if x.n_columns() != self.n_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.n_features,
                got: x.n_columns(),
            });
        }
        Ok(x.rows()
            .par_iter()
            .map(|row| sigmoid(self.margin_row(row)))
            .collect())
    }
}

impl FeatureImportance for GradientBoostedTrees {
    /// Total split gain per column, normalized to sum to 1.0.
    fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in self.trees.iter().flat_map(|t| &t.nodes) {
            if let RegressionNode::Split { feature, gain, .. } = node {
                totals[feature.index()] += gain;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }
}
