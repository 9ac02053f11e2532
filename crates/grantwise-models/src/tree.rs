use grantwise_features::{OneHotMatrix, Rows};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::{
    ModelError,
    estimator::{Estimator, FeatureImportance, Model, check_training_set},
    node::{Node, NodeIndex, branch},
    split::{SplitCriterion, SplitScratch, find_best_split},
};

/// Deepest tree the builders will grow.
pub(crate) const MAX_DEPTH_LIMIT: usize = 64;

/// Configuration for a single CART decision tree over one-hot indicators.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default             |
/// |---------------------|---------------------|
/// | `criterion`         | `Gini`              |
/// | `max_depth`         | `None` (unlimited)  |
/// | `min_samples_split` | 2                   |
/// | `min_samples_leaf`  | 1                   |
/// | `max_features`      | `None` (all features) |
/// | `seed`              | 42                  |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth.
    ///
    /// `None` means grow until all leaves are pure or stopping conditions
    /// are met. `Some(d)` limits depth to `d` levels (root is depth 0).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the maximum number of candidate columns to score at each split.
    ///
    /// `None` means score every non-constant column.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required to split a node.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Return the minimum samples required in each leaf.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the maximum features to consider per split, if set.
    #[must_use]
    pub fn max_features(&self) -> Option<usize> {
        self.max_features
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Check the stopping parameters, returning the resolved `max_features`.
    pub(crate) fn validate(&self, n_features: usize) -> Result<usize, ModelError> {
        if let Some(d) = self.max_depth
            && (d == 0 || d > MAX_DEPTH_LIMIT)
        {
            return Err(ModelError::InvalidMaxDepth {
                max_depth: d,
                limit: MAX_DEPTH_LIMIT,
            });
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(ModelError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(ModelError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }
        Ok(max_features)
    }

    /// Train a decision tree on `x` with one label per row.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ModelError::EmptyDataset`] | `x` has zero rows |
    /// | [`ModelError::ZeroFeatures`] | `x` has zero columns |
    /// | [`ModelError::LabelCountMismatch`] | `labels.len() != x.n_rows()` |
    /// | [`ModelError::SingleClass`] | every label is the same |
    /// | [`ModelError::InvalidMaxFeatures`] | `max_features` resolves outside [1, n_features] |
    /// | [`ModelError::InvalidMaxDepth`] | `max_depth` is `Some(0)` or above the depth limit |
    /// | [`ModelError::InvalidMinSamplesSplit`] | `min_samples_split` < 2 |
    /// | [`ModelError::InvalidMinSamplesLeaf`] | `min_samples_leaf` < 1 |
    #[instrument(skip_all, fields(n_samples = x.n_rows()))]
    pub fn fit(&self, x: &OneHotMatrix, labels: &[bool]) -> Result<DecisionTree, ModelError> {
        check_training_set(x.n_rows(), labels)?;
        if x.n_columns() == 0 {
            return Err(ModelError::ZeroFeatures);
        }
        let max_features = self.validate(x.n_columns())?;

        debug!(
            n_samples = x.n_rows(),
            n_features = x.n_columns(),
            max_features,
            "fitting decision tree"
        );

        Ok(self.grow(x, labels, (0..x.n_rows()).collect(), max_features))
    }

    /// Grow a tree on `samples` (which may repeat rows) of pre-validated input.
    pub(crate) fn grow(
        &self,
        x: &OneHotMatrix,
        labels: &[bool],
        samples: Vec<usize>,
        max_features: usize,
    ) -> DecisionTree {
        let mut builder = TreeBuilder {
            x,
            labels,
            config: self,
            max_features,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            scratch: SplitScratch::new(x.n_columns()),
            arena: Vec::new(),
        };
        let root = builder.build(&samples, 0);

        debug!(
            root_index = root.index(),
            n_nodes = builder.arena.len(),
            "decision tree built"
        );

        DecisionTree {
            nodes: builder.arena,
            n_features: x.n_columns(),
        }
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator<OneHotMatrix> for DecisionTreeConfig {
    type Model = DecisionTree;

    fn fit(&self, x: &OneHotMatrix, labels: &[bool]) -> Result<DecisionTree, ModelError> {
        DecisionTreeConfig::fit(self, x, labels)
    }
}

/// State shared by the recursive build of one tree.
struct TreeBuilder<'a> {
    x: &'a OneHotMatrix,
    labels: &'a [bool],
    config: &'a DecisionTreeConfig,
    max_features: usize,
    rng: ChaCha8Rng,
    scratch: SplitScratch,
    arena: Vec<Node>,
}

impl TreeBuilder<'_> {
    /// Recursively build the subtree for `samples`, returning its arena index.
    fn build(&mut self, samples: &[usize], depth: usize) -> NodeIndex {
        let n_samples = samples.len();
        let n_positive = samples.iter().filter(|&&si| self.labels[si]).count();
        let impurity = self.config.criterion.binary(n_positive, n_samples);

        let depth_exceeded = self.config.max_depth.is_some_and(|max_d| depth >= max_d);
        let too_few = n_samples < self.config.min_samples_split;
        let pure = impurity.value() == 0.0;

        let split = if too_few || pure || depth_exceeded {
            None
        } else {
            find_best_split(
                self.x,
                self.labels,
                samples,
                self.config.criterion,
                self.max_features,
                self.config.min_samples_leaf,
                &mut self.scratch,
                &mut self.rng,
            )
        };

        let Some(split) = split else {
            let idx = self.arena.len();
            self.arena.push(Node::Leaf {
                positive_fraction: n_positive as f64 / n_samples as f64,
                impurity,
                n_samples,
            });
            return NodeIndex::new(idx);
        };

        // Arena pattern: reserve index, recurse, then overwrite with the split.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            positive_fraction: 0.0,
            impurity,
            n_samples,
        });

        let left = self.build(&split.left_indices, depth + 1);
        let right = self.build(&split.right_indices, depth + 1);

        self.arena[node_idx] = Node::Split {
            feature: split.feature,
            left,
            right,
            impurity,
            n_samples,
            impurity_decrease: split.impurity_decrease,
        };

        NodeIndex::new(node_idx)
    }
}

/// A fitted CART decision tree.
///
/// Stored as an arena-based `Vec<Node>` with index references.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl DecisionTree {
    /// Return the positive fraction of the leaf reached by one encoded row.
    ///
    /// `active` must be sorted ascending, as [`OneHotMatrix`] rows are.
    #[must_use]
    pub fn predict_row(&self, active: &[usize]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf {
                    positive_fraction, ..
                } => return *positive_fraction,
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => idx = branch(*feature, *left, *right, active).index(),
            }
        }
    }

    /// Return the number of input columns seen at fit time.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the nodes in arena order; index 0 is the root.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }
}

impl Model<OneHotMatrix> for DecisionTree {
    fn predict_proba(&self, x: &OneHotMatrix) -> Result<Vec<f64>, ModelError> {
        if x.n_columns() != self.n_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.n_features,
                got: x.n_columns(),
            });
        }
        Ok(x.rows().iter().map(|row| self.predict_row(row)).collect())
    }
}

impl FeatureImportance for DecisionTree {
    /// Mean Decrease in Impurity, normalized to sum to 1.0.
    ///
    /// All zeros when the tree is a single leaf.
    fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[feature.index()] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(n_columns: usize, rows: Vec<Vec<usize>>) -> OneHotMatrix {
        OneHotMatrix::new(n_columns, rows).unwrap()
    }

    /// Four XOR patterns over columns 0 and 1, each repeated five times.
    fn xor() -> (OneHotMatrix, Vec<bool>) {
        let patterns = [(vec![], false), (vec![0], true), (vec![1], true), (vec![0, 1], false)];
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..5 {
            for (row, label) in &patterns {
                rows.push(row.clone());
                labels.push(*label);
            }
        }
        (matrix(2, rows), labels)
    }

    #[test]
    fn empty_dataset_error() {
        let err = DecisionTreeConfig::new()
            .fit(&matrix(3, vec![]), &[])
            .unwrap_err();
        assert!(matches!(err, ModelError::EmptyDataset));
    }

    #[test]
    fn single_class_error() {
        let x = matrix(2, vec![vec![0], vec![1]]);
        let err = DecisionTreeConfig::new().fit(&x, &[true, true]).unwrap_err();
        assert!(matches!(err, ModelError::SingleClass { class: true }));
    }

    #[test]
    fn separable_indicator_single_split() {
        let x = matrix(3, vec![vec![0], vec![0], vec![2], vec![1], vec![1], vec![1, 2]]);
        let labels = [false, false, false, true, true, true];
        let tree = DecisionTreeConfig::new().fit(&x, &labels).unwrap();
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&x).unwrap(), labels.to_vec());
    }

    #[test]
    fn xor_needs_depth_at_least_2() {
        let (x, labels) = xor();
        let tree = DecisionTreeConfig::new().fit(&x, &labels).unwrap();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.predict(&x).unwrap(), labels);

        let stump = DecisionTreeConfig::new()
            .with_max_depth(Some(1))
            .fit(&x, &labels)
            .unwrap();
        assert_eq!(stump.depth(), 1);
        let proba = stump.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| (p - 0.5).abs() < 1e-12));
    }

    #[test]
    fn feature_importances_sum_to_one() {
        let (x, labels) = xor();
        let tree = DecisionTreeConfig::new().fit(&x, &labels).unwrap();
        let imp = tree.feature_importances();
        assert_eq!(imp.len(), 2);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (x, labels) = xor();
        let config = DecisionTreeConfig::new().with_max_features(Some(1)).with_seed(7);
        let a = config.fit(&x, &labels).unwrap().predict_proba(&x).unwrap();
        let b = config.fit(&x, &labels).unwrap().predict_proba(&x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn prediction_feature_mismatch() {
        let (x, labels) = xor();
        let tree = DecisionTreeConfig::new().fit(&x, &labels).unwrap();
        let err = tree.predict_proba(&matrix(5, vec![vec![4]])).unwrap_err();
        assert!(matches!(
            err,
            ModelError::FeatureCountMismatch { expected: 2, got: 5 }
        ));
    }

    #[test]
    fn invalid_config_errors() {
        let (x, labels) = xor();
        assert!(matches!(
            DecisionTreeConfig::new().with_max_depth(Some(0)).fit(&x, &labels),
            Err(ModelError::InvalidMaxDepth { max_depth: 0, .. })
        ));
        assert!(matches!(
            DecisionTreeConfig::new().with_min_samples_split(1).fit(&x, &labels),
            Err(ModelError::InvalidMinSamplesSplit { .. })
        ));
        assert!(matches!(
            DecisionTreeConfig::new().with_min_samples_leaf(0).fit(&x, &labels),
            Err(ModelError::InvalidMinSamplesLeaf { .. })
        ));
        assert!(matches!(
            DecisionTreeConfig::new().with_max_features(Some(3)).fit(&x, &labels),
            Err(ModelError::InvalidMaxFeatures { max_features: 3, n_features: 2 })
        ));
    }
}
