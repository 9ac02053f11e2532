//! Random Forest training with parallel tree construction.

use grantwise_features::{OneHotMatrix, Rows};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::RandomForestConfig;
use crate::error::ModelError;
use crate::estimator::{FeatureImportance, Model, check_training_set};
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// A fitted Random Forest ensemble.
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
}

/// Draw `n_samples` row indices with replacement.
fn bootstrap_sample(n_samples: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
}

/// Train the Random Forest ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = x.n_rows()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    x: &OneHotMatrix,
    labels: &[bool],
) -> Result<RandomForest, ModelError> {
    let n_samples = x.n_rows();
    check_training_set(n_samples, labels)?;
    let n_features = x.n_columns();
    if n_features == 0 {
        return Err(ModelError::ZeroFeatures);
    }

    let max_features_resolved = config.max_features.resolve(n_features)?;
    let tree_template = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features_resolved));
    tree_template.validate(n_features)?;

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        max_features = max_features_resolved,
        bootstrap = config.bootstrap,
        "training random forest"
    );

    // Generate per-tree seeds from master RNG.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();
    let bootstrap = config.bootstrap;

    let trees: Vec<DecisionTree> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let samples = if bootstrap {
                bootstrap_sample(n_samples, &mut rng)
            } else {
                (0..n_samples).collect()
            };
            tree_template
                .clone()
                .with_seed(rng.r#gen())
                .grow(x, labels, samples, max_features_resolved)
        })
        .collect();

    debug!(n_trees_trained = trees.len(), "tree training complete");

    Ok(RandomForest { trees, n_features })
}

impl RandomForest {
    /// Return the positive-class probability for one encoded row.
    ///
    /// Averages the leaf positive fractions across all trees.
    #[must_use]
    pub fn predict_row(&self, active: &[usize]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.predict_row(active)).sum();
        total / self.trees.len() as f64
    }

    /// Return the fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Return the number of trees in the forest.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Model<OneHotMatrix> for RandomForest {
    /// Predict all rows in parallel.
    fn predict_proba(&self, x: &OneHotMatrix) -> Result<Vec<f64>, ModelError> {
        if x.n_columns() != self.n_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.n_features,
                got: x.n_columns(),
            });
        }
        Ok(x.rows().par_iter().map(|row| self.predict_row(row)).collect())
    }
}

impl FeatureImportance for RandomForest {
    /// Per-tree MDI importances summed across trees, normalized to sum to 1.0.
    fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            for (total, value) in totals.iter_mut().zip(tree.feature_importances()) {
                *total += value;
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

    /// Column 0 or 1 active marks a positive; columns 2..6 are noise.
    fn make_separable_data() -> (OneHotMatrix, Vec<bool>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60 {
            let positive = i % 3 == 0;
            let mut row = vec![2 + i % 4];
            if positive {
                row.push(i % 2);
            }
            row.sort_unstable();
            rows.push(row);
            labels.push(positive);
        }
        (OneHotMatrix::new(6, rows).unwrap(), labels)
    }

    #[test]
    fn separable_accuracy() {
        let (x, labels) = make_separable_data();
        let forest = RandomForestConfig::new(50)
            .unwrap()
            .with_max_features(crate::MaxFeatures::All)
            .fit(&x, &labels)
            .unwrap();
        let predictions = forest.predict(&x).unwrap();
        let correct = predictions.iter().zip(&labels).filter(|(p, l)| p == l).count();
        let accuracy = correct as f64 / labels.len() as f64;
        assert!(accuracy > 0.9, "accuracy = {accuracy}");
    }

    #[test]
    fn probabilities_in_unit_interval() {
        let (x, labels) = make_separable_data();
        let forest = RandomForestConfig::new(20).unwrap().fit(&x, &labels).unwrap();
        let proba = forest.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 60);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn feature_importances_sum_to_one() {
        let (x, labels) = make_separable_data();
        let forest = RandomForestConfig::new(20).unwrap().fit(&x, &labels).unwrap();
        let imp = forest.feature_importances();
        assert_eq!(imp.len(), 6);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-10);
        // The signal columns outrank every noise column.
        let signal = imp[0].min(imp[1]);
        assert!(imp[2..].iter().all(|&v| v < signal), "{imp:?}");
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (x, labels) = make_separable_data();
        let fit = || {
            RandomForestConfig::new(10)
                .unwrap()
                .with_seed(99)
                .fit(&x, &labels)
                .unwrap()
                .predict_proba(&x)
                .unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn no_bootstrap_trees_fit_every_training_row() {
        let (x, labels) = make_separable_data();
        let forest = RandomForestConfig::new(3)
            .unwrap()
            .with_bootstrap(false)
            .with_max_features(crate::MaxFeatures::All)
            .fit(&x, &labels)
            .unwrap();
        for tree in forest.trees() {
            assert_eq!(tree.predict(&x).unwrap(), labels);
        }
    }

    #[test]
    fn empty_dataset_error() {
        let x = OneHotMatrix::new(3, vec![]).unwrap();
        let err = RandomForestConfig::new(10).unwrap().fit(&x, &[]).unwrap_err();
        assert!(matches!(err, ModelError::EmptyDataset));
    }

    #[test]
    fn width_mismatch_error() {
        let (x, labels) = make_separable_data();
        let forest = RandomForestConfig::new(5).unwrap().fit(&x, &labels).unwrap();
        let other = OneHotMatrix::new(4, vec![vec![0]]).unwrap();
        assert!(matches!(
            forest.predict_proba(&other),
            Err(ModelError::FeatureCountMismatch { expected: 6, got: 4 })
        ));
    }
}
