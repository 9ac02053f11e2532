//! Stratified train/test splitting.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::error::FeatureError;

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    /// Rows assigned to the training partition.
    pub train: Vec<usize>,
    /// Rows assigned to the test partition.
    pub test: Vec<usize>,
}

/// Stratified shuffle split configuration.
///
/// Construct via [`StratifiedSplit::new`], then chain `with_seed` if desired.
///
/// # Defaults
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `seed`    | 42      |
#[derive(Debug, Clone)]
pub struct StratifiedSplit {
    test_fraction: f64,
    seed: u64,
}

impl StratifiedSplit {
    /// Create a split that sends `test_fraction` of each class to test.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::InvalidTestFraction`] unless `0 < test_fraction < 1`.
    pub fn new(test_fraction: f64) -> Result<Self, FeatureError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(FeatureError::InvalidTestFraction {
                fraction: test_fraction,
            });
        }
        Ok(Self {
            test_fraction,
            seed: 42,
        })
    }

    /// Set the random seed for shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the test fraction.
    #[must_use]
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Partition row indices so each label keeps its share in both sides.
    ///
    /// Within each class, `round(test_fraction * n_class)` shuffled rows go
    /// to test, clamped so a class with at least two rows lands on both
    /// sides. The resulting partitions are shuffled.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::DegenerateSplit`] when either partition would be empty.
    #[instrument(skip_all, fields(n_rows = labels.len(), test_fraction = self.test_fraction))]
    pub fn split(&self, labels: &[bool]) -> Result<TrainTestSplit, FeatureError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut train = Vec::with_capacity(labels.len());
        let mut test = Vec::with_capacity(labels.len());

        for class in [false, true] {
            let mut indices: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|&(_, &label)| label == class)
                .map(|(i, _)| i)
                .collect();
            indices.shuffle(&mut rng);

            let n = indices.len();
            let mut n_test = (self.test_fraction * n as f64).round() as usize;
            if n >= 2 {
                n_test = n_test.clamp(1, n - 1);
            } else {
                n_test = 0;
            }

            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }

        if train.is_empty() || test.is_empty() {
            return Err(FeatureError::DegenerateSplit {
                n_train: train.len(),
                n_test: test.len(),
            });
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);

        info!(n_train = train.len(), n_test = test.len(), "stratified split complete");

        Ok(TrainTestSplit { train, test })
    }
}
