//! Shuffled and stratified k-fold cross-validation for any estimator.

use grantwise_features::Rows;
use grantwise_models::{Estimator, Model, ModelError, decide};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::EvalError;
use crate::metrics::{mcc, roc_auc};

/// How rows are assigned to folds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FoldStrategy {
    /// Shuffle all rows, then cut them into contiguous folds whose sizes
    /// differ by at most one (the first `n % k` folds get the extra row).
    #[default]
    Shuffled,
    /// Shuffle each class separately and deal its rows round-robin, so every
    /// fold keeps the overall class ratio.
    Stratified,
}

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_*` setters.
///
/// # Defaults
///
/// | Parameter  | Default                    |
/// |------------|----------------------------|
/// | `seed`     | 42                         |
/// | `strategy` | [`FoldStrategy::Shuffled`] |
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
    strategy: FoldStrategy,
}

/// Scores of one held-out fold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldScore {
    /// Zero-based fold index.
    pub fold: usize,
    /// Rows the fold's model was fitted on.
    pub n_train: usize,
    /// Held-out rows scored.
    pub n_test: usize,
    /// ROC-AUC on the held-out rows; NaN when the held-out rows or the
    /// fold's training rows hold a single class.
    pub roc_auc: f64,
    /// MCC of thresholded predictions on the held-out rows; NaN when the
    /// fold's training rows hold a single class.
    pub mcc: f64,
}

/// Per-fold scores and their summary statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvScores {
    /// One entry per fold, in fold order.
    pub folds: Vec<FoldScore>,
    /// Mean ROC-AUC across folds with a defined score.
    pub mean_roc_auc: f64,
    /// Population standard deviation of the defined fold ROC-AUCs.
    pub std_roc_auc: f64,
    /// Mean MCC across folds with a defined score.
    pub mean_mcc: f64,
    /// Population standard deviation of the defined fold MCCs.
    pub std_mcc: f64,
}

/// Mean and standard deviation of the non-NaN `values`; NaN if none.
fn mean_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let defined: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
    if defined.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = defined.len() as f64;
    let mean = defined.iter().sum::<f64>() / n;
    let variance = defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

impl CvScores {
    fn from_folds(folds: Vec<FoldScore>) -> Self {
        let (mean_roc_auc, std_roc_auc) = mean_std(folds.iter().map(|f| f.roc_auc));
        let (mean_mcc, std_mcc) = mean_std(folds.iter().map(|f| f.mcc));
        Self {
            folds,
            mean_roc_auc,
            std_roc_auc,
            mean_mcc,
            std_mcc,
        }
    }
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, EvalError> {
        if n_folds < 2 {
            return Err(EvalError::InvalidFoldCount { n_folds });
        }
        Ok(Self {
            n_folds,
            seed: 42,
            strategy: FoldStrategy::default(),
        })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the fold assignment strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: FoldStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the fold assignment strategy.
    #[must_use]
    pub fn strategy(&self) -> FoldStrategy {
        self.strategy
    }

    /// Return the held-out row indices of every fold.
    ///
    /// The folds are disjoint and together cover every row.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EvalError::TooFewRows`] | fewer rows than folds |
    /// | [`EvalError::TooFewSamplesForFolds`] | stratified, and a present class has fewer rows than folds |
    pub fn folds(&self, labels: &[bool]) -> Result<Vec<Vec<usize>>, EvalError> {
        let n_rows = labels.len();
        if n_rows < self.n_folds {
            return Err(EvalError::TooFewRows {
                n_rows,
                n_folds: self.n_folds,
            });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut folds = vec![Vec::new(); self.n_folds];

        match self.strategy {
            FoldStrategy::Shuffled => {
                let mut order: Vec<usize> = (0..n_rows).collect();
                order.shuffle(&mut rng);
                let (base, extra) = (n_rows / self.n_folds, n_rows % self.n_folds);
                let mut start = 0;
                for (fold, rows) in folds.iter_mut().enumerate() {
                    let size = base + usize::from(fold < extra);
                    rows.extend_from_slice(&order[start..start + size]);
                    start += size;
                }
            }
            FoldStrategy::Stratified => {
                // Round-robin continues across classes to keep fold sizes even.
                let mut next = 0;
                for class in [false, true] {
                    let mut indices: Vec<usize> =
                        (0..n_rows).filter(|&i| labels[i] == class).collect();
                    if !indices.is_empty() && indices.len() < self.n_folds {
                        return Err(EvalError::TooFewSamplesForFolds {
                            class,
                            count: indices.len(),
                            n_folds: self.n_folds,
                        });
                    }
                    indices.shuffle(&mut rng);
                    for idx in indices {
                        folds[next % self.n_folds].push(idx);
                        next += 1;
                    }
                }
            }
        }
        Ok(folds)
    }

    /// Run k-fold cross-validation.
    ///
    /// Each fold fits a fresh model on the other folds, then scores the
    /// held-out rows for both ROC-AUC and MCC. Folds run in parallel.
    ///
    /// A score that is undefined for one fold is recorded as NaN with a
    /// warning and left out of the means: ROC-AUC when the held-out rows
    /// hold a single class, both scores when the training rows do.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`EvalError::LabelCountMismatch`] | `labels.len() != x.n_rows()` |
    /// | [`EvalError::TooFewRows`] | fewer rows than folds |
    /// | [`EvalError::TooFewSamplesForFolds`] | stratified, and a class is too small |
    /// | [`EvalError::Fold`] | a fold's model failed for a reason other than single-class training rows |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_rows = x.n_rows()))]
    pub fn evaluate<X, E>(&self, estimator: &E, x: &X, labels: &[bool]) -> Result<CvScores, EvalError>
    where
        X: Rows + Sync,
        E: Estimator<X>,
    {
        if labels.len() != x.n_rows() {
            return Err(EvalError::LabelCountMismatch {
                n_rows: x.n_rows(),
                n_labels: labels.len(),
            });
        }
        let folds = self.folds(labels)?;

        let scores = folds
            .par_iter()
            .enumerate()
            .map(|(fold, test)| {
                score_fold(fold, test, estimator, x, labels).map_err(|e| EvalError::Fold {
                    fold,
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>, EvalError>>()?;

        let scores = CvScores::from_folds(scores);
        info!(
            mean_roc_auc = scores.mean_roc_auc,
            mean_mcc = scores.mean_mcc,
            "cross-validation complete"
        );
        Ok(scores)
    }
}

fn score_fold<X, E>(
    fold: usize,
    test: &[usize],
    estimator: &E,
    x: &X,
    labels: &[bool],
) -> Result<FoldScore, EvalError>
where
    X: Rows,
    E: Estimator<X>,
{
    let mut held_out = vec![false; labels.len()];
    for &i in test {
        held_out[i] = true;
    }
    let train: Vec<usize> = (0..labels.len()).filter(|&i| !held_out[i]).collect();
    let train_labels: Vec<bool> = train.iter().map(|&i| labels[i]).collect();
    let test_labels: Vec<bool> = test.iter().map(|&i| labels[i]).collect();

    let model = match estimator.fit(&x.select_rows(&train), &train_labels) {
        Ok(model) => model,
        Err(ModelError::SingleClass { class }) => {
            warn!(fold, class, "fold training rows hold a single class; fold left unscored");
            return Ok(FoldScore {
                fold,
                n_train: train.len(),
                n_test: test.len(),
                roc_auc: f64::NAN,
                mcc: f64::NAN,
            });
        }
        Err(e) => return Err(e.into()),
    };
    let probabilities = model.predict_proba(&x.select_rows(test))?;
    let predictions: Vec<bool> = probabilities.iter().copied().map(decide).collect();

    let auc = match roc_auc(&test_labels, &probabilities) {
        Ok(auc) => auc,
        Err(EvalError::SingleClass { class }) => {
            warn!(fold, class, "held-out rows hold a single class; ROC-AUC undefined");
            f64::NAN
        }
        Err(e) => return Err(e),
    };
    let score = FoldScore {
        fold,
        n_train: train.len(),
        n_test: test.len(),
        roc_auc: auc,
        mcc: mcc(&test_labels, &predictions)?,
    };
    debug!(fold, roc_auc = score.roc_auc, mcc = score.mcc, "fold scored");
    Ok(score)
}

#[cfg(test)]
mod tests {
    use grantwise_features::OneHotMatrix;
    use grantwise_models::LogisticRegressionConfig;

    use super::*;

    /// Column 0 marks positives; columns 1-3 cycle as noise.
    fn make_separable_data(n_rows: usize) -> (OneHotMatrix, Vec<bool>) {
        let mut rows = Vec::with_capacity(n_rows);
        let mut labels = Vec::with_capacity(n_rows);
        for i in 0..n_rows {
            let positive = i % 3 != 0;
            let mut row = vec![1 + i % 3];
            if positive {
                row.push(0);
            }
            rows.push(row);
            labels.push(positive);
        }
        (OneHotMatrix::new(4, rows).unwrap(), labels)
    }

    fn assert_partition(folds: &[Vec<usize>], n_rows: usize) {
        let mut all: Vec<usize> = folds.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..n_rows).collect::<Vec<_>>());
    }

    #[test]
    fn shuffled_folds_partition_rows() {
        let labels = vec![true; 23];
        let folds = CrossValidation::new(5).unwrap().folds(&labels).unwrap();
        let sizes: Vec<usize> = folds.iter().map(Vec::len).collect();
        assert_eq!(sizes, [5, 5, 5, 4, 4]);
        assert_partition(&folds, 23);
    }

    #[test]
    fn stratified_folds_keep_ratio() {
        let labels: Vec<bool> = (0..50).map(|i| i % 5 != 0).collect();
        let folds = CrossValidation::new(5)
            .unwrap()
            .with_strategy(FoldStrategy::Stratified)
            .folds(&labels)
            .unwrap();
        assert_partition(&folds, 50);
        for fold in &folds {
            assert_eq!(fold.len(), 10);
            assert_eq!(fold.iter().filter(|&&i| !labels[i]).count(), 2);
        }
    }

    #[test]
    fn folds_depend_on_seed() {
        let labels = vec![false; 40];
        let a = CrossValidation::new(4).unwrap().folds(&labels).unwrap();
        let b = CrossValidation::new(4).unwrap().folds(&labels).unwrap();
        let c = CrossValidation::new(4).unwrap().with_seed(7).folds(&labels).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn separable_data_scores_perfectly() {
        let (x, labels) = make_separable_data(60);
        let cv = CrossValidation::new(5)
            .unwrap()
            .with_strategy(FoldStrategy::Stratified);
        let scores = cv.evaluate(&LogisticRegressionConfig::new(), &x, &labels).unwrap();
        assert_eq!(scores.folds.len(), 5);
        assert!((scores.mean_roc_auc - 1.0).abs() < 1e-12);
        assert!((scores.mean_mcc - 1.0).abs() < 1e-12);
        assert_eq!(scores.std_roc_auc, 0.0);
        let n_test: usize = scores.folds.iter().map(|f| f.n_test).sum();
        assert_eq!(n_test, 60);
    }

    #[test]
    fn shuffled_single_class_folds_score_nan() {
        // One negative in ten rows: every held-out pair is all positive except
        // the negative's own fold, whose training rows are all positive.
        let rows = (0..10).map(|i| if i == 3 { vec![] } else { vec![0] }).collect();
        let x = OneHotMatrix::new(1, rows).unwrap();
        let labels: Vec<bool> = (0..10).map(|i| i != 3).collect();
        let scores = CrossValidation::new(5)
            .unwrap()
            .evaluate(&LogisticRegressionConfig::new(), &x, &labels)
            .unwrap();

        assert_eq!(scores.folds.len(), 5);
        assert!(scores.folds.iter().all(|f| f.roc_auc.is_nan()));
        assert_eq!(scores.folds.iter().filter(|f| f.mcc.is_nan()).count(), 1);
        assert!(scores.mean_roc_auc.is_nan());
        assert_eq!(scores.mean_mcc, 0.0);
        assert_eq!(scores.std_mcc, 0.0);
    }

    #[test]
    fn shuffled_imbalanced_folds_skip_undefined_scores() {
        let n_rows = 100;
        let labels: Vec<bool> = (0..n_rows).map(|i| i % 17 != 0).collect();
        let rows = labels
            .iter()
            .map(|&positive| if positive { vec![0] } else { vec![] })
            .collect();
        let x = OneHotMatrix::new(1, rows).unwrap();
        let scores = CrossValidation::new(5)
            .unwrap()
            .evaluate(&LogisticRegressionConfig::new(), &x, &labels)
            .unwrap();

        let n_test: usize = scores.folds.iter().map(|f| f.n_test).sum();
        assert_eq!(n_test, n_rows);
        for fold in &scores.folds {
            assert!(fold.roc_auc.is_nan() || (fold.roc_auc - 1.0).abs() < 1e-12);
        }
        assert!((scores.mean_roc_auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn nan_scores_left_out_of_means() {
        let (mean, std) = mean_std([0.5, f64::NAN, 1.0].into_iter());
        assert!((mean - 0.75).abs() < 1e-12);
        assert!((std - 0.25).abs() < 1e-12);
        let (mean, std) = mean_std([f64::NAN].into_iter());
        assert!(mean.is_nan() && std.is_nan());
    }

    #[test]
    fn invalid_fold_count() {
        assert!(CrossValidation::new(0).is_err());
        assert!(matches!(
            CrossValidation::new(1),
            Err(EvalError::InvalidFoldCount { n_folds: 1 })
        ));
    }

    #[test]
    fn too_few_rows_or_class_members() {
        let cv = CrossValidation::new(5).unwrap();
        assert!(matches!(
            cv.folds(&[true, false, true]),
            Err(EvalError::TooFewRows { n_rows: 3, n_folds: 5 })
        ));
        let labels = [false, false, true, true, true, true, true];
        assert!(matches!(
            cv.with_strategy(FoldStrategy::Stratified).folds(&labels),
            Err(EvalError::TooFewSamplesForFolds {
                class: false,
                count: 2,
                n_folds: 5
            })
        ));
    }

    #[test]
    fn label_count_checked() {
        let (x, _) = make_separable_data(10);
        let cv = CrossValidation::new(2).unwrap();
        assert!(matches!(
            cv.evaluate(&LogisticRegressionConfig::new(), &x, &[true; 4]),
            Err(EvalError::LabelCountMismatch {
                n_rows: 10,
                n_labels: 4
            })
        ));
    }
}
