//! Accuracy regression tests for grantwise-models.
//!
//! Every classifier is fitted through its pipeline on a deterministic
//! synthetic access table where one column carries all of the signal.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use grantwise_features::{CategoricalTable, Category, ImputingPreprocessor, OneHotPreprocessor};
use grantwise_models::{
    CategoricalBoostingConfig, DynEstimator, Estimator, GradientBoostingConfig,
    LogisticRegressionConfig, Model, Pipeline, RandomForestConfig, SoftVoting,
};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic access table
// ---------------------------------------------------------------------------

const COLUMNS: [&str; 4] = ["RESOURCE", "MGR_ID", "ROLE_CODE", "ROLE_FAMILY"];

/// Generate `n_rows` access requests.
///
/// RESOURCE codes 0-6 are granted 95% of the time, codes 7-9 only 15%.
/// The other columns are uniform noise; MGR_ID is missing in ~5% of rows.
fn make_access_table(n_rows: usize, seed: u64) -> (CategoricalTable, Vec<bool>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n_rows);
    let mut labels = Vec::with_capacity(n_rows);
    for _ in 0..n_rows {
        let resource = rng.gen_range(0..10i64);
        let mgr = (rng.r#gen::<f64>() >= 0.05).then(|| Category::new(rng.gen_range(100..105)));
        let code = Category::new(rng.gen_range(0..5));
        let family = Category::new(rng.gen_range(0..5));
        let rate = if resource < 7 { 0.95 } else { 0.15 };
        labels.push(rng.r#gen::<f64>() < rate);
        rows.push(vec![Some(Category::new(resource)), mgr, Some(code), Some(family)]);
    }
    let columns = COLUMNS.iter().map(|c| (*c).to_string()).collect();
    (CategoricalTable::new(columns, rows).unwrap(), labels)
}

/// Mean probability of rows with a frequently granted resource minus the
/// mean of the rest.
fn signal_gap(table: &CategoricalTable, probabilities: &[f64]) -> f64 {
    let (mut good, mut n_good, mut bad, mut n_bad) = (0.0, 0usize, 0.0, 0usize);
    for (row, &p) in table.rows().iter().zip(probabilities) {
        let resource = row[0].map(Category::code).unwrap();
        if resource < 7 {
            good += p;
            n_good += 1;
        } else {
            bad += p;
            n_bad += 1;
        }
    }
    good / n_good as f64 - bad / n_bad as f64
}

fn assert_unit_interval(probabilities: &[f64]) {
    for &p in probabilities {
        assert!((0.0..=1.0).contains(&p), "probability {p} outside [0, 1]");
    }
}

fn member(name: &str, estimator: impl DynEstimator + 'static) -> (String, Box<dyn DynEstimator>) {
    (name.to_string(), Box::new(estimator))
}

// ---------------------------------------------------------------------------
// a) held_out_signal_gap
// ---------------------------------------------------------------------------

/// Every classifier must separate good from bad resources on fresh rows.
///
/// The true probability gap is 0.8; 0.4 leaves room for regularization.
#[test]
fn held_out_signal_gap() {
    let (train, labels) = make_access_table(400, 42);
    let (test, _) = make_access_table(200, 43);

    let gaps = [
        (
            "logistic",
            Pipeline::new(OneHotPreprocessor::new(), LogisticRegressionConfig::new())
                .fit(&train, &labels)
                .unwrap()
                .predict_proba(&test)
                .unwrap(),
        ),
        (
            "forest",
            Pipeline::new(OneHotPreprocessor::new(), RandomForestConfig::new(50).unwrap())
                .fit(&train, &labels)
                .unwrap()
                .predict_proba(&test)
                .unwrap(),
        ),
        (
            "gradient-boosting",
            Pipeline::new(
                OneHotPreprocessor::new(),
                GradientBoostingConfig::new(50).unwrap().with_max_depth(3),
            )
            .fit(&train, &labels)
            .unwrap()
            .predict_proba(&test)
            .unwrap(),
        ),
        (
            "categorical-boosting",
            Pipeline::new(
                ImputingPreprocessor::new(),
                CategoricalBoostingConfig::new(100).unwrap(),
            )
            .fit(&train, &labels)
            .unwrap()
            .predict_proba(&test)
            .unwrap(),
        ),
    ];

    for (name, probabilities) in &gaps {
        assert_unit_interval(probabilities);
        let gap = signal_gap(&test, probabilities);
        assert!(gap > 0.4, "{name}: signal gap {gap} <= 0.4");
    }
}

// ---------------------------------------------------------------------------
// b) signal_column_ranks_first
// ---------------------------------------------------------------------------

/// The tree models must rank a RESOURCE feature first.
#[test]
fn signal_column_ranks_first() {
    let (train, labels) = make_access_table(400, 42);

    let forest = Pipeline::new(OneHotPreprocessor::new(), RandomForestConfig::new(50).unwrap())
        .fit(&train, &labels)
        .unwrap();
    let boosted = Pipeline::new(
        OneHotPreprocessor::new(),
        GradientBoostingConfig::new(50).unwrap().with_max_depth(3),
    )
    .fit(&train, &labels)
    .unwrap();
    let categorical = Pipeline::new(
        ImputingPreprocessor::new(),
        CategoricalBoostingConfig::new(100).unwrap(),
    )
    .fit(&train, &labels)
    .unwrap();

    for ranked in [
        forest.ranked_importances(),
        boosted.ranked_importances(),
        categorical.ranked_importances(),
    ] {
        assert!(
            ranked[0].name.starts_with("RESOURCE"),
            "top feature is {}",
            ranked[0].name
        );
        let total: f64 = ranked.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-9, "importances sum to {total}");
    }
}

// ---------------------------------------------------------------------------
// c) ensemble_tracks_members
// ---------------------------------------------------------------------------

/// The soft-voting ensemble keeps the signal and stays inside [0, 1].
#[test]
fn ensemble_tracks_members() {
    let (train, labels) = make_access_table(400, 42);
    let (test, _) = make_access_table(200, 43);

    let ensemble = SoftVoting::new(vec![
        member(
            "logistic",
            Pipeline::new(OneHotPreprocessor::new(), LogisticRegressionConfig::new()),
        ),
        member(
            "forest",
            Pipeline::new(OneHotPreprocessor::new(), RandomForestConfig::new(30).unwrap()),
        ),
        member(
            "gradient-boosting",
            Pipeline::new(
                OneHotPreprocessor::new(),
                GradientBoostingConfig::new(30).unwrap().with_max_depth(3),
            ),
        ),
        member(
            "categorical-boosting",
            Pipeline::new(
                ImputingPreprocessor::new(),
                CategoricalBoostingConfig::new(50).unwrap(),
            ),
        ),
    ])
    .unwrap()
    .fit(&train, &labels)
    .unwrap();

    let probabilities = ensemble.predict_proba(&test).unwrap();
    assert_eq!(probabilities.len(), 200);
    assert_unit_interval(&probabilities);
    let gap = signal_gap(&test, &probabilities);
    assert!(gap > 0.4, "ensemble signal gap {gap} <= 0.4");
}

// ---------------------------------------------------------------------------
// d) imbalanced_ten_rows_score_unseen_values
// ---------------------------------------------------------------------------

/// Ten training rows with a 90/10 label split, scored on three disjoint
/// rows holding unseen and missing values.
#[test]
fn imbalanced_ten_rows_score_unseen_values() {
    let columns: Vec<String> = COLUMNS.iter().map(|c| (*c).to_string()).collect();
    let cell = |code: i64| Some(Category::new(code));
    let train = CategoricalTable::new(
        columns.clone(),
        (0..10)
            .map(|i| vec![cell(i % 3), cell(100 + i % 2), cell(i % 4), cell(7)])
            .collect(),
    )
    .unwrap();
    let mut labels = vec![true; 10];
    labels[4] = false;

    let test = CategoricalTable::new(
        columns,
        vec![
            vec![cell(999), cell(100), cell(0), cell(7)],
            vec![cell(1), None, cell(555), cell(7)],
            vec![cell(2), cell(101), cell(3), cell(8)],
        ],
    )
    .unwrap();

    let estimators = vec![
        member(
            "logistic",
            Pipeline::new(OneHotPreprocessor::new(), LogisticRegressionConfig::new()),
        ),
        member(
            "forest",
            Pipeline::new(OneHotPreprocessor::new(), RandomForestConfig::new(20).unwrap()),
        ),
        member(
            "gradient-boosting",
            Pipeline::new(OneHotPreprocessor::new(), GradientBoostingConfig::new(20).unwrap()),
        ),
        member(
            "categorical-boosting",
            Pipeline::new(
                ImputingPreprocessor::new(),
                CategoricalBoostingConfig::new(20).unwrap(),
            ),
        ),
    ];

    for (name, estimator) in &estimators {
        let model = estimator.fit_boxed(&train, &labels).unwrap();
        let probabilities = model.predict_proba(&test).unwrap();
        assert_eq!(probabilities.len(), 3, "{name}");
        assert_unit_interval(&probabilities);
    }

    let ensemble = SoftVoting::new(estimators).unwrap().fit(&train, &labels).unwrap();
    let probabilities = ensemble.predict_proba(&test).unwrap();
    assert_eq!(probabilities.len(), 3);
    assert_unit_interval(&probabilities);
}

// ---------------------------------------------------------------------------
// e) seeded_fits_are_reproducible
// ---------------------------------------------------------------------------

/// Two fits with the same seed produce identical probabilities.
#[test]
fn seeded_fits_are_reproducible() {
    let (train, labels) = make_access_table(200, 42);
    let estimator = Pipeline::new(
        ImputingPreprocessor::new(),
        CategoricalBoostingConfig::new(30).unwrap().with_seed(7),
    );
    let a = estimator.fit(&train, &labels).unwrap().predict_proba(&train).unwrap();
    let b = estimator.fit(&train, &labels).unwrap().predict_proba(&train).unwrap();
    assert_eq!(a, b);

    let forest = Pipeline::new(
        OneHotPreprocessor::new(),
        RandomForestConfig::new(20).unwrap().with_seed(7),
    );
    let a = forest.fit(&train, &labels).unwrap().predict_proba(&train).unwrap();
    let b = forest.fit(&train, &labels).unwrap().predict_proba(&train).unwrap();
    assert_eq!(a, b);
}
