//! Criterion benchmarks for grantwise-models: training and batch prediction.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use grantwise_features::{
    CategoricalTable, Category, FittedPreprocessor, ImputingPreprocessor, OneHotPreprocessor,
    Preprocessor,
};
use grantwise_models::{
    CategoricalBoostingConfig, GradientBoostingConfig, LogisticRegressionConfig, Model,
    RandomForestConfig,
};

fn make_access_table(n_rows: usize, n_columns: usize, seed: u64) -> (CategoricalTable, Vec<bool>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n_rows);
    let mut labels = Vec::with_capacity(n_rows);
    for _ in 0..n_rows {
        let row: Vec<Option<Category>> = (0..n_columns)
            .map(|_| Some(Category::new(rng.gen_range(0..40))))
            .collect();
        let signal = row[0].map_or(0, Category::code) < 30;
        labels.push(rng.r#gen::<f64>() < if signal { 0.94 } else { 0.3 });
        rows.push(row);
    }
    let columns = (0..n_columns).map(|c| format!("C{c}")).collect();
    (CategoricalTable::new(columns, rows).unwrap(), labels)
}

fn bench_logistic_train(c: &mut Criterion) {
    let (table, labels) = make_access_table(2000, 9, 42);
    let x = OneHotPreprocessor::new().fit(&table).unwrap().transform(&table).unwrap();
    let cfg = LogisticRegressionConfig::new();

    c.bench_function("logistic_train_2000x9", |b| {
        b.iter(|| cfg.fit(&x, &labels).unwrap());
    });
}

fn bench_forest_train(c: &mut Criterion) {
    let (table, labels) = make_access_table(2000, 9, 42);
    let x = OneHotPreprocessor::new().fit(&table).unwrap().transform(&table).unwrap();
    let cfg = RandomForestConfig::new(50).unwrap().with_seed(42);

    c.bench_function("forest_train_2000x9_50trees", |b| {
        b.iter(|| cfg.fit(&x, &labels).unwrap());
    });
}

fn bench_forest_predict_batch(c: &mut Criterion) {
    let (table, labels) = make_access_table(2000, 9, 42);
    let x = OneHotPreprocessor::new().fit(&table).unwrap().transform(&table).unwrap();
    let forest = RandomForestConfig::new(50).unwrap().fit(&x, &labels).unwrap();

    c.bench_function("forest_predict_batch_2000x9_50trees", |b| {
        b.iter(|| forest.predict_proba(&x).unwrap());
    });
}

fn bench_gradient_boosting_train(c: &mut Criterion) {
    let (table, labels) = make_access_table(2000, 9, 42);
    let x = OneHotPreprocessor::new().fit(&table).unwrap().transform(&table).unwrap();
    let cfg = GradientBoostingConfig::new(50).unwrap().with_max_depth(6);

    c.bench_function("gradient_boosting_train_2000x9_50rounds", |b| {
        b.iter(|| cfg.fit(&x, &labels).unwrap());
    });
}

fn bench_categorical_boosting_train(c: &mut Criterion) {
    let (table, labels) = make_access_table(2000, 9, 42);
    let x = ImputingPreprocessor::new().fit(&table).unwrap().transform(&table).unwrap();
    let cfg = CategoricalBoostingConfig::new(100).unwrap();

    c.bench_function("categorical_boosting_train_2000x9_100iter", |b| {
        b.iter(|| cfg.fit(&x, &labels).unwrap());
    });
}

criterion_group!(
    benches,
    bench_logistic_train,
    bench_forest_train,
    bench_forest_predict_batch,
    bench_gradient_boosting_train,
    bench_categorical_boosting_train
);
criterion_main!(benches);
