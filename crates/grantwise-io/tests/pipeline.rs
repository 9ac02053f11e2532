//! End-to-end integration tests: CSV -> pipeline -> CSV / JSON -> read back.

use std::fs;
use std::path::Path;

use grantwise_eval::{CrossValidation, Evaluator, FoldStrategy};
use grantwise_features::{ImputingPreprocessor, OneHotPreprocessor, StratifiedSplit};
use grantwise_io::{
    EvaluationReport, ExperimentName, IoError, ModelReport, ReportWriter, RequestReader,
    SplitSummary, SubmissionWriter, TrainingReader,
};
use grantwise_models::{
    CategoricalBoostingConfig, Estimator, LogisticRegressionConfig, Model, Pipeline,
};
use tempfile::TempDir;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn predict_round_trip() {
    // 1. Read both CSVs
    let train = TrainingReader::new(&fixture_path("train_small.csv"))
        .read()
        .expect("fixture should parse");
    let requests = RequestReader::new(&fixture_path("requests_small.csv"))
        .read()
        .expect("fixture should parse");
    assert_eq!(train.len(), 80);
    assert_eq!(requests.ids.len(), 5);

    // 2. Fit on every training row; requests hold unseen and missing values
    let model = Pipeline::new(
        ImputingPreprocessor::new(),
        CategoricalBoostingConfig::new(50).unwrap(),
    )
    .fit(&train.table, &train.labels)
    .unwrap();
    let probabilities = model.predict_proba(&requests.table).unwrap();
    assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));

    // 3. Write the submission
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("submission.csv");
    let decisions = model.predict(&requests.table).unwrap();
    SubmissionWriter::new(&path)
        .write(&requests.ids, &decisions)
        .unwrap();

    // 4. Read back and verify
    let mut reader = csv::Reader::from_path(&path).unwrap();
    let header: Vec<&str> = reader.headers().unwrap().iter().collect();
    assert_eq!(header, ["id", "ACTION"]);
    let rows: Vec<(String, String)> = reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[0].to_string(), r[1].to_string())
        })
        .collect();
    assert_eq!(rows.len(), 5);
    for ((id, action), (expected_id, &granted)) in rows
        .iter()
        .zip(requests.ids.iter().zip(&decisions))
    {
        assert_eq!(id, expected_id.as_str());
        assert_eq!(action, if granted { "1" } else { "0" });
    }
}

#[test]
fn evaluation_report_round_trip() {
    let train = TrainingReader::new(&fixture_path("train_small.csv"))
        .read()
        .unwrap();
    let parts = StratifiedSplit::new(0.2).unwrap().split(&train.labels).unwrap();
    let (fit_part, test_part) = (train.select(&parts.train), train.select(&parts.test));

    let evaluator = Evaluator::new(
        CrossValidation::new(3)
            .unwrap()
            .with_strategy(FoldStrategy::Stratified),
    );
    let estimator = Pipeline::new(OneHotPreprocessor::new(), LogisticRegressionConfig::new());
    let evaluation = evaluator
        .evaluate(
            "logistic",
            &estimator,
            &fit_part.table,
            &fit_part.labels,
            &test_part.table,
            &test_part.labels,
        )
        .unwrap();
    let ranked = evaluation.model.ranked_importances();

    let report = EvaluationReport {
        experiment: "io_rt".into(),
        seed: 42,
        n_folds: 3,
        split: SplitSummary {
            n_train: fit_part.len(),
            n_test: test_part.len(),
            train_positive_rate: fit_part.positive_rate(),
            test_positive_rate: test_part.positive_rate(),
        },
        models: vec![ModelReport::new(&evaluation, ranked, 15)],
    };

    let dir = TempDir::new().unwrap();
    let writer = ReportWriter::new(dir.path(), ExperimentName::new("io_rt".into()).unwrap()).unwrap();
    let path = writer.write_evaluation(&report).unwrap();

    let content: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(content["experiment"], "io_rt");
    assert_eq!(content["split"]["n_train"].as_u64().unwrap(), 64);
    assert_eq!(content["split"]["n_test"].as_u64().unwrap(), 16);

    let model = &content["models"][0];
    assert_eq!(model["summary"]["name"], "logistic");
    assert_eq!(model["test_cv"]["folds"].as_array().unwrap().len(), 3);
    let top = model["top_features"].as_array().unwrap();
    assert_eq!(top.len(), 15);
    assert_eq!(top[0]["rank"], 1);

    let fpr = model["roc"]["fpr"].as_array().unwrap();
    assert_eq!(fpr.first().unwrap().as_f64().unwrap(), 0.0);
    assert_eq!(fpr.last().unwrap().as_f64().unwrap(), 1.0);
}

#[test]
fn malformed_cell_is_fatal() {
    let result = TrainingReader::new(&fixture_path("train_bad_cell.csv")).read();
    match result {
        Err(IoError::InvalidCategory {
            row_index, column, ..
        }) => {
            assert_eq!(row_index, 1);
            assert_eq!(column, "ROLE_DEPTNAME");
        }
        other => panic!("expected InvalidCategory, got {other:?}"),
    }
}

#[test]
fn request_file_rejected_as_training_file() {
    let result = TrainingReader::new(&fixture_path("requests_small.csv")).read();
    assert!(matches!(result, Err(IoError::HeaderMismatch { .. })));
}
