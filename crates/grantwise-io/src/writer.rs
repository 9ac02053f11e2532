//! Submission CSV and JSON report writers.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{ExperimentName, RecordId};
use crate::report::EvaluationReport;

fn create_dir(path: &Path) -> Result<(), IoError> {
    fs::create_dir_all(path).map_err(|e| IoError::OutputDirCreate {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Writes `id,ACTION` decision files.
///
/// `ACTION` is `1` for granted and `0` otherwise; rows keep the request order.
pub struct SubmissionWriter {
    path: PathBuf,
}

impl SubmissionWriter {
    /// Create a writer targeting `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Write one row per request, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::PredictionCountMismatch`] | `ids.len() != decisions.len()` |
    /// | [`IoError::OutputDirCreate`] | The parent directory cannot be created |
    /// | [`IoError::CsvWrite`] | The file cannot be created or a record cannot be written |
    /// | [`IoError::WriteFile`] | The file cannot be flushed |
    #[instrument(skip_all, fields(path = %self.path.display(), n_rows = ids.len()))]
    pub fn write(&self, ids: &[RecordId], decisions: &[bool]) -> Result<(), IoError> {
        if ids.len() != decisions.len() {
            return Err(IoError::PredictionCountMismatch {
                n_ids: ids.len(),
                n_decisions: decisions.len(),
            });
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir(parent)?;
        }

        let csv_write = |e: csv::Error| IoError::CsvWrite {
            path: self.path.clone(),
            source: e,
        };
        let mut writer = csv::Writer::from_path(&self.path).map_err(csv_write)?;
        writer.write_record(["id", "ACTION"]).map_err(csv_write)?;
        for (id, &granted) in ids.iter().zip(decisions) {
            writer
                .write_record([id.as_str(), if granted { "1" } else { "0" }])
                .map_err(csv_write)?;
        }
        writer.flush().map_err(|e| IoError::WriteFile {
            path: self.path.clone(),
            source: e,
        })?;

        let n_granted = decisions.iter().filter(|&&d| d).count();
        info!(n_granted, "submission written");
        Ok(())
    }
}

/// Writes evaluation reports to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Reports are named `{experiment}_evaluate.json`.
pub struct ReportWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ReportWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        create_dir(output_dir)?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Return the experiment name.
    #[must_use]
    pub fn experiment(&self) -> &ExperimentName {
        &self.experiment
    }

    /// Return the path of the evaluation report.
    #[must_use]
    pub fn evaluation_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_evaluate.json", self.experiment.as_str()))
    }

    /// Write `report` to `{experiment}_evaluate.json` and return the path.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | The report cannot be encoded |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all)]
    pub fn write_evaluation(&self, report: &EvaluationReport) -> Result<PathBuf, IoError> {
        let path = self.evaluation_path();
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), n_models = report.models.len(), "evaluation report written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use grantwise_eval::{BinaryConfusion, CvScores, FoldScore, RocCurve, SummaryRow};
    use tempfile::TempDir;

    use super::*;
    use crate::report::{ModelReport, SplitSummary};

    fn ids(raw: &[&str]) -> Vec<RecordId> {
        raw.iter().map(|s| RecordId::new((*s).to_string())).collect()
    }

    fn cv() -> CvScores {
        CvScores {
            folds: vec![FoldScore {
                fold: 0,
                n_train: 8,
                n_test: 2,
                roc_auc: 1.0,
                mcc: 1.0,
            }],
            mean_roc_auc: 1.0,
            std_roc_auc: 0.0,
            mean_mcc: 1.0,
            std_mcc: 0.0,
        }
    }

    fn report(experiment: &str) -> EvaluationReport {
        EvaluationReport {
            experiment: experiment.to_string(),
            seed: 42,
            n_folds: 5,
            split: SplitSummary {
                n_train: 8,
                n_test: 2,
                train_positive_rate: 0.5,
                test_positive_rate: 0.5,
            },
            models: vec![ModelReport {
                summary: SummaryRow {
                    name: "logistic".into(),
                    train_roc_auc: 1.0,
                    test_roc_auc: 0.9,
                    train_mcc: 0.8,
                    test_mcc: 0.7,
                },
                train_cv: cv(),
                test_cv: cv(),
                test_confusion: BinaryConfusion::default(),
                roc: RocCurve {
                    fpr: vec![0.0, 1.0],
                    tpr: vec![0.0, 1.0],
                    thresholds: vec![f64::INFINITY, 0.5],
                },
                top_features: Vec::new(),
            }],
        }
    }

    #[test]
    fn submission_rows_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("submission.csv");
        SubmissionWriter::new(&path)
            .write(&ids(&["7", "3", "9"]), &[true, false, true])
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "id,ACTION\n7,1\n3,0\n9,1\n");
    }

    #[test]
    fn submission_length_mismatch() {
        let dir = TempDir::new().unwrap();
        let result = SubmissionWriter::new(&dir.path().join("s.csv")).write(&ids(&["1"]), &[]);
        assert!(matches!(
            result,
            Err(IoError::PredictionCountMismatch {
                n_ids: 1,
                n_decisions: 0
            })
        ));
    }

    #[test]
    fn evaluation_json_structure() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("eval_test".into()).unwrap();
        let writer = ReportWriter::new(dir.path(), experiment).unwrap();
        let path = writer.write_evaluation(&report("eval_test")).unwrap();
        assert_eq!(path, dir.path().join("eval_test_evaluate.json"));

        let content: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(content["experiment"], "eval_test");
        assert_eq!(content["split"]["n_train"], 8);
        let model = &content["models"][0];
        assert_eq!(model["summary"]["name"], "logistic");
        assert_eq!(model["train_cv"]["folds"].as_array().unwrap().len(), 1);
        // +inf has no JSON representation.
        assert!(model["roc"]["thresholds"][0].is_null());
        assert!(model.get("top_features").is_none());
    }

    #[test]
    fn report_writer_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("deep");
        let experiment = ExperimentName::new("nested_test".into()).unwrap();
        let writer = ReportWriter::new(&nested, experiment).unwrap();
        writer.write_evaluation(&report("nested_test")).unwrap();
        assert!(nested.join("nested_test_evaluate.json").exists());
    }
}
