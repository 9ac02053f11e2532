//! File I/O and validation for the grantwise pipeline.
//!
//! Reads the labelled training file and the id-keyed request file into
//! [`CategoricalTable`](grantwise_features::CategoricalTable)s, writes the
//! `id,ACTION` submission and the JSON evaluation report.

mod domain;
mod error;
mod reader;
mod report;
mod writer;

pub use domain::{ExperimentName, RecordId, RequestSet, TrainingSet};
pub use error::IoError;
pub use reader::{RequestReader, TrainingReader};
pub use report::{EvaluationReport, ModelReport, SplitSummary};
pub use writer::{ReportWriter, SubmissionWriter};
