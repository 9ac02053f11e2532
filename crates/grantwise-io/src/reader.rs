//! CSV readers for training and request files with full input validation.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use grantwise_features::{CategoricalTable, Category, FEATURE_COLUMNS};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{RecordId, RequestSet, TrainingSet};

/// Name of the label column of the training file.
const LABEL_COLUMN: &str = "ACTION";

/// Name of the key column of the request file.
const ID_COLUMN: &str = "id";

fn default_feature_columns() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| (*c).to_string()).collect()
}

/// An open CSV file whose header matched the expected columns.
struct CheckedCsv {
    path: PathBuf,
    reader: csv::Reader<File>,
    n_columns: usize,
}

impl CheckedCsv {
    /// Open `path` and require its header to equal `expected` exactly.
    fn open(path: &Path, expected: Vec<String>) -> Result<Self, IoError> {
        let file = File::open(path).map_err(|e| IoError::FileNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;

        // flexible(true) allows rows with varying column counts so that our own
        // InconsistentRowLength check fires instead of a low-level CsvParse error.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = reader.headers().map_err(|e| csv_parse(path, e))?;
        let got: Vec<String> = header.iter().map(str::to_string).collect();
        if got != expected {
            return Err(IoError::HeaderMismatch {
                path: path.to_path_buf(),
                expected,
                got,
            });
        }
        debug!(n_columns = got.len(), "read CSV header");

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            n_columns: got.len(),
        })
    }

    /// Visit every data row after checking its width.
    fn for_each_row(
        &mut self,
        mut visit: impl FnMut(usize, &StringRecord) -> Result<(), IoError>,
    ) -> Result<usize, IoError> {
        let mut record = StringRecord::new();
        let mut row_index = 0;
        loop {
            let more = self
                .reader
                .read_record(&mut record)
                .map_err(|e| csv_parse(&self.path, e))?;
            if !more {
                break;
            }
            if record.len() != self.n_columns {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: self.n_columns,
                    got: record.len(),
                });
            }
            visit(row_index, &record)?;
            row_index += 1;
        }
        if row_index == 0 {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }
        Ok(row_index)
    }
}

fn csv_parse(path: &Path, e: csv::Error) -> IoError {
    IoError::CsvParse {
        path: path.to_path_buf(),
        offset: e.position().map_or(0, |p| p.byte()),
        source: e,
    }
}

/// Parse attribute cells `record[first..]`; an empty cell is missing.
fn parse_attributes(
    path: &Path,
    row_index: usize,
    record: &StringRecord,
    first: usize,
    columns: &[String],
) -> Result<Vec<Option<Category>>, IoError> {
    columns
        .iter()
        .enumerate()
        .map(|(offset, column)| {
            let raw = record.get(first + offset).unwrap_or("");
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<i64>()
                .map(|code| Some(Category::new(code)))
                .map_err(|_| IoError::InvalidCategory {
                    path: path.to_path_buf(),
                    row_index,
                    column: column.clone(),
                    raw: raw.to_string(),
                })
        })
        .collect()
}

/// Reads labelled access decisions from a CSV file.
///
/// Expected CSV format:
/// - Header `ACTION,RESOURCE,MGR_ID,ROLE_ROLLUP_1,ROLE_ROLLUP_2,ROLE_DEPTNAME,ROLE_TITLE,ROLE_FAMILY_DESC,ROLE_FAMILY,ROLE_CODE`
/// - `ACTION` is `0` or `1`; every other cell is an integer code or empty
///   (missing)
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::HeaderMismatch`] | Header differs from the expected columns |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::InvalidLabel`] | `ACTION` is not `0` or `1` |
/// | [`IoError::InvalidCategory`] | Attribute cell is not empty and not an integer |
pub struct TrainingReader {
    path: PathBuf,
    feature_columns: Vec<String>,
}

impl TrainingReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            feature_columns: default_feature_columns(),
        }
    }

    /// Override the attribute columns expected after `ACTION`.
    #[must_use]
    pub fn with_feature_columns(mut self, columns: Vec<String>) -> Self {
        self.feature_columns = columns;
        self
    }

    /// Read and validate the CSV file, returning a [`TrainingSet`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<TrainingSet, IoError> {
        let mut expected = vec![LABEL_COLUMN.to_string()];
        expected.extend(self.feature_columns.iter().cloned());
        let mut csv = CheckedCsv::open(&self.path, expected)?;

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        csv.for_each_row(|row_index, record| {
            let label = match record.get(0).unwrap_or("") {
                "0" => false,
                "1" => true,
                raw => {
                    return Err(IoError::InvalidLabel {
                        path: self.path.clone(),
                        row_index,
                        raw: raw.to_string(),
                    });
                }
            };
            labels.push(label);
            rows.push(parse_attributes(
                &self.path,
                row_index,
                record,
                1,
                &self.feature_columns,
            )?);
            Ok(())
        })?;

        let table = CategoricalTable::new(self.feature_columns.clone(), rows)?;
        let set = TrainingSet { table, labels };
        info!(
            n_rows = set.len(),
            positive_rate = set.positive_rate(),
            n_missing = set.table.n_missing(),
            "training set loaded"
        );
        Ok(set)
    }
}

/// Reads unlabelled access requests from a CSV file.
///
/// Expected CSV format:
/// - Header `id` followed by the same attribute columns as the training file
/// - `id` is a non-empty, unique string
///
/// # Errors
///
/// Same as [`TrainingReader`], with [`IoError::EmptyRecordId`] and
/// [`IoError::DuplicateRecordId`] in place of [`IoError::InvalidLabel`].
pub struct RequestReader {
    path: PathBuf,
    feature_columns: Vec<String>,
}

impl RequestReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            feature_columns: default_feature_columns(),
        }
    }

    /// Override the attribute columns expected after `id`.
    #[must_use]
    pub fn with_feature_columns(mut self, columns: Vec<String>) -> Self {
        self.feature_columns = columns;
        self
    }

    /// Read and validate the CSV file, returning a [`RequestSet`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<RequestSet, IoError> {
        let mut expected = vec![ID_COLUMN.to_string()];
        expected.extend(self.feature_columns.iter().cloned());
        let mut csv = CheckedCsv::open(&self.path, expected)?;

        let mut ids = Vec::new();
        let mut rows = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        csv.for_each_row(|row_index, record| {
            let id = record.get(0).unwrap_or("").to_string();
            if id.is_empty() {
                return Err(IoError::EmptyRecordId {
                    path: self.path.clone(),
                    row_index,
                });
            }
            if let Some(&first_row) = seen.get(&id) {
                return Err(IoError::DuplicateRecordId {
                    path: self.path.clone(),
                    id,
                    first_row,
                    second_row: row_index,
                });
            }
            seen.insert(id.clone(), row_index);
            rows.push(parse_attributes(
                &self.path,
                row_index,
                record,
                1,
                &self.feature_columns,
            )?);
            ids.push(RecordId::new(id));
            Ok(())
        })?;

        let table = CategoricalTable::new(self.feature_columns.clone(), rows)?;
        info!(n_rows = ids.len(), n_missing = table.n_missing(), "request set loaded");
        Ok(RequestSet { ids, table })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use grantwise_features::Rows;
    use tempfile::NamedTempFile;

    use super::*;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    fn short(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn read_full_header() {
        let csv = "ACTION,RESOURCE,MGR_ID,ROLE_ROLLUP_1,ROLE_ROLLUP_2,ROLE_DEPTNAME,ROLE_TITLE,ROLE_FAMILY_DESC,ROLE_FAMILY,ROLE_CODE\n\
                   1,39353,85475,117961,118300,123472,117905,117906,290919,117908\n\
                   0,17183,1540,117961,118343,123125,118536,118536,308574,118539\n";
        let f = write_csv(csv);
        let set = TrainingReader::new(f.path()).read().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.labels, [true, false]);
        assert_eq!(set.table.columns().len(), 9);
        assert_eq!(set.table.rows()[1][0], Some(Category::new(17183)));
    }

    #[test]
    fn empty_cells_are_missing() {
        let csv = "ACTION,RESOURCE,MGR_ID\n1,5,\n0, ,7\n";
        let f = write_csv(csv);
        let set = TrainingReader::new(f.path())
            .with_feature_columns(short(&["RESOURCE", "MGR_ID"]))
            .read()
            .unwrap();
        assert_eq!(set.table.n_missing(), 2);
        assert_eq!(set.table.rows()[0], vec![Some(Category::new(5)), None]);
    }

    #[test]
    fn error_file_not_found() {
        let result = TrainingReader::new(Path::new("/nonexistent/train.csv")).read();
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }

    #[test]
    fn error_header_mismatch() {
        let f = write_csv("ACTION,MGR_ID,RESOURCE\n1,2,3\n");
        let result = TrainingReader::new(f.path())
            .with_feature_columns(short(&["RESOURCE", "MGR_ID"]))
            .read();
        assert!(matches!(result, Err(IoError::HeaderMismatch { .. })));
    }

    #[test]
    fn error_empty_dataset() {
        let f = write_csv("ACTION,RESOURCE\n");
        let result = TrainingReader::new(f.path())
            .with_feature_columns(short(&["RESOURCE"]))
            .read();
        assert!(matches!(result, Err(IoError::EmptyDataset { .. })));
    }

    #[test]
    fn error_inconsistent_row_length() {
        let f = write_csv("ACTION,RESOURCE,MGR_ID\n1,2,3\n0,4\n");
        let result = TrainingReader::new(f.path())
            .with_feature_columns(short(&["RESOURCE", "MGR_ID"]))
            .read();
        assert!(matches!(
            result,
            Err(IoError::InconsistentRowLength { row_index: 1, .. })
        ));
    }

    #[test]
    fn error_non_integer_category() {
        let f = write_csv("ACTION,RESOURCE,MGR_ID\n1,2,abc\n");
        let result = TrainingReader::new(f.path())
            .with_feature_columns(short(&["RESOURCE", "MGR_ID"]))
            .read();
        match result {
            Err(IoError::InvalidCategory { column, raw, .. }) => {
                assert_eq!(column, "MGR_ID");
                assert_eq!(raw, "abc");
            }
            other => panic!("expected InvalidCategory, got {other:?}"),
        }
    }

    #[test]
    fn error_invalid_label() {
        for bad in ["2", "", "yes"] {
            let f = write_csv(&format!("ACTION,RESOURCE\n{bad},1\n"));
            let result = TrainingReader::new(f.path())
                .with_feature_columns(short(&["RESOURCE"]))
                .read();
            assert!(matches!(result, Err(IoError::InvalidLabel { row_index: 0, .. })));
        }
    }

    #[test]
    fn requests_keep_file_order() {
        let f = write_csv("id,RESOURCE\nZZZ,1\nAAA,2\nMMM,\n");
        let set = RequestReader::new(f.path())
            .with_feature_columns(short(&["RESOURCE"]))
            .read()
            .unwrap();
        let ids: Vec<&str> = set.ids.iter().map(RecordId::as_str).collect();
        assert_eq!(ids, ["ZZZ", "AAA", "MMM"]);
        assert_eq!(set.table.n_rows(), 3);
        assert_eq!(set.table.rows()[2][0], None);
    }

    #[test]
    fn error_duplicate_request_id() {
        let f = write_csv("id,RESOURCE\n1,1\n2,2\n1,3\n");
        let result = RequestReader::new(f.path())
            .with_feature_columns(short(&["RESOURCE"]))
            .read();
        assert!(matches!(
            result,
            Err(IoError::DuplicateRecordId {
                first_row: 0,
                second_row: 2,
                ..
            })
        ));
    }

    #[test]
    fn error_training_header_on_request_file() {
        let f = write_csv("ACTION,RESOURCE\n1,1\n");
        let result = RequestReader::new(f.path())
            .with_feature_columns(short(&["RESOURCE"]))
            .read();
        assert!(matches!(result, Err(IoError::HeaderMismatch { .. })));
    }
}
