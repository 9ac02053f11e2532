//! Error types for table construction, preprocessing and splitting.

/// Errors from categorical tables, preprocessors and the stratified splitter.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// Returned when a table is built with zero columns.
    #[error("table must have at least one column")]
    NoColumns,

    /// Returned when a row has a different number of cells than there are columns.
    #[error("row {row_index} has {got} cells, expected {expected}")]
    RowWidthMismatch {
        /// Zero-based index of the offending row.
        row_index: usize,
        /// Number of columns in the table.
        expected: usize,
        /// Number of cells in the row.
        got: usize,
    },

    /// Returned when a one-hot row references a column outside the matrix width.
    #[error("row {row_index} has active index {index}, but the matrix has {n_columns} columns")]
    ActiveIndexOutOfRange {
        /// Zero-based index of the offending row.
        row_index: usize,
        /// The out-of-range column index.
        index: usize,
        /// Width of the matrix.
        n_columns: usize,
    },

    /// Returned when fitting on a table with zero rows.
    #[error("cannot fit on an empty table")]
    EmptyTable,

    /// Returned when a column has no observed value to impute from.
    #[error("column {column} has no observed value")]
    AllMissing {
        /// Name of the column.
        column: String,
    },

    /// Returned when a table's columns differ from those seen at fit time.
    #[error("schema mismatch: fitted on {expected:?}, got {got:?}")]
    SchemaMismatch {
        /// Column names seen at fit time.
        expected: Vec<String>,
        /// Column names of the rejected table.
        got: Vec<String>,
    },

    /// Returned when the test fraction is not in the open interval (0, 1).
    #[error("test fraction must be in (0, 1), got {fraction}")]
    InvalidTestFraction {
        /// The invalid fraction.
        fraction: f64,
    },

    /// Returned when a split would leave the train or test partition empty.
    #[error("split leaves an empty partition: {n_train} train rows, {n_test} test rows")]
    DegenerateSplit {
        /// Rows assigned to train.
        n_train: usize,
        /// Rows assigned to test.
        n_test: usize,
    },
}
