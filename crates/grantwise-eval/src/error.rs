use grantwise_models::ModelError;

/// Errors from metric computation and cross-validation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Returned when a metric receives zero rows.
    #[error("cannot score an empty set of predictions")]
    EmptyInput,

    /// Returned when labels and scores (or predictions) differ in length.
    #[error("got {n_labels} labels but {n_scores} scores")]
    LengthMismatch {
        /// Number of labels.
        n_labels: usize,
        /// Number of scores or predictions.
        n_scores: usize,
    },

    /// Returned when a dataset has a different number of labels than rows.
    #[error("got {n_labels} labels for {n_rows} rows")]
    LabelCountMismatch {
        /// Number of dataset rows.
        n_rows: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when ROC-AUC is requested for labels of a single class.
    #[error("ROC-AUC is undefined when every label is {class}")]
    SingleClass {
        /// The only class present.
        class: bool,
    },

    /// Returned when fewer than two folds are requested.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// The invalid fold count.
        n_folds: usize,
    },

    /// Returned when there are fewer rows than folds.
    #[error("cannot split {n_rows} rows into {n_folds} folds")]
    TooFewRows {
        /// Number of rows to split.
        n_rows: usize,
        /// Requested fold count.
        n_folds: usize,
    },

    /// Returned when stratified folds are requested but a class is too small.
    #[error("class {class} has {count} rows, fewer than {n_folds} folds")]
    TooFewSamplesForFolds {
        /// The under-populated class.
        class: bool,
        /// Rows in that class.
        count: usize,
        /// Requested fold count.
        n_folds: usize,
    },

    /// Returned when a fold's held-out rows cannot be scored.
    #[error("fold {fold}: {source}")]
    Fold {
        /// Zero-based fold index.
        fold: usize,
        /// The metric or model failure.
        #[source]
        source: Box<EvalError>,
    },

    /// Wraps a training or prediction failure.
    #[error(transparent)]
    Model(#[from] ModelError),
}
