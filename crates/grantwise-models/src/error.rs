use grantwise_features::FeatureError;

/// Errors from classifier training and prediction.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Returned when n_trees (or boosting rounds) is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid count provided.
        n_trees: usize,
    },

    /// Returned when max_depth is zero or exceeds the supported limit.
    #[error("max_depth must be in [1, {limit}], got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
        /// The largest supported depth.
        limit: usize,
    },

    /// Returned when min_samples_split is less than 2.
    #[error("min_samples_split must be at least 2, got {min_samples_split}")]
    InvalidMinSamplesSplit {
        /// The invalid min_samples_split value provided.
        min_samples_split: usize,
    },

    /// Returned when min_samples_leaf is zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// The invalid min_samples_leaf value provided.
        min_samples_leaf: usize,
    },

    /// Returned when max_features resolves to 0 or exceeds n_features.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// The resolved max_features value.
        max_features: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when a real-valued hyperparameter is outside its valid range.
    #[error("{name} must be {requirement}, got {value}")]
    InvalidParameter {
        /// Name of the hyperparameter.
        name: &'static str,
        /// Human-readable valid range.
        requirement: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Returned when the border count is zero or above 255.
    #[error("border_count must be in [1, 255], got {border_count}")]
    InvalidBorderCount {
        /// The invalid border count.
        border_count: usize,
    },

    /// Returned when the training set has zero rows.
    #[error("training dataset is empty")]
    EmptyDataset,

    /// Returned when the training set has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when the label count differs from the row count.
    #[error("got {n_labels} labels for {n_rows} rows")]
    LabelCountMismatch {
        /// Number of feature rows.
        n_rows: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when every training label is the same class.
    #[error("training labels contain a single class (all {class})")]
    SingleClass {
        /// The only class present.
        class: bool,
    },

    /// Returned when prediction input has a different width than the training input.
    #[error("prediction input has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The width seen at fit time.
        expected: usize,
        /// The width of the prediction input.
        got: usize,
    },

    /// Returned when an ensemble is built without members.
    #[error("soft-voting ensemble needs at least one member")]
    EmptyEnsemble,

    /// Wraps a preprocessing error raised inside a pipeline.
    #[error("preprocessing failed: {0}")]
    Feature(#[from] FeatureError),
}
