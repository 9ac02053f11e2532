//! Categorical feature handling for access-grant prediction.
//!
//! Pure data library with no I/O. Provides the raw categorical table, the
//! most-frequent imputer, the one-hot encoder, the two preprocessors built
//! from them, and the stratified train/test splitter.

mod error;
mod impute;
mod onehot;
mod preprocess;
mod split;
mod table;

pub use error::FeatureError;
pub use impute::{FittedImputer, MostFrequentImputer};
pub use onehot::OneHotEncoder;
pub use preprocess::{
    FittedOneHot, FittedPreprocessor, ImputingPreprocessor, OneHotPreprocessor, Preprocessor,
};
pub use split::{StratifiedSplit, TrainTestSplit};
pub use table::{CategoricalTable, Category, ImputedTable, OneHotMatrix, Rows};

/// Names of the categorical attribute columns, in file order.
pub const FEATURE_COLUMNS: [&str; 9] = [
    "RESOURCE",
    "MGR_ID",
    "ROLE_ROLLUP_1",
    "ROLE_ROLLUP_2",
    "ROLE_DEPTNAME",
    "ROLE_TITLE",
    "ROLE_FAMILY_DESC",
    "ROLE_FAMILY",
    "ROLE_CODE",
];
