//! The two preprocessing variants: one-hot for linear and tree models,
//! imputed pass-through for models with native categorical support.

use tracing::{info, instrument};

use crate::error::FeatureError;
use crate::impute::{FittedImputer, MostFrequentImputer};
use crate::onehot::OneHotEncoder;
use crate::table::{CategoricalTable, ImputedTable, OneHotMatrix, Rows};

/// An unfitted preprocessor.
pub trait Preprocessor: Send + Sync {
    /// The fitted form of this preprocessor.
    type Fitted: FittedPreprocessor;

    /// Fit on raw training rows.
    ///
    /// # Errors
    ///
    /// Returns a [`FeatureError`] when the table cannot be fitted on.
    fn fit(&self, table: &CategoricalTable) -> Result<Self::Fitted, FeatureError>;
}

/// A fitted preprocessor that maps raw tables into a model representation.
pub trait FittedPreprocessor: Send + Sync {
    /// The representation produced for downstream models.
    type Output: Rows + Send + Sync;

    /// Transform raw rows using the fitted state.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::SchemaMismatch`] when the table's columns differ
    /// from those seen at fit time.
    fn transform(&self, table: &CategoricalTable) -> Result<Self::Output, FeatureError>;

    /// Return one name per output feature.
    fn feature_names(&self) -> Vec<String>;
}

/// Most-frequent imputation followed by one-hot encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneHotPreprocessor;

impl OneHotPreprocessor {
    /// Create a new one-hot preprocessor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// A fitted [`OneHotPreprocessor`].
#[derive(Debug, Clone)]
pub struct FittedOneHot {
    imputer: FittedImputer,
    encoder: OneHotEncoder,
}

impl FittedOneHot {
    /// Return the fitted imputer.
    #[must_use]
    pub fn imputer(&self) -> &FittedImputer {
        &self.imputer
    }

    /// Return the fitted encoder.
    #[must_use]
    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }
}

impl Preprocessor for OneHotPreprocessor {
    type Fitted = FittedOneHot;

    #[instrument(skip_all, fields(n_rows = table.n_rows()))]
    fn fit(&self, table: &CategoricalTable) -> Result<FittedOneHot, FeatureError> {
        let imputer = MostFrequentImputer::new().fit(table)?;
        let encoder = OneHotEncoder::fit(&imputer.transform(table)?)?;
        info!(width = encoder.width(), "one-hot preprocessor fitted");
        Ok(FittedOneHot { imputer, encoder })
    }
}

impl FittedPreprocessor for FittedOneHot {
    type Output = OneHotMatrix;

    fn transform(&self, table: &CategoricalTable) -> Result<OneHotMatrix, FeatureError> {
        self.encoder.transform(&self.imputer.transform(table)?)
    }

    fn feature_names(&self) -> Vec<String> {
        self.encoder.feature_names()
    }
}

/// Most-frequent imputation only; categories pass through unencoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImputingPreprocessor;

impl ImputingPreprocessor {
    /// Create a new imputing preprocessor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Preprocessor for ImputingPreprocessor {
    type Fitted = FittedImputer;

    fn fit(&self, table: &CategoricalTable) -> Result<FittedImputer, FeatureError> {
        MostFrequentImputer::new().fit(table)
    }
}

impl FittedPreprocessor for FittedImputer {
    type Output = ImputedTable;

    fn transform(&self, table: &CategoricalTable) -> Result<ImputedTable, FeatureError> {
        FittedImputer::transform(self, table)
    }

    fn feature_names(&self) -> Vec<String> {
        self.columns().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Category;

    fn c(code: i64) -> Option<Category> {
        Some(Category::new(code))
    }

    fn train() -> CategoricalTable {
        CategoricalTable::new(
            vec!["RESOURCE".into(), "MGR_ID".into()],
            vec![
                vec![c(100), c(1)],
                vec![c(200), None],
                vec![c(100), c(1)],
                vec![None, c(2)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn both_variants_fit_on_same_rows_agree_on_fill() {
        let t = train();
        let onehot = OneHotPreprocessor::new().fit(&t).unwrap();
        let imputing = ImputingPreprocessor::new().fit(&t).unwrap();
        assert_eq!(onehot.imputer(), &imputing);
        assert_eq!(onehot.feature_names().len(), onehot.encoder().width());
        assert_eq!(imputing.feature_names(), vec!["RESOURCE", "MGR_ID"]);
    }

    #[test]
    fn onehot_transform_width_matches_encoder() {
        let t = train();
        let fitted = OneHotPreprocessor::new().fit(&t).unwrap();
        let m = fitted.transform(&t).unwrap();
        assert_eq!(m.n_columns(), 4);
        assert_eq!(m.n_rows(), 4);
        // Missing RESOURCE imputed to 100, so row 3 activates RESOURCE_100.
        assert!(m.is_active(3, 0));
        for row in m.rows() {
            assert_eq!(row.len(), 2);
        }
    }

    #[test]
    fn imputing_passes_unseen_through() {
        let t = train();
        let fitted = ImputingPreprocessor::new().fit(&t).unwrap();
        let test =
            CategoricalTable::new(vec!["RESOURCE".into(), "MGR_ID".into()], vec![vec![c(999), None]])
                .unwrap();
        let out = FittedPreprocessor::transform(&fitted, &test).unwrap();
        assert_eq!(out.row(0), &[Category::new(999), Category::new(1)]);
    }
}
