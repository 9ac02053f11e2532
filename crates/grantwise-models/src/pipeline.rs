//! A preprocessor bound to the estimator that consumes its output.

use grantwise_features::{CategoricalTable, FittedPreprocessor, Preprocessor, Rows};
use tracing::{debug, instrument};

use crate::error::ModelError;
use crate::estimator::{Estimator, FeatureImportance, Model};
use crate::importance::{RankedFeature, rank_features};

/// An unfitted preprocessor + estimator pair over raw categorical tables.
///
/// The estimator's input type is the preprocessor's output type, so pairing
/// a one-hot model with the pass-through preprocessor does not compile.
#[derive(Debug, Clone)]
pub struct Pipeline<P, E> {
    preprocessor: P,
    estimator: E,
}

impl<P, E> Pipeline<P, E> {
    /// Bind `preprocessor` to `estimator`.
    #[must_use]
    pub fn new(preprocessor: P, estimator: E) -> Self {
        Self {
            preprocessor,
            estimator,
        }
    }

    /// Return the preprocessor.
    #[must_use]
    pub fn preprocessor(&self) -> &P {
        &self.preprocessor
    }

    /// Return the estimator.
    #[must_use]
    pub fn estimator(&self) -> &E {
        &self.estimator
    }
}

impl<P, E> Estimator<CategoricalTable> for Pipeline<P, E>
where
    P: Preprocessor,
    E: Estimator<<P::Fitted as FittedPreprocessor>::Output>,
{
    type Model = FittedPipeline<P::Fitted, E::Model>;

    /// Fit the preprocessor on `table`, then the estimator on its output.
    #[instrument(skip_all, fields(n_rows = table.n_rows()))]
    fn fit(&self, table: &CategoricalTable, labels: &[bool]) -> Result<Self::Model, ModelError> {
        let preprocessor = self.preprocessor.fit(table)?;
        let x = preprocessor.transform(table)?;
        debug!(n_rows = x.n_rows(), "training rows preprocessed");
        let model = self.estimator.fit(&x, labels)?;
        Ok(FittedPipeline {
            preprocessor,
            model,
        })
    }
}

/// A fitted preprocessor and the model trained on its output.
#[derive(Debug, Clone)]
pub struct FittedPipeline<F, M> {
    preprocessor: F,
    model: M,
}

impl<F, M> FittedPipeline<F, M> {
    /// Return the fitted preprocessor.
    #[must_use]
    pub fn preprocessor(&self) -> &F {
        &self.preprocessor
    }

    /// Return the fitted model.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<F, M> FittedPipeline<F, M>
where
    F: FittedPreprocessor,
    M: FeatureImportance,
{
    /// Pair each model feature with its preprocessor name, ranked descending.
    #[must_use]
    pub fn ranked_importances(&self) -> Vec<RankedFeature> {
        rank_features(
            &self.preprocessor.feature_names(),
            &self.model.feature_importances(),
        )
    }
}

impl<F, M> Model<CategoricalTable> for FittedPipeline<F, M>
where
    F: FittedPreprocessor,
    M: Model<F::Output>,
{
    fn predict_proba(&self, table: &CategoricalTable) -> Result<Vec<f64>, ModelError> {
        let x = self.preprocessor.transform(table)?;
        self.model.predict_proba(&x)
    }
}
