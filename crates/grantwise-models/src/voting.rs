//! Soft-voting ensembles of heterogeneous pipelines.

use grantwise_features::{CategoricalTable, Rows};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::error::ModelError;
use crate::estimator::{Estimator, Model};

/// An estimator over raw tables whose fitted model is type-erased.
///
/// Implemented for every [`Estimator<CategoricalTable>`], so any
/// [`Pipeline`](crate::Pipeline) can join a [`SoftVoting`] ensemble.
pub trait DynEstimator: Send + Sync {
    /// Fit and box the model.
    ///
    /// # Errors
    ///
    /// Propagates the underlying estimator's [`ModelError`].
    fn fit_boxed(
        &self,
        table: &CategoricalTable,
        labels: &[bool],
    ) -> Result<Box<dyn Model<CategoricalTable>>, ModelError>;
}

impl<E> DynEstimator for E
where
    E: Estimator<CategoricalTable>,
    E::Model: 'static,
{
    fn fit_boxed(
        &self,
        table: &CategoricalTable,
        labels: &[bool],
    ) -> Result<Box<dyn Model<CategoricalTable>>, ModelError> {
        Ok(Box::new(self.fit(table, labels)?))
    }
}

/// Unweighted average of member probabilities.
pub struct SoftVoting {
    members: Vec<(String, Box<dyn DynEstimator>)>,
}

impl SoftVoting {
    /// Create an ensemble from named members.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyEnsemble`] when `members` is empty.
    pub fn new(members: Vec<(String, Box<dyn DynEstimator>)>) -> Result<Self, ModelError> {
        if members.is_empty() {
            return Err(ModelError::EmptyEnsemble);
        }
        Ok(Self { members })
    }

    /// Return the member names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl Estimator<CategoricalTable> for SoftVoting {
    type Model = FittedSoftVoting;

    /// Fit every member on the same rows, in parallel.
    #[instrument(skip_all, fields(n_members = self.members.len(), n_rows = table.n_rows()))]
    fn fit(&self, table: &CategoricalTable, labels: &[bool]) -> Result<FittedSoftVoting, ModelError> {
        let members = self
            .members
            .par_iter()
            .map(|(name, estimator)| {
                let model = estimator.fit_boxed(table, labels)?;
                debug!(member = %name, "ensemble member fitted");
                Ok((name.clone(), model))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;
        info!(n_members = members.len(), "soft-voting ensemble fitted");
        Ok(FittedSoftVoting { members })
    }
}

/// A fitted soft-voting ensemble.
pub struct FittedSoftVoting {
    members: Vec<(String, Box<dyn Model<CategoricalTable>>)>,
}

impl FittedSoftVoting {
    /// Return each member's name and positive-class probabilities for `table`.
    ///
    /// # Errors
    ///
    /// Propagates the first member's prediction error.
    pub fn member_probabilities(
        &self,
        table: &CategoricalTable,
    ) -> Result<Vec<(String, Vec<f64>)>, ModelError> {
        self.members
            .par_iter()
            .map(|(name, model)| Ok((name.clone(), model.predict_proba(table)?)))
            .collect()
    }

    /// Return the member names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl Model<CategoricalTable> for FittedSoftVoting {
    fn predict_proba(&self, table: &CategoricalTable) -> Result<Vec<f64>, ModelError> {
        let per_member = self.member_probabilities(table)?;
        let mut mean = vec![0.0; table.n_rows()];
        for (_, probabilities) in &per_member {
            for (m, p) in mean.iter_mut().zip(probabilities) {
                *m += p;
            }
        }
        let n = per_member.len() as f64;
        mean.iter_mut().for_each(|m| *m /= n);
        Ok(mean)
    }
}
