//! Domain types for grantwise-io.

use grantwise_features::{CategoricalTable, Rows};

use crate::IoError;

/// The external identifier of one prediction request.
///
/// Wraps the non-empty string from the `id` column of the request file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new record ID from a non-empty string.
    pub(crate) fn new(id: String) -> Self {
        debug_assert!(!id.is_empty(), "record ID must not be empty");
        Self(id)
    }

    /// Return the record ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Labelled historical access decisions.
///
/// Produced by [`TrainingReader`](crate::TrainingReader); `labels[i]` is the
/// decision for row `i` of `table` (`true` = granted).
#[derive(Debug, Clone)]
pub struct TrainingSet {
    /// Role-attribute cells, one row per record.
    pub table: CategoricalTable,
    /// Decisions in row order.
    pub labels: Vec<bool>,
}

impl TrainingSet {
    /// Return the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Return whether there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Return the fraction of granted records.
    #[must_use]
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&l| l).count() as f64 / self.labels.len() as f64
    }

    /// Copy the given rows into a new set.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            table: self.table.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Unlabelled access requests keyed by external id.
///
/// Produced by [`RequestReader`](crate::RequestReader); `ids[i]` names row
/// `i` of `table`.
#[derive(Debug, Clone)]
pub struct RequestSet {
    /// Request identifiers in file order.
    pub ids: Vec<RecordId>,
    /// Role-attribute cells, one row per request.
    pub table: CategoricalTable,
}
