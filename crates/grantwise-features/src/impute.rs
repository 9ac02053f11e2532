//! Most-frequent imputation of missing categorical cells.

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::error::FeatureError;
use crate::table::{CategoricalTable, Category, ImputedTable, Rows};

/// Imputer that fills missing cells with each column's mode.
///
/// Ties are broken towards the smallest category code.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostFrequentImputer;

impl MostFrequentImputer {
    /// Create a new imputer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Learn the fill value of every column.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::EmptyTable`] | `table` has zero rows |
    /// | [`FeatureError::AllMissing`] | a column has no observed value |
    #[instrument(skip_all, fields(n_rows = table.n_rows(), n_columns = table.n_columns()))]
    pub fn fit(&self, table: &CategoricalTable) -> Result<FittedImputer, FeatureError> {
        if table.n_rows() == 0 {
            return Err(FeatureError::EmptyTable);
        }

        let fill = table
            .columns()
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let mut counts: HashMap<Category, usize> = HashMap::new();
                for cell in table.rows().iter().filter_map(|row| row[col]) {
                    *counts.entry(cell).or_insert(0) += 1;
                }
                counts
                    .into_iter()
                    .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
                    .map(|(category, _)| category)
                    .ok_or_else(|| FeatureError::AllMissing {
                        column: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(n_missing = table.n_missing(), "imputer fitted");

        Ok(FittedImputer {
            columns: table.columns().to_vec(),
            fill,
        })
    }
}

/// A fitted imputer holding one fill value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedImputer {
    columns: Vec<String>,
    fill: Vec<Category>,
}

impl FittedImputer {
    /// Replace every missing cell with its column's fill value.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::SchemaMismatch`] when `table`'s columns differ
    /// from the columns seen at fit time.
    pub fn transform(&self, table: &CategoricalTable) -> Result<ImputedTable, FeatureError> {
        if table.columns() != self.columns.as_slice() {
            return Err(FeatureError::SchemaMismatch {
                expected: self.columns.clone(),
                got: table.columns().to_vec(),
            });
        }
        let rows = table
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.fill)
                    .map(|(cell, &fill)| cell.unwrap_or(fill))
                    .collect()
            })
            .collect();
        Ok(ImputedTable::new(self.columns.clone(), rows))
    }

    /// Return the fill value per column.
    #[must_use]
    pub fn fill_values(&self) -> &[Category] {
        &self.fill
    }

    /// Return the column names seen at fit time.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}
