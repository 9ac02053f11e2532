//! One-hot encoding of imputed categorical tables.

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::error::FeatureError;
use crate::table::{Category, ImputedTable, OneHotMatrix, Rows};

/// A fitted one-hot encoder.
///
/// Each column's categories are sorted ascending and laid out contiguously,
/// columns in table order, so the encoded width is the sum of the distinct
/// category counts. A category not seen at fit time activates nothing for
/// its column.
#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    categories: Vec<Vec<Category>>,
    offsets: Vec<usize>,
    lookup: Vec<HashMap<Category, usize>>,
    width: usize,
}

impl OneHotEncoder {
    /// Learn the category vocabulary of every column.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::EmptyTable`] if `table` has zero rows.
    #[instrument(skip_all, fields(n_rows = table.n_rows(), n_columns = table.n_columns()))]
    pub fn fit(table: &ImputedTable) -> Result<Self, FeatureError> {
        if table.n_rows() == 0 {
            return Err(FeatureError::EmptyTable);
        }

        let mut categories = Vec::with_capacity(table.n_columns());
        let mut offsets = Vec::with_capacity(table.n_columns());
        let mut lookup = Vec::with_capacity(table.n_columns());
        let mut width = 0usize;

        for col in 0..table.n_columns() {
            let mut seen: Vec<Category> = table.rows().iter().map(|row| row[col]).collect();
            seen.sort_unstable();
            seen.dedup();

            offsets.push(width);
            lookup.push(
                seen.iter()
                    .enumerate()
                    .map(|(i, &category)| (category, width + i))
                    .collect(),
            );
            width += seen.len();
            categories.push(seen);
        }

        debug!(width, "one-hot encoder fitted");

        Ok(Self {
            columns: table.columns().to_vec(),
            categories,
            offsets,
            lookup,
            width,
        })
    }

    /// Encode a table into a sparse indicator matrix.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::SchemaMismatch`] when `table`'s columns differ
    /// from the columns seen at fit time.
    pub fn transform(&self, table: &ImputedTable) -> Result<OneHotMatrix, FeatureError> {
        if table.columns() != self.columns.as_slice() {
            return Err(FeatureError::SchemaMismatch {
                expected: self.columns.clone(),
                got: table.columns().to_vec(),
            });
        }

        let mut n_unseen = 0usize;
        let rows: Vec<Vec<usize>> = table
            .rows()
            .iter()
            .map(|row| {
                // Offsets grow with column order, so pushing in column order
                // keeps each row sorted.
                row.iter()
                    .zip(&self.lookup)
                    .filter_map(|(category, map)| {
                        let hit = map.get(category).copied();
                        if hit.is_none() {
                            n_unseen += 1;
                        }
                        hit
                    })
                    .collect()
            })
            .collect();

        if n_unseen > 0 {
            debug!(n_unseen, "unseen categories encoded as all-zero");
        }

        Ok(OneHotMatrix::from_sorted(self.width, rows))
    }

    /// Return the encoded width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Return the sorted categories of each column.
    #[must_use]
    pub fn categories(&self) -> &[Vec<Category>] {
        &self.categories
    }

    /// Return the first encoded index of each column.
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Return one `"{COLUMN}_{code}"` name per encoded column.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(name, cats)| cats.iter().map(move |c| format!("{name}_{c}")))
            .collect()
    }
}
