//! Raw and derived feature tables.

use std::fmt;

use crate::error::FeatureError;

/// An integer-coded categorical value.
///
/// Codes carry identity only; their numeric order has no meaning beyond a
/// deterministic tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Category(i64);

impl Category {
    /// Wrap a raw category code.
    #[must_use]
    pub fn new(code: i64) -> Self {
        Self(code)
    }

    /// Return the raw category code.
    #[must_use]
    pub fn code(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row-indexable data that can be subset for cross-validation and splitting.
pub trait Rows {
    /// Return the number of rows.
    fn n_rows(&self) -> usize;

    /// Return a new value holding copies of the given rows, in the given order.
    ///
    /// # Panics
    ///
    /// Panics if any index is `>= n_rows()`.
    #[must_use]
    fn select_rows(&self, indices: &[usize]) -> Self
    where
        Self: Sized;
}

/// A table of categorical cells as read from disk.
///
/// `None` marks a missing cell. Rows are immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<Category>>>,
}

impl CategoricalTable {
    /// Build a table from column names and row-major cells.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::NoColumns`] | `columns` is empty |
    /// | [`FeatureError::RowWidthMismatch`] | a row's length differs from `columns.len()` |
    pub fn new(
        columns: Vec<String>,
        rows: Vec<Vec<Option<Category>>>,
    ) -> Result<Self, FeatureError> {
        if columns.is_empty() {
            return Err(FeatureError::NoColumns);
        }
        if let Some((row_index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(FeatureError::RowWidthMismatch {
                row_index,
                expected: columns.len(),
                got: row.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    /// Return the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Return the rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<Category>>] {
        &self.rows
    }

    /// Return the number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Count the missing cells across the whole table.
    #[must_use]
    pub fn n_missing(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| cell.is_none())
            .count()
    }
}

impl Rows for CategoricalTable {
    fn n_rows(&self) -> usize {
        self.rows.len()
    }

    fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

/// A categorical table with every missing cell filled in.
///
/// Produced by [`FittedImputer::transform`](crate::FittedImputer::transform);
/// the cell type makes a missing value unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub struct ImputedTable {
    columns: Vec<String>,
    rows: Vec<Vec<Category>>,
}

impl ImputedTable {
    pub(crate) fn new(columns: Vec<String>, rows: Vec<Vec<Category>>) -> Self {
        Self { columns, rows }
    }

    /// Return the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Return the rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Category>] {
        &self.rows
    }

    /// Return a single row.
    #[must_use]
    pub fn row(&self, index: usize) -> &[Category] {
        &self.rows[index]
    }

    /// Return the number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }
}

impl Rows for ImputedTable {
    fn n_rows(&self) -> usize {
        self.rows.len()
    }

    fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

/// A sparse binary matrix: each row lists its active (value 1) columns.
///
/// Active indices are stored sorted ascending and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneHotMatrix {
    n_columns: usize,
    rows: Vec<Vec<usize>>,
}

impl OneHotMatrix {
    /// Build a matrix from its width and per-row active column indices.
    ///
    /// Indices are sorted and deduplicated per row.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::ActiveIndexOutOfRange`] if any index is `>= n_columns`.
    pub fn new(n_columns: usize, rows: Vec<Vec<usize>>) -> Result<Self, FeatureError> {
        let mut rows = rows;
        for (row_index, row) in rows.iter_mut().enumerate() {
            row.sort_unstable();
            row.dedup();
            if let Some(&index) = row.last()
                && index >= n_columns
            {
                return Err(FeatureError::ActiveIndexOutOfRange {
                    row_index,
                    index,
                    n_columns,
                });
            }
        }
        Ok(Self { n_columns, rows })
    }

    pub(crate) fn from_sorted(n_columns: usize, rows: Vec<Vec<usize>>) -> Self {
        Self { n_columns, rows }
    }

    /// Return the active column indices of one row.
    #[must_use]
    pub fn row(&self, index: usize) -> &[usize] {
        &self.rows[index]
    }

    /// Return all rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    /// Return the matrix width (number of indicator columns).
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    /// Return the total number of active cells.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Return whether a given cell is active.
    #[must_use]
    pub fn is_active(&self, row: usize, column: usize) -> bool {
        self.rows[row].binary_search(&column).is_ok()
    }
}

impl Rows for OneHotMatrix {
    fn n_rows(&self) -> usize {
        self.rows.len()
    }

    fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            n_columns: self.n_columns,
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(code: i64) -> Option<Category> {
        Some(Category::new(code))
    }

    #[test]
    fn table_rejects_ragged_rows() {
        let err = CategoricalTable::new(
            vec!["A".into(), "B".into()],
            vec![vec![c(1), c(2)], vec![c(3)]],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FeatureError::RowWidthMismatch { row_index: 1, expected: 2, got: 1 }
        ));
    }

    #[test]
    fn table_rejects_no_columns() {
        let err = CategoricalTable::new(vec![], vec![]).unwrap_err();
        assert!(matches!(err, FeatureError::NoColumns));
    }

    #[test]
    fn select_rows_preserves_order() {
        let table = CategoricalTable::new(
            vec!["A".into()],
            vec![vec![c(10)], vec![c(20)], vec![None]],
        )
        .unwrap();
        let subset = table.select_rows(&[2, 0]);
        assert_eq!(subset.n_rows(), 2);
        assert_eq!(subset.rows()[0], vec![None]);
        assert_eq!(subset.rows()[1], vec![c(10)]);
        assert_eq!(table.n_missing(), 1);
    }

    #[test]
    fn onehot_matrix_sorts_and_dedups() {
        let m = OneHotMatrix::new(5, vec![vec![4, 1, 1], vec![]]).unwrap();
        assert_eq!(m.row(0), &[1, 4]);
        assert!(m.is_active(0, 4));
        assert!(!m.is_active(1, 0));
        assert_eq!(m.nnz(), 2);
    }

    #[test]
    fn onehot_matrix_rejects_out_of_range() {
        let err = OneHotMatrix::new(3, vec![vec![0], vec![3]]).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::ActiveIndexOutOfRange { row_index: 1, index: 3, n_columns: 3 }
        ));
    }

    #[test]
    fn category_display() {
        assert_eq!(format!("{}", Category::new(-7)), "-7");
    }
}
