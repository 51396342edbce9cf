//! Local tabular datasets.

use crate::grid::Grid;
use crate::record::RecordPayload;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while assembling a [`Table`].
#[derive(Debug, Error)]
pub enum TableError {
    /// A row's cell count does not match the table's column count.
    #[error("row {row} has {got} cells, expected {expected}")]
    ArityMismatch {
        /// Zero-based index of the offending row.
        row: usize,
        /// Expected cell count (the column count).
        expected: usize,
        /// Actual cell count.
        got: usize,
    },
    /// Two columns share the same name.
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
}

/// A local tabular dataset: a fixed column list plus row-major cells.
///
/// The column set is fixed for the duration of a sync run; rows are
/// read-only snapshots once the table is built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates an empty table with the given column names.
    pub fn new(columns: Vec<String>) -> Result<Self, TableError> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Appends a row; the cell count must match the column count.
    pub fn push_row(&mut self, cells: Vec<Value>) -> Result<(), TableError> {
        if cells.len() != self.columns.len() {
            return Err(TableError::ArityMismatch {
                row: self.rows.len(),
                expected: self.columns.len(),
                got: cells.len(),
            });
        }
        self.rows.push(cells);
        Ok(())
    }

    /// Column names, in dataset order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The cell at (`row`, `col`), if in bounds.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Borrows one row's cells.
    pub fn row(&self, row: usize) -> Option<&[Value]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// Builds the column → value payload for one row, skipping null cells
    /// (the remote service treats absent and null identically, and omitting
    /// them keeps request payloads small).
    pub fn row_payload(&self, row: usize) -> Option<RecordPayload> {
        let cells = self.rows.get(row)?;
        let mut payload = RecordPayload::new();
        for (name, value) in self.columns.iter().zip(cells) {
            if !value.is_null() {
                payload.insert(name.clone(), value.clone());
            }
        }
        Some(payload)
    }

    /// Converts the table to a grid, optionally with the column names as
    /// the first row (range-addressed targets carry their header in-band).
    pub fn to_grid(&self, include_header: bool) -> Grid {
        let mut rows = Vec::with_capacity(self.rows.len() + usize::from(include_header));
        if include_header {
            rows.push(
                self.columns
                    .iter()
                    .map(|c| Value::String(c.clone()))
                    .collect(),
            );
        }
        rows.extend(self.rows.iter().cloned());
        Grid::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        let mut table = Table::new(vec!["id".into(), "name".into(), "score".into()]).unwrap();
        table
            .push_row(vec![json!(1), json!("ada"), json!(92.5)])
            .unwrap();
        table
            .push_row(vec![json!(2), json!("grace"), Value::Null])
            .unwrap();
        table
    }

    #[test]
    fn arity_is_enforced() {
        let mut table = Table::new(vec!["a".into(), "b".into()]).unwrap();
        let err = table.push_row(vec![json!(1)]).unwrap_err();
        assert!(matches!(
            err,
            TableError::ArityMismatch {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_columns_rejected() {
        assert!(Table::new(vec!["x".into(), "x".into()]).is_err());
    }

    #[test]
    fn row_payload_skips_nulls() {
        let table = sample();
        let payload = table.row_payload(1).unwrap();
        assert_eq!(payload.len(), 2);
        assert!(!payload.contains_key("score"));
    }

    #[test]
    fn grid_conversion_with_header() {
        let table = sample();
        let grid = table.to_grid(true);
        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.rows()[0][0], json!("id"));

        let bare = table.to_grid(false);
        assert_eq!(bare.row_count(), 2);
    }
}
