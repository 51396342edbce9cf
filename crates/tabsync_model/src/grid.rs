//! Cell matrices for range-addressed targets.

use serde_json::Value;

/// A rectangular matrix of cell values.
///
/// Rows shorter than the widest row are padded with nulls on construction,
/// so every row has the same width from then on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    rows: Vec<Vec<Value>>,
    width: usize,
}

impl Grid {
    /// Builds a grid from row data, padding short rows with nulls.
    pub fn new(mut rows: Vec<Vec<Value>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, Value::Null);
        }
        Self { rows, width }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn col_count(&self) -> usize {
        self.width
    }

    /// Returns true if the grid holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Borrows the row data.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Extracts a rectangular block as an owned chunk carrying its
    /// absolute offsets.
    ///
    /// # Panics
    ///
    /// Panics if the requested block exceeds the grid bounds.
    pub fn block(
        &self,
        row_offset: usize,
        col_offset: usize,
        row_count: usize,
        col_count: usize,
    ) -> GridChunk {
        let rows = self.rows[row_offset..row_offset + row_count]
            .iter()
            .map(|row| row[col_offset..col_offset + col_count].to_vec())
            .collect();
        GridChunk {
            row_offset,
            col_offset,
            rows,
        }
    }
}

/// A rectangular block of a [`Grid`], bounded by the row and column
/// ceilings, addressed by its absolute zero-based offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct GridChunk {
    /// Absolute row offset of the block's first row.
    pub row_offset: usize,
    /// Absolute column offset of the block's first column.
    pub col_offset: usize,
    /// The block's cell data.
    pub rows: Vec<Vec<Value>>,
}

impl GridChunk {
    /// Number of rows in the block.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the block.
    pub fn col_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// Splits the block in half by row count.
    ///
    /// The first half keeps the block's offsets; the second starts
    /// immediately after it. Returns `None` for blocks of one row or
    /// fewer, which cannot be narrowed further.
    pub fn split(self) -> Option<(GridChunk, GridChunk)> {
        let rows = self.row_count();
        if rows <= 1 {
            return None;
        }
        let mid = rows / 2;
        let mut first_rows = self.rows;
        let second_rows = first_rows.split_off(mid);
        Some((
            GridChunk {
                row_offset: self.row_offset,
                col_offset: self.col_offset,
                rows: first_rows,
            },
            GridChunk {
                row_offset: self.row_offset + mid,
                col_offset: self.col_offset,
                rows: second_rows,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grid_3x3() -> Grid {
        Grid::new(vec![
            vec![json!(1), json!(2), json!(3)],
            vec![json!(4), json!(5), json!(6)],
            vec![json!(7), json!(8), json!(9)],
        ])
    }

    #[test]
    fn short_rows_are_padded() {
        let grid = Grid::new(vec![vec![json!("a"), json!("b")], vec![json!("c")]]);
        assert_eq!(grid.col_count(), 2);
        assert_eq!(grid.rows()[1][1], Value::Null);
    }

    #[test]
    fn block_extraction() {
        let grid = grid_3x3();
        let block = grid.block(1, 1, 2, 2);
        assert_eq!(block.row_offset, 1);
        assert_eq!(block.col_offset, 1);
        assert_eq!(block.rows, vec![vec![json!(5), json!(6)], vec![json!(8), json!(9)]]);
    }

    #[test]
    fn split_keeps_column_offset() {
        let grid = grid_3x3();
        let block = grid.block(0, 1, 3, 2);
        let (a, b) = block.split().unwrap();
        assert_eq!(a.row_offset, 0);
        assert_eq!(a.row_count(), 1);
        assert_eq!(b.row_offset, 1);
        assert_eq!(b.row_count(), 2);
        assert_eq!(a.col_offset, 1);
        assert_eq!(b.col_offset, 1);
    }

    #[test]
    fn one_row_block_cannot_split() {
        let grid = grid_3x3();
        assert!(grid.block(2, 0, 1, 3).split().is_none());
    }
}
