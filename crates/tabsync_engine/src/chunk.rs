//! Chunk planning: slicing operation batches and grids under the static
//! row/column ceilings.

use tabsync_model::{Grid, GridChunk, RecordBatch, RecordChunk};

/// Lazily yields row-ceiling-bounded chunks of a record batch.
///
/// Record-oriented targets have no column ceiling; partitioning is strictly
/// by row count. Chunks carry their absolute offset into the batch.
pub struct RecordChunkPlan<'a> {
    batch: &'a RecordBatch,
    ceiling: usize,
    offset: usize,
}

impl<'a> RecordChunkPlan<'a> {
    /// Plans chunks of at most `row_ceiling` operations each.
    pub fn new(batch: &'a RecordBatch, row_ceiling: usize) -> Self {
        Self {
            batch,
            ceiling: row_ceiling.max(1),
            offset: 0,
        }
    }
}

impl<'a> Iterator for RecordChunkPlan<'a> {
    type Item = RecordChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.batch.len().saturating_sub(self.offset);
        if remaining == 0 {
            return None;
        }
        let len = remaining.min(self.ceiling);
        let chunk = self.batch.chunk(self.offset, len);
        self.offset += len;
        Some(chunk)
    }
}

/// Lazily yields blocks of a grid under both ceilings.
///
/// The full column span is partitioned into groups of at most
/// `col_ceiling`, then rows within each group into runs of at most
/// `row_ceiling`: column-major outer loop, row-major inner loop, so a wide
/// dataset is column-sliced before row-sliced. Blocks carry absolute
/// offsets so the writer can address them without extra context.
pub struct GridChunkPlan<'a> {
    grid: &'a Grid,
    row_ceiling: usize,
    col_ceiling: usize,
    col_offset: usize,
    row_offset: usize,
}

impl<'a> GridChunkPlan<'a> {
    /// Plans blocks of at most `row_ceiling` × `col_ceiling` cells.
    pub fn new(grid: &'a Grid, row_ceiling: usize, col_ceiling: usize) -> Self {
        Self {
            grid,
            row_ceiling: row_ceiling.max(1),
            col_ceiling: col_ceiling.max(1),
            col_offset: 0,
            row_offset: 0,
        }
    }
}

impl Iterator for GridChunkPlan<'_> {
    type Item = GridChunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.grid.is_empty() || self.col_offset >= self.grid.col_count() {
            return None;
        }

        let col_count = (self.grid.col_count() - self.col_offset).min(self.col_ceiling);
        let row_count = (self.grid.row_count() - self.row_offset).min(self.row_ceiling);
        let block = self
            .grid
            .block(self.row_offset, self.col_offset, row_count, col_count);

        self.row_offset += row_count;
        if self.row_offset >= self.grid.row_count() {
            self.row_offset = 0;
            self.col_offset += col_count;
        }

        Some(block)
    }
}

/// Lazily yields append blocks: row-chunked only, full width.
///
/// Pure inserts carry no caller-specified position, so there is no column
/// ceiling to honor; the remote service locates the insertion point. The
/// `row_offset` of each block is its offset within the appended row set.
pub struct AppendChunkPlan<'a> {
    grid: &'a Grid,
    ceiling: usize,
    row_offset: usize,
}

impl<'a> AppendChunkPlan<'a> {
    /// Plans append blocks of at most `row_ceiling` rows each.
    pub fn new(grid: &'a Grid, row_ceiling: usize) -> Self {
        Self {
            grid,
            ceiling: row_ceiling.max(1),
            row_offset: 0,
        }
    }
}

impl Iterator for AppendChunkPlan<'_> {
    type Item = GridChunk;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.grid.row_count().saturating_sub(self.row_offset);
        if remaining == 0 {
            return None;
        }
        let rows = remaining.min(self.ceiling);
        let block = self
            .grid
            .block(self.row_offset, 0, rows, self.grid.col_count());
        self.row_offset += rows;
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use tabsync_model::{RecordId, RecordSlice};

    fn delete_batch(n: usize) -> RecordBatch {
        RecordBatch::Delete((0..n).map(|i| RecordId::new(format!("r{i}"))).collect())
    }

    fn grid(rows: usize, cols: usize) -> Grid {
        Grid::new(
            (0..rows)
                .map(|r| (0..cols).map(|c| json!(r * cols + c)).collect())
                .collect(),
        )
    }

    #[test]
    fn record_chunk_count_is_ceil() {
        let batch = delete_batch(10);
        assert_eq!(RecordChunkPlan::new(&batch, 3).count(), 4);
        assert_eq!(RecordChunkPlan::new(&batch, 10).count(), 1);
        assert_eq!(RecordChunkPlan::new(&batch, 500).count(), 1);
    }

    #[test]
    fn empty_batch_yields_nothing() {
        let batch = delete_batch(0);
        assert_eq!(RecordChunkPlan::new(&batch, 3).count(), 0);
    }

    #[test]
    fn grid_plan_is_column_major() {
        let grid = grid(5, 5);
        let blocks: Vec<_> = GridChunkPlan::new(&grid, 2, 3).collect();
        let offsets: Vec<_> = blocks.iter().map(|b| (b.row_offset, b.col_offset)).collect();
        // Column group [0..3) first, rows 0/2/4; then column group [3..5).
        assert_eq!(
            offsets,
            vec![(0, 0), (2, 0), (4, 0), (0, 3), (2, 3), (4, 3)]
        );
        assert_eq!(blocks[0].col_count(), 3);
        assert_eq!(blocks[3].col_count(), 2);
        assert_eq!(blocks[2].row_count(), 1);
    }

    #[test]
    fn append_plan_keeps_full_width() {
        let grid = grid(7, 4);
        let blocks: Vec<_> = AppendChunkPlan::new(&grid, 3).collect();
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.col_count() == 4));
        assert_eq!(blocks[2].row_count(), 1);
        assert_eq!(blocks[2].row_offset, 6);
    }

    proptest! {
        /// Round-trip law: chunk count is ceil(N/R) and concatenating the
        /// chunks in order reproduces the batch exactly.
        #[test]
        fn record_chunks_round_trip(n in 0usize..200, ceiling in 1usize..50) {
            let batch = delete_batch(n);
            let chunks: Vec<_> = RecordChunkPlan::new(&batch, ceiling).collect();

            prop_assert_eq!(chunks.len(), n.div_ceil(ceiling));

            let mut rebuilt = Vec::new();
            for chunk in &chunks {
                prop_assert!(chunk.row_count() >= 1);
                prop_assert!(chunk.row_count() <= ceiling);
                prop_assert_eq!(chunk.offset, rebuilt.len());
                match chunk.slice {
                    RecordSlice::Delete(ids) => rebuilt.extend(ids.iter().cloned()),
                    _ => prop_assert!(false, "unexpected chunk kind"),
                }
            }
            let original: Vec<_> = (0..n).map(|i| RecordId::new(format!("r{i}"))).collect();
            prop_assert_eq!(rebuilt, original);
        }

        /// Every grid cell appears in exactly one block, and blocks honor
        /// both ceilings.
        #[test]
        fn grid_blocks_cover_exactly(
            rows in 1usize..30,
            cols in 1usize..20,
            row_ceiling in 1usize..10,
            col_ceiling in 1usize..8,
        ) {
            let grid = grid(rows, cols);
            let mut seen = vec![vec![0u8; cols]; rows];
            for block in GridChunkPlan::new(&grid, row_ceiling, col_ceiling) {
                prop_assert!(block.row_count() <= row_ceiling);
                prop_assert!(block.col_count() <= col_ceiling);
                for (r, row) in block.rows.iter().enumerate() {
                    for (c, value) in row.iter().enumerate() {
                        let abs_r = block.row_offset + r;
                        let abs_c = block.col_offset + c;
                        prop_assert_eq!(value, &json!(abs_r * cols + abs_c));
                        seen[abs_r][abs_c] += 1;
                    }
                }
            }
            prop_assert!(seen.iter().flatten().all(|&count| count == 1));
        }
    }
}
