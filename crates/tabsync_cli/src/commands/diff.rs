//! Diff command implementation: compare local data against the store.

use crate::dataset::load_table;
use crate::store::FileStore;
use std::path::Path;
use std::sync::Arc;
use tabsync_engine::SyncEngine;

/// Prints per-column mismatch counts between the input and the store.
pub fn run(
    profile: &Path,
    input: &Path,
    store_path: &Path,
    page_size: usize,
    tolerance: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = super::load_options(profile)?;
    let table = load_table(input)?;
    let store = Arc::new(FileStore::open(store_path, page_size)?);

    let engine = SyncEngine::new(options, store.clone(), store.clone());
    let report = engine.diff(&table, tolerance)?;

    println!(
        "compared {} row pair(s), tolerance {tolerance}",
        report.rows_compared
    );
    for column in &report.columns {
        println!(
            "  {}: {}/{} mismatched",
            column.column, column.mismatches, column.compared
        );
    }
    println!("total mismatches: {}", report.total_mismatches());
    Ok(())
}
