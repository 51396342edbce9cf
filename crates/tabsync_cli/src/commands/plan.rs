//! Plan command implementation: show what a sync would do, touch nothing.

use crate::dataset::load_table;
use crate::store::FileStore;
use std::path::Path;
use std::sync::Arc;
use tabsync_engine::SyncEngine;

/// Prints the operation plan a sync would dispatch.
pub fn run(
    profile: &Path,
    input: &Path,
    store_path: &Path,
    page_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = super::load_options(profile)?;
    let table = load_table(input)?;
    let store = Arc::new(FileStore::open(store_path, page_size)?);

    let engine = SyncEngine::new(options, store.clone(), store.clone());
    let plan = engine.plan(&table)?;

    println!(
        "plan ({} local rows against {} remote records):",
        table.row_count(),
        store.len()
    );
    println!("  deletes: {}", plan.deletes.len());
    println!("  updates: {}", plan.updates.len());
    println!("  creates: {}", plan.creates.len());
    if plan.is_empty() {
        println!("  nothing to do");
    }
    Ok(())
}
