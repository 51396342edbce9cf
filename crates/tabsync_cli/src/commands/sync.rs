//! Sync command implementation.

use crate::dataset::load_table;
use crate::store::FileStore;
use std::path::Path;
use std::sync::Arc;
use tabsync_engine::{RunReport, SyncEngine};
use tracing::info;

/// Runs a sync of the input dataset into the store.
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
    let report = engine.run(&table)?;

    store.save()?;
    info!(records = store.len(), "store saved");
    print_report(&report);

    if !report.is_complete() {
        return Err(format!(
            "sync incomplete: {} chunk failure(s), see log for details",
            report.failures.len()
        )
        .into());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("run {} ({})", report.run_id, report.policy);
    for (kind, batch) in [
        ("deletes", report.deletes),
        ("updates", report.updates),
        ("creates", report.creates),
    ] {
        if batch.planned == 0 {
            continue;
        }
        println!(
            "  {kind}: {}/{} applied, {} failed, {} unattempted",
            batch.applied, batch.planned, batch.failed, batch.unattempted
        );
    }
    if !report.protected_columns.is_empty() {
        let columns: Vec<_> = report.protected_columns.iter().cloned().collect();
        println!("  protected columns: {}", columns.join(", "));
    }
    println!(
        "  {} requests, {} retries, {:.2}s{}",
        report.requests,
        report.retries,
        report.duration.as_secs_f64(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
}
