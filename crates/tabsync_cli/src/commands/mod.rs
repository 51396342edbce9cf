//! CLI command implementations.

pub mod diff;
pub mod plan;
pub mod sync;

use std::path::Path;
use tabsync_engine::SyncOptions;

/// Loads a sync profile (a JSON-serialized [`SyncOptions`]).
pub fn load_options(path: &Path) -> Result<SyncOptions, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read profile {}: {e}", path.display()))?;
    let options: SyncOptions = serde_json::from_str(&text)
        .map_err(|e| format!("invalid profile {}: {e}", path.display()))?;
    Ok(options)
}
