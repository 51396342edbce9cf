//! Protected-column detection and observational diffing.

use serde_json::Value;
use std::collections::BTreeSet;
use tabsync_model::{RemoteRecord, Table};
use tracing::info;

/// Marker character that opens a formula expression in the remote's raw
/// cell rendering.
const FORMULA_MARKER: char = '=';

/// Columns whose observed cells hold server-computed content.
///
/// A column is protected if any cell of the formula view is a formula
/// expression, detected by the literal leading marker, not by semantic
/// parsing. Protected columns are excluded from update payloads when
/// protection is enabled; creates are unaffected.
pub fn detect_protected_columns(formula_view: &[RemoteRecord]) -> BTreeSet<String> {
    let mut protected = BTreeSet::new();
    for record in formula_view {
        for (column, value) in &record.fields {
            if protected.contains(column) {
                continue;
            }
            if is_formula(value) {
                protected.insert(column.clone());
            }
        }
    }
    if !protected.is_empty() {
        info!(columns = ?protected, "detected server-computed columns");
    }
    protected
}

fn is_formula(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.starts_with(FORMULA_MARKER))
}

/// Per-column mismatch counts from one comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDiff {
    /// Column name.
    pub column: String,
    /// Cell pairs compared.
    pub compared: usize,
    /// Cell pairs that did not match.
    pub mismatches: usize,
}

/// Result of comparing the local dataset against the remote computed view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffReport {
    /// Per-column results, in local column order.
    pub columns: Vec<ColumnDiff>,
    /// Row pairs compared (the shorter of the two row counts).
    pub rows_compared: usize,
}

impl DiffReport {
    /// Total mismatches across all columns.
    pub fn total_mismatches(&self) -> usize {
        self.columns.iter().map(|c| c.mismatches).sum()
    }
}

/// Compares two tables cell-by-cell for observability.
///
/// Rows are paired positionally up to the shorter row count; columns are
/// the local columns also present remotely. Numeric-looking values compare
/// within `tolerance`; everything else compares as trimmed strings. The
/// report never blocks or alters an operation plan.
pub fn diff_tables(local: &Table, remote: &Table, tolerance: f64) -> DiffReport {
    let rows_compared = local.row_count().min(remote.row_count());
    let mut columns = Vec::new();

    for (local_col, name) in local.columns().iter().enumerate() {
        let Some(remote_col) = remote.column_index(name) else {
            continue;
        };
        let mut compared = 0usize;
        let mut mismatches = 0usize;
        for row in 0..rows_compared {
            let local_cell = local.cell(row, local_col).unwrap_or(&Value::Null);
            let remote_cell = remote.cell(row, remote_col).unwrap_or(&Value::Null);
            compared += 1;
            if !cells_match(local_cell, remote_cell, tolerance) {
                mismatches += 1;
            }
        }
        columns.push(ColumnDiff {
            column: name.clone(),
            compared,
            mismatches,
        });
    }

    DiffReport {
        columns,
        rows_compared,
    }
}

fn cells_match(a: &Value, b: &Value, tolerance: f64) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => (x - y).abs() <= tolerance,
        _ => render(a) == render(b),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
