//! Local dataset loading.

use serde_json::Value;
use std::path::Path;
use tabsync_model::Table;
use thiserror::Error;

/// Errors raised while loading a local dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// File could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// File is not valid JSON.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// The JSON has the wrong shape.
    #[error("{0}")]
    Shape(String),
}

/// Loads a table from a JSON file holding an array of flat objects.
///
/// Columns are the union of all object keys in first-seen order; keys
/// absent from a row become nulls. Nested values are carried through as-is
/// (the remote decides what to make of them).
pub fn load_table(path: &Path) -> Result<Table, DatasetError> {
    let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| DatasetError::Json {
        path: path.display().to_string(),
        source,
    })?;
    table_from_value(value)
}

fn table_from_value(value: Value) -> Result<Table, DatasetError> {
    let Value::Array(rows) = value else {
        return Err(DatasetError::Shape(
            "expected a top-level JSON array of row objects".into(),
        ));
    };

    let mut columns: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let Value::Object(map) = row else {
            return Err(DatasetError::Shape(format!("row {i} is not an object")));
        };
        for key in map.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        objects.push(map);
    }

    let mut table = Table::new(columns.clone())
        .map_err(|e| DatasetError::Shape(e.to_string()))?;
    for mut map in objects {
        let cells = columns
            .iter()
            .map(|name| map.remove(name).unwrap_or(Value::Null))
            .collect();
        table
            .push_row(cells)
            .map_err(|e| DatasetError::Shape(e.to_string()))?;
    }
    Ok(table)
}
