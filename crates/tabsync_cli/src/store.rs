//! A JSON-file-backed record store target.
//!
//! Stands in for a remote table service when building or testing sync
//! pipelines locally; real HTTP targets plug into the engine through the
//! same [`RemoteReader`]/[`RemoteWriter`] traits.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tabsync_engine::{
    FetchView, RecordPage, RemoteReader, RemoteWriter, SyncError, SyncResult,
};
use tabsync_model::{RecordId, RecordPayload, RecordUpdate, RemoteRecord};
use uuid::Uuid;

/// On-disk shape of one stored record.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    id: String,
    fields: RecordPayload,
}

/// A record store persisted as a JSON file.
///
/// Records page out through [`RemoteReader`] and mutate through
/// [`RemoteWriter`]; created records get fresh UUID identifiers the way a
/// remote service would mint its own. Nothing touches the disk until
/// [`FileStore::save`].
pub struct FileStore {
    path: PathBuf,
    records: Mutex<Vec<RemoteRecord>>,
    columns: Mutex<Vec<String>>,
    page_size: usize,
}

impl FileStore {
    /// Opens a store, loading existing records if the file exists.
    pub fn open(path: &Path, page_size: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let records: Vec<RemoteRecord> = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let stored: Vec<StoredRecord> = serde_json::from_str(&text)?;
            stored
                .into_iter()
                .map(|r| RemoteRecord::new(r.id, r.fields))
                .collect()
        } else {
            Vec::new()
        };

        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for name in record.fields.keys() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
            columns: Mutex::new(columns),
            page_size: page_size.max(1),
        })
    }

    /// Writes the current records back to the file.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let stored: Vec<StoredRecord> = self
            .records
            .lock()
            .iter()
            .map(|r| StoredRecord {
                id: r.id.as_str().to_string(),
                fields: r.fields.clone(),
            })
            .collect();
        let text = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl RemoteReader for FileStore {
    fn fetch_page(&self, page_token: Option<&str>, _view: FetchView) -> SyncResult<RecordPage> {
        let records = self.records.lock();
        let offset = match page_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| SyncError::Protocol(format!("bad page token {token:?}")))?,
        };
        let end = (offset + self.page_size).min(records.len());
        let next_page_token = if end < records.len() {
            Some(end.to_string())
        } else {
            None
        };
        Ok(RecordPage {
            records: records[offset..end].to_vec(),
            next_page_token,
        })
    }
}

impl RemoteWriter for FileStore {
    fn create(&self, payloads: &[RecordPayload]) -> SyncResult<()> {
        let mut records = self.records.lock();
        let mut columns = self.columns.lock();
        for fields in payloads {
            for name in fields.keys() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
            records.push(RemoteRecord::new(
                format!("rec-{}", Uuid::new_v4()),
                fields.clone(),
            ));
        }
        Ok(())
    }

    fn update(&self, updates: &[RecordUpdate]) -> SyncResult<()> {
        let mut records = self.records.lock();
        for update in updates {
            let Some(record) = records.iter_mut().find(|r| r.id == update.id) else {
                return Err(SyncError::terminal(format!("no such record: {}", update.id)));
            };
            for (name, value) in &update.fields {
                record.fields.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn delete(&self, ids: &[RecordId]) -> SyncResult<()> {
        let mut records = self.records.lock();
        records.retain(|r| !ids.contains(&r.id));
        Ok(())
    }

    fn list_columns(&self) -> SyncResult<Vec<String>> {
        Ok(self.columns.lock().clone())
    }

    fn create_column(&self, name: &str) -> SyncResult<()> {
        let mut columns = self.columns.lock();
        if !columns.iter().any(|c| c == name) {
            columns.push(name.to_string());
        }
        Ok(())
    }
}
