//! Remote service interfaces.
//!
//! The engine treats the remote table service as a pair of injected
//! capabilities: a paged reader and kind-specific bulk writers. Wire
//! encoding, authentication, and endpoint shapes belong to the
//! implementations, not to this crate.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use tabsync_model::{GridChunk, RecordId, RecordPayload, RecordUpdate, RemoteRecord};
use tracing::{debug, warn};

/// Which rendering of the remote dataset a fetch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchView {
    /// Computed cell values, as a user sees them.
    Computed,
    /// Raw cell expressions; formula cells keep their leading marker.
    Formula,
}

/// One page of remote records.
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    /// Records on this page.
    pub records: Vec<RemoteRecord>,
    /// Token for the next page, or `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Paged read access to the remote dataset.
pub trait RemoteReader: Send + Sync {
    /// Fetches one page; `page_token` is `None` for the first page.
    fn fetch_page(&self, page_token: Option<&str>, view: FetchView) -> SyncResult<RecordPage>;
}

/// Fetches every remote record through the reader's paging.
///
/// Guards against paging anomalies: a page token seen twice means the
/// remote is cycling, which is reported as a protocol error instead of
/// looping forever.
pub fn fetch_all(reader: &dyn RemoteReader, view: FetchView) -> SyncResult<Vec<RemoteRecord>> {
    fetch_all_with(|token| reader.fetch_page(token, view))
}

/// [`fetch_all`] over an arbitrary page getter, so callers can wrap each
/// page fetch in their own admission and retry policies.
pub fn fetch_all_with(
    mut fetch: impl FnMut(Option<&str>) -> SyncResult<RecordPage>,
) -> SyncResult<Vec<RemoteRecord>> {
    let mut records = Vec::new();
    let mut page_token: Option<String> = None;
    let mut seen_tokens = HashSet::new();
    let mut pages = 0u32;

    loop {
        let page = fetch(page_token.as_deref())?;
        records.extend(page.records);
        pages += 1;

        match page.next_page_token {
            Some(token) => {
                if !seen_tokens.insert(token.clone()) {
                    return Err(SyncError::Protocol(format!(
                        "remote paging returned duplicate page token {token:?}"
                    )));
                }
                page_token = Some(token);
            }
            None => break,
        }
    }

    debug!(pages, records = records.len(), "fetched remote dataset");
    Ok(records)
}

/// Kind-specific bulk write primitives for record-oriented targets.
///
/// Each call is one logical request; implementations report failures
/// through the [`SyncError`] taxonomy so the transport layer can decide
/// between retry, bisection, and terminal failure.
pub trait RemoteWriter: Send + Sync {
    /// Creates the given records.
    fn create(&self, records: &[RecordPayload]) -> SyncResult<()>;

    /// Updates existing records in place.
    fn update(&self, records: &[RecordUpdate]) -> SyncResult<()>;

    /// Deletes the given records.
    fn delete(&self, ids: &[RecordId]) -> SyncResult<()>;

    /// Lists the remote table's column names.
    fn list_columns(&self) -> SyncResult<Vec<String>>;

    /// Creates a column with the remote's default (text) type.
    fn create_column(&self, name: &str) -> SyncResult<()>;
}

/// Bulk write primitives for range-addressed (grid) targets.
pub trait GridWriter: Send + Sync {
    /// Writes a block at its absolute offsets.
    fn write_range(&self, chunk: &GridChunk) -> SyncResult<()>;

    /// Appends rows; the remote service locates the insertion position.
    fn append_rows(&self, rows: &[Vec<Value>]) -> SyncResult<()>;
}

impl<T: RemoteReader + ?Sized> RemoteReader for std::sync::Arc<T> {
    fn fetch_page(&self, page_token: Option<&str>, view: FetchView) -> SyncResult<RecordPage> {
        (**self).fetch_page(page_token, view)
    }
}

impl<T: RemoteWriter + ?Sized> RemoteWriter for std::sync::Arc<T> {
    fn create(&self, records: &[RecordPayload]) -> SyncResult<()> {
        (**self).create(records)
    }

    fn update(&self, records: &[RecordUpdate]) -> SyncResult<()> {
        (**self).update(records)
    }

    fn delete(&self, ids: &[RecordId]) -> SyncResult<()> {
        (**self).delete(ids)
    }

    fn list_columns(&self) -> SyncResult<Vec<String>> {
        (**self).list_columns()
    }

    fn create_column(&self, name: &str) -> SyncResult<()> {
        (**self).create_column(name)
    }
}

impl<T: GridWriter + ?Sized> GridWriter for std::sync::Arc<T> {
    fn write_range(&self, chunk: &GridChunk) -> SyncResult<()> {
        (**self).write_range(chunk)
    }

    fn append_rows(&self, rows: &[Vec<Value>]) -> SyncResult<()> {
        (**self).append_rows(rows)
    }
}

/// An in-memory remote table for tests and examples.
///
/// Behaves like a small record store with configurable paging, an
/// optional per-request row ceiling (to provoke oversize rejections), and
/// a scriptable queue of one-shot failures.
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
    page_size: usize,
    oversize_row_limit: Mutex<Option<usize>>,
    scripted_failures: Mutex<VecDeque<SyncError>>,
}

struct MemoryState {
    records: Vec<RemoteRecord>,
    formula_fields: HashMap<String, RecordPayload>,
    columns: Vec<String>,
    next_id: u64,
    requests: u64,
}

impl MemoryRemote {
    /// Creates an empty remote with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                records: Vec::new(),
                formula_fields: HashMap::new(),
                columns: Vec::new(),
                next_id: 1,
                requests: 0,
            }),
            page_size: page_size.max(1),
            oversize_row_limit: Mutex::new(None),
            scripted_failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Seeds a record and returns its identifier.
    pub fn seed_record(&self, fields: RecordPayload) -> RecordId {
        let mut state = self.state.lock();
        let id = RecordId::new(format!("rec{}", state.next_id));
        state.next_id += 1;
        for name in fields.keys() {
            if !state.columns.contains(name) {
                state.columns.push(name.clone());
            }
        }
        state.records.push(RemoteRecord {
            id: id.clone(),
            fields,
        });
        id
    }

    /// Sets the formula-view fields for a record (what a
    /// [`FetchView::Formula`] fetch returns for it).
    pub fn set_formula_fields(&self, id: &RecordId, fields: RecordPayload) {
        self.state
            .lock()
            .formula_fields
            .insert(id.as_str().to_string(), fields);
    }

    /// Declares the remote table's columns without seeding records.
    pub fn set_columns(&self, columns: Vec<String>) {
        self.state.lock().columns = columns;
    }

    /// Rejects any write request of more than `rows` rows as oversized.
    pub fn set_oversize_row_limit(&self, rows: Option<usize>) {
        *self.oversize_row_limit.lock() = rows;
    }

    /// Queues an error returned by the next write request.
    pub fn push_failure(&self, error: SyncError) {
        self.scripted_failures.lock().push_back(error);
    }

    /// Snapshot of the current records.
    pub fn records(&self) -> Vec<RemoteRecord> {
        self.state.lock().records.clone()
    }

    /// Total write/read requests observed.
    pub fn request_count(&self) -> u64 {
        self.state.lock().requests
    }

    fn check_write(&self, rows: usize) -> SyncResult<()> {
        self.state.lock().requests += 1;
        if let Some(error) = self.scripted_failures.lock().pop_front() {
            return Err(error);
        }
        if let Some(limit) = *self.oversize_row_limit.lock() {
            if rows > limit {
                return Err(SyncError::oversize(format!(
                    "request of {rows} rows exceeds limit {limit}"
                )));
            }
        }
        Ok(())
    }
}

impl RemoteReader for MemoryRemote {
    fn fetch_page(&self, page_token: Option<&str>, view: FetchView) -> SyncResult<RecordPage> {
        let mut state = self.state.lock();
        state.requests += 1;

        let offset = match page_token {
            None => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| SyncError::Protocol(format!("bad page token {token:?}")))?,
        };

        let end = (offset + self.page_size).min(state.records.len());
        let records = state.records[offset..end]
            .iter()
            .map(|record| match view {
                FetchView::Computed => record.clone(),
                FetchView::Formula => RemoteRecord {
                    id: record.id.clone(),
                    fields: state
                        .formula_fields
                        .get(record.id.as_str())
                        .cloned()
                        .unwrap_or_else(|| record.fields.clone()),
                },
            })
            .collect();

        let next_page_token = if end < state.records.len() {
            Some(end.to_string())
        } else {
            None
        };

        Ok(RecordPage {
            records,
            next_page_token,
        })
    }
}

impl RemoteWriter for MemoryRemote {
    fn create(&self, records: &[RecordPayload]) -> SyncResult<()> {
        self.check_write(records.len())?;
        for fields in records {
            self.seed_record(fields.clone());
        }
        Ok(())
    }

    fn update(&self, records: &[RecordUpdate]) -> SyncResult<()> {
        self.check_write(records.len())?;
        let mut state = self.state.lock();
        for update in records {
            match state.records.iter_mut().find(|r| r.id == update.id) {
                Some(record) => {
                    for (name, value) in &update.fields {
                        record.fields.insert(name.clone(), value.clone());
                    }
                }
                None => {
                    return Err(SyncError::terminal(format!(
                        "no such record: {}",
                        update.id
                    )))
                }
            }
        }
        Ok(())
    }

    fn delete(&self, ids: &[RecordId]) -> SyncResult<()> {
        self.check_write(ids.len())?;
        let mut state = self.state.lock();
        for id in ids {
            let before = state.records.len();
            state.records.retain(|r| &r.id != id);
            if state.records.len() == before {
                warn!(id = %id, "delete of unknown record ignored");
            }
        }
        Ok(())
    }

    fn list_columns(&self) -> SyncResult<Vec<String>> {
        let mut state = self.state.lock();
        state.requests += 1;
        Ok(state.columns.clone())
    }

    fn create_column(&self, name: &str) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.requests += 1;
        if !state.columns.iter().any(|c| c == name) {
            state.columns.push(name.to_string());
        }
        Ok(())
    }
}
