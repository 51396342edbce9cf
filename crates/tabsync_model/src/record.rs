//! Records, operations, and operation batches for record-oriented targets.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Column name → cell value mapping carried by create and update operations.
///
/// For updates the payload may be a strict subset of the columns; absent
/// columns are left untouched remotely.
pub type RecordPayload = serde_json::Map<String, Value>;

/// Opaque identifier of a remote record, owned by the remote service.
///
/// Identifiers are never invented locally; they only enter the system
/// through [`RemoteRecord`]s observed from the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Wraps a remote identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record as last observed from the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Remote identifier.
    pub id: RecordId,
    /// Column values as observed remotely.
    pub fields: RecordPayload,
}

impl RemoteRecord {
    /// Creates a remote record snapshot.
    pub fn new(id: impl Into<String>, fields: RecordPayload) -> Self {
        Self {
            id: RecordId::new(id),
            fields,
        }
    }
}

/// An update operation: remote identifier plus the columns to rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    /// Identifier of the record to update.
    pub id: RecordId,
    /// Columns to rewrite; absent columns keep their remote value.
    pub fields: RecordPayload,
}

/// The kind of operation a batch carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    /// Create new records.
    Create,
    /// Update existing records in place.
    Update,
    /// Delete existing records.
    Delete,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchKind::Create => "create",
            BatchKind::Update => "update",
            BatchKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// An ordered sequence of same-kind operations for one sync run.
///
/// Batches are homogeneous because the remote transport's bulk primitives
/// are kind-specific; the closed variant keeps kind dispatch exhaustive.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBatch {
    /// Payloads for records to create.
    Create(Vec<RecordPayload>),
    /// Updates to apply to existing records.
    Update(Vec<RecordUpdate>),
    /// Identifiers of records to delete.
    Delete(Vec<RecordId>),
}

impl RecordBatch {
    /// The operation kind this batch carries.
    pub fn kind(&self) -> BatchKind {
        match self {
            RecordBatch::Create(_) => BatchKind::Create,
            RecordBatch::Update(_) => BatchKind::Update,
            RecordBatch::Delete(_) => BatchKind::Delete,
        }
    }

    /// Number of operations in the batch.
    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Create(v) => v.len(),
            RecordBatch::Update(v) => v.len(),
            RecordBatch::Delete(v) => v.len(),
        }
    }

    /// Returns true if the batch carries no operations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows a contiguous sub-range as a chunk with its absolute offset.
    ///
    /// # Panics
    ///
    /// Panics if `offset + len` exceeds the batch length.
    pub fn chunk(&self, offset: usize, len: usize) -> RecordChunk<'_> {
        let slice = match self {
            RecordBatch::Create(v) => RecordSlice::Create(&v[offset..offset + len]),
            RecordBatch::Update(v) => RecordSlice::Update(&v[offset..offset + len]),
            RecordBatch::Delete(v) => RecordSlice::Delete(&v[offset..offset + len]),
        };
        RecordChunk { offset, slice }
    }
}

/// A borrowed same-kind run of operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordSlice<'a> {
    /// Payloads to create.
    Create(&'a [RecordPayload]),
    /// Updates to apply.
    Update(&'a [RecordUpdate]),
    /// Identifiers to delete.
    Delete(&'a [RecordId]),
}

impl RecordSlice<'_> {
    /// Number of operations in the slice.
    pub fn len(&self) -> usize {
        match self {
            RecordSlice::Create(v) => v.len(),
            RecordSlice::Update(v) => v.len(),
            RecordSlice::Delete(v) => v.len(),
        }
    }

    /// Returns true if the slice is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A contiguous sub-range of a [`RecordBatch`], bounded by the row ceiling.
///
/// The chunk carries its absolute offset into the batch so the transport
/// layer can report and split it without recomputing context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordChunk<'a> {
    /// Offset of the first operation within the originating batch.
    pub offset: usize,
    /// The operations themselves.
    pub slice: RecordSlice<'a>,
}

impl<'a> RecordChunk<'a> {
    /// The operation kind this chunk carries.
    pub fn kind(&self) -> BatchKind {
        match self.slice {
            RecordSlice::Create(_) => BatchKind::Create,
            RecordSlice::Update(_) => BatchKind::Update,
            RecordSlice::Delete(_) => BatchKind::Delete,
        }
    }

    /// Number of operations in the chunk.
    pub fn row_count(&self) -> usize {
        self.slice.len()
    }

    /// Splits the chunk in half by row count.
    ///
    /// The first half keeps the chunk's starting offset; the second starts
    /// immediately after it. Returns `None` for chunks of one row or fewer,
    /// which cannot be narrowed further.
    pub fn split(&self) -> Option<(RecordChunk<'a>, RecordChunk<'a>)> {
        let rows = self.row_count();
        if rows <= 1 {
            return None;
        }
        let mid = rows / 2;
        let (first, second) = match self.slice {
            RecordSlice::Create(v) => {
                let (a, b) = v.split_at(mid);
                (RecordSlice::Create(a), RecordSlice::Create(b))
            }
            RecordSlice::Update(v) => {
                let (a, b) = v.split_at(mid);
                (RecordSlice::Update(a), RecordSlice::Update(b))
            }
            RecordSlice::Delete(v) => {
                let (a, b) = v.split_at(mid);
                (RecordSlice::Delete(a), RecordSlice::Delete(b))
            }
        };
        Some((
            RecordChunk {
                offset: self.offset,
                slice: first,
            },
            RecordChunk {
                offset: self.offset + mid,
                slice: second,
            },
        ))
    }
}
