//! # tabsync Model
//!
//! Shared data model for the tabsync engine and tools.
//!
//! This crate defines the vocabulary the rest of the system speaks:
//! - [`Table`]: a local tabular dataset (fixed column list, row-major cells)
//! - [`RemoteRecord`]: a record as last observed from the remote service
//! - [`IndexKey`]: the join key between local and remote datasets
//! - [`RecordBatch`] / [`RecordChunk`]: homogeneous operation batches and
//!   size-bounded slices of them, for record-oriented targets
//! - [`Grid`] / [`GridChunk`]: cell matrices and size-bounded blocks of
//!   them, for range-addressed targets
//! - [`SyncPolicy`]: the four reconciliation policies
//!
//! Cell scalars are [`serde_json::Value`] because the remote services this
//! model targets speak JSON; the model itself performs no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod grid;
mod index;
mod policy;
mod record;
mod table;

pub use grid::{Grid, GridChunk};
pub use index::IndexKey;
pub use policy::SyncPolicy;
pub use record::{
    BatchKind, RecordBatch, RecordChunk, RecordId, RecordPayload, RecordSlice, RecordUpdate,
    RemoteRecord,
};
pub use table::{Table, TableError};
