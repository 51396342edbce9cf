//! Reconciliation planning: turning (local rows, remote records, policy)
//! into create/update/delete operation lists.

use crate::config::SyncOptions;
use crate::error::{SyncError, SyncResult};
use std::collections::{BTreeSet, HashMap, HashSet};
use tabsync_model::{
    IndexKey, RecordBatch, RecordId, RecordPayload, RecordUpdate, RemoteRecord, SyncPolicy, Table,
};
use tracing::{debug, info, warn};

/// The operation lists one sync run will dispatch.
///
/// Every operation corresponds to exactly one local row or exactly one
/// matched remote record; no row is represented twice within a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// Full-row payloads for records to create.
    pub creates: Vec<RecordPayload>,
    /// Updates for matched remote records.
    pub updates: Vec<RecordUpdate>,
    /// Identifiers of remote records to delete.
    pub deletes: Vec<RecordId>,
}

impl SyncPlan {
    /// Returns true if the plan contains no operations.
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Total operation count.
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    /// Consumes the plan into homogeneous batches in dispatch order.
    ///
    /// Deletes come first so that index-unique targets accept the creates
    /// that replace deleted rows, then updates, then creates. Empty batches
    /// are omitted.
    pub fn into_batches(self) -> Vec<RecordBatch> {
        let mut batches = Vec::new();
        if !self.deletes.is_empty() {
            batches.push(RecordBatch::Delete(self.deletes));
        }
        if !self.updates.is_empty() {
            batches.push(RecordBatch::Update(self.updates));
        }
        if !self.creates.is_empty() {
            batches.push(RecordBatch::Create(self.creates));
        }
        batches
    }
}

/// Index from remote index-key to record identifier.
///
/// Duplicate index values keep the first-seen mapping; later duplicates
/// are logged and left unmatched for update purposes. Duplicates are never
/// an error.
pub fn build_remote_index(
    records: &[RemoteRecord],
    index_column: &str,
) -> HashMap<IndexKey, RecordId> {
    let mut index = HashMap::with_capacity(records.len());
    let mut duplicates = 0usize;
    let mut unkeyed = 0usize;

    for record in records {
        let Some(key) = record
            .fields
            .get(index_column)
            .and_then(IndexKey::from_value)
        else {
            unkeyed += 1;
            continue;
        };
        if index.contains_key(&key) {
            duplicates += 1;
            debug!(key = %key, id = %record.id, "duplicate remote index value, keeping first-seen");
            continue;
        }
        index.insert(key, record.id.clone());
    }

    if duplicates > 0 || unkeyed > 0 {
        warn!(
            duplicates,
            unkeyed, "remote records without a usable unique index value"
        );
    }
    index
}

/// Computes the operation plan for one sync run.
///
/// `protected` columns are excluded from update payloads (creates are
/// unaffected: new rows still receive all local values). Pure apart from
/// logging; performs no I/O.
pub fn plan_sync(
    table: &Table,
    remote: &[RemoteRecord],
    options: &SyncOptions,
    protected: &BTreeSet<String>,
) -> SyncResult<SyncPlan> {
    options.validate()?;

    let plan = match options.policy {
        SyncPolicy::Clone => plan_clone(table, remote),
        SyncPolicy::Full => plan_keyed(table, remote, options, protected, KeyedMode::Full)?,
        SyncPolicy::Incremental => {
            plan_keyed(table, remote, options, protected, KeyedMode::Incremental)?
        }
        SyncPolicy::Overwrite => {
            plan_keyed(table, remote, options, protected, KeyedMode::Overwrite)?
        }
    };

    info!(
        policy = %options.policy,
        creates = plan.creates.len(),
        updates = plan.updates.len(),
        deletes = plan.deletes.len(),
        "sync plan ready"
    );
    Ok(plan)
}

fn plan_clone(table: &Table, remote: &[RemoteRecord]) -> SyncPlan {
    let mut plan = SyncPlan {
        deletes: remote.iter().map(|r| r.id.clone()).collect(),
        ..SyncPlan::default()
    };
    for row in 0..table.row_count() {
        if let Some(payload) = table.row_payload(row) {
            plan.creates.push(payload);
        }
    }
    plan
}

enum KeyedMode {
    Full,
    Incremental,
    Overwrite,
}

fn plan_keyed(
    table: &Table,
    remote: &[RemoteRecord],
    options: &SyncOptions,
    protected: &BTreeSet<String>,
    mode: KeyedMode,
) -> SyncResult<SyncPlan> {
    let index_column = options
        .index_column
        .as_deref()
        .ok_or_else(|| SyncError::config(format!("policy {} requires an index column", options.policy)))?;
    let index_pos = table.column_index(index_column).ok_or_else(|| {
        SyncError::config(format!("index column {index_column:?} not in local dataset"))
    })?;

    let remote_index = build_remote_index(remote, index_column);
    let mut plan = SyncPlan::default();
    // Guards against two local rows matching the same remote record, which
    // would otherwise enqueue the same identifier twice.
    let mut deleted: HashSet<RecordId> = HashSet::new();

    for row in 0..table.row_count() {
        let Some(payload) = table.row_payload(row) else {
            continue;
        };
        let matched = table
            .cell(row, index_pos)
            .and_then(IndexKey::from_value)
            .and_then(|key| remote_index.get(&key));

        match (matched, &mode) {
            (Some(id), KeyedMode::Full) => plan.updates.push(RecordUpdate {
                id: id.clone(),
                fields: update_fields(payload, index_column, options, protected),
            }),
            (Some(_), KeyedMode::Incremental) => {}
            (Some(id), KeyedMode::Overwrite) => {
                if deleted.insert(id.clone()) {
                    plan.deletes.push(id.clone());
                }
                plan.creates.push(payload);
            }
            (None, _) => plan.creates.push(payload),
        }
    }

    Ok(plan)
}

/// Restricts an update payload per selective sync and column protection.
///
/// Selective sync keeps only the configured columns plus the index column
/// (forced in so the match key is always present); protected columns are
/// then removed entirely.
fn update_fields(
    payload: RecordPayload,
    index_column: &str,
    options: &SyncOptions,
    protected: &BTreeSet<String>,
) -> RecordPayload {
    let mut fields = payload;
    if let Some(selective) = &options.selective_columns {
        fields.retain(|name, _| selective.iter().any(|s| s == name) || name == index_column);
    }
    if !protected.is_empty() {
        fields.retain(|name, _| !protected.contains(name));
    }
    fields
}
