//! Integration tests driving the engine end-to-end against an in-memory
//! remote.

use serde_json::json;
use std::sync::Arc;
use tabsync_engine::{
    Backoff, ManualClock, MemoryRemote, RateLimitPolicy, RetryPolicy, SyncEngine, SyncError,
    SyncOptions,
};
use tabsync_model::{RecordPayload, SyncPolicy, Table};

fn local_table(rows: &[(i64, &str)]) -> Table {
    let mut table = Table::new(vec!["id".into(), "v".into()]).unwrap();
    for (id, v) in rows {
        table.push_row(vec![json!(id), json!(v)]).unwrap();
    }
    table
}

fn seed(remote: &MemoryRemote, id: i64, v: &str) {
    let mut fields = RecordPayload::new();
    fields.insert("id".into(), json!(id));
    fields.insert("v".into(), json!(v));
    remote.seed_record(fields);
}

fn options(policy: SyncPolicy) -> SyncOptions {
    SyncOptions::new(policy)
        .with_index_column("id")
        .with_rate_limit(RateLimitPolicy::FixedWait { delay_ms: 0 })
        .with_retry(RetryPolicy {
            max_retries: 2,
            backoff: Backoff::Fixed { delay_ms: 1 },
        })
}

fn engine(
    options: SyncOptions,
    remote: Arc<MemoryRemote>,
) -> SyncEngine<Arc<MemoryRemote>, Arc<MemoryRemote>> {
    SyncEngine::new(options, remote.clone(), remote).with_clock(Arc::new(ManualClock::new()))
}

#[test]
fn full_sync_end_to_end() {
    // Local {1:a, 2:b, 3:c} against remote {1:x, 2:y}: rows 1 and 2 update
    // in place, row 3 is created, nothing is deleted.
    let remote = Arc::new(MemoryRemote::new(2));
    seed(&remote, 1, "x");
    seed(&remote, 2, "y");
    let original_ids: Vec<_> = remote.records().iter().map(|r| r.id.clone()).collect();

    let engine = engine(options(SyncPolicy::Full), remote.clone());
    let report = engine
        .run(&local_table(&[(1, "a"), (2, "b"), (3, "c")]))
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.updates.applied, 2);
    assert_eq!(report.creates.applied, 1);
    assert_eq!(report.deletes.planned, 0);

    let records = remote.records();
    assert_eq!(records.len(), 3);
    for (id, v) in [(1, "a"), (2, "b"), (3, "c")] {
        let record = records.iter().find(|r| r.fields["id"] == json!(id)).unwrap();
        assert_eq!(record.fields["v"], json!(v));
    }
    // Matched rows kept their remote identifiers.
    for id in original_ids {
        assert!(records.iter().any(|r| r.id == id));
    }
}

#[test]
fn overwrite_sync_end_to_end() {
    // Same inputs, overwrite: both matched records are deleted and all
    // three local rows created fresh.
    let remote = Arc::new(MemoryRemote::new(10));
    seed(&remote, 1, "x");
    seed(&remote, 2, "y");
    let original_ids: Vec<_> = remote.records().iter().map(|r| r.id.clone()).collect();

    let engine = engine(options(SyncPolicy::Overwrite), remote.clone());
    let report = engine
        .run(&local_table(&[(1, "a"), (2, "b"), (3, "c")]))
        .unwrap();

    assert_eq!(report.deletes.applied, 2);
    assert_eq!(report.creates.applied, 3);
    assert_eq!(report.updates.planned, 0);

    let records = remote.records();
    assert_eq!(records.len(), 3);
    // Matched rows were recreated under new identifiers.
    for id in original_ids {
        assert!(!records.iter().any(|r| r.id == id));
    }
}

#[test]
fn incremental_sync_only_creates() {
    let remote = Arc::new(MemoryRemote::new(10));
    seed(&remote, 1, "x");

    let engine = engine(options(SyncPolicy::Incremental), remote.clone());
    let report = engine
        .run(&local_table(&[(1, "a"), (2, "b")]))
        .unwrap();

    assert_eq!(report.updates.planned, 0);
    assert_eq!(report.creates.applied, 1);
    // The matched record is untouched.
    let records = remote.records();
    let r1 = records.iter().find(|r| r.fields["id"] == json!(1)).unwrap();
    assert_eq!(r1.fields["v"], json!("x"));
}

#[test]
fn clone_sync_replaces_table() {
    let remote = Arc::new(MemoryRemote::new(3));
    for i in 0..7 {
        seed(&remote, 100 + i, "old");
    }

    // Clone needs no index column.
    let opts = SyncOptions::new(SyncPolicy::Clone)
        .with_rate_limit(RateLimitPolicy::FixedWait { delay_ms: 0 });
    let engine = engine(opts, remote.clone());
    let report = engine.run(&local_table(&[(1, "a"), (2, "b")])).unwrap();

    assert_eq!(report.deletes.planned, 7);
    assert_eq!(report.deletes.applied, 7);
    assert_eq!(report.creates.applied, 2);
    assert_eq!(remote.records().len(), 2);
}

#[test]
fn selective_clone_is_a_configuration_error() {
    let remote = Arc::new(MemoryRemote::new(10));
    let opts = SyncOptions::new(SyncPolicy::Clone)
        .with_selective_columns(vec!["v".into()])
        .with_rate_limit(RateLimitPolicy::FixedWait { delay_ms: 0 });
    let engine = engine(opts, remote.clone());

    let err = engine.run(&local_table(&[(1, "a")])).unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
    // Nothing touched the remote.
    assert_eq!(remote.request_count(), 0);
}

#[test]
fn oversize_remote_forces_bisection_until_success() {
    // The remote accepts at most 3 rows per request but the configured
    // ceiling is far larger; bisection narrows every chunk until it fits.
    let remote = Arc::new(MemoryRemote::new(50));
    let engine = engine(
        options(SyncPolicy::Full).with_row_ceiling(100),
        remote.clone(),
    );
    remote.set_oversize_row_limit(Some(3));

    let rows: Vec<(i64, String)> = (0..25).map(|i| (i, format!("v{i}"))).collect();
    let borrowed: Vec<(i64, &str)> = rows.iter().map(|(i, v)| (*i, v.as_str())).collect();
    let report = engine.run(&local_table(&borrowed)).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.creates.applied, 25);
    assert_eq!(remote.records().len(), 25);
}

#[test]
fn transient_failures_are_retried_to_success() {
    let remote = Arc::new(MemoryRemote::new(10));
    remote.push_failure(SyncError::transient("HTTP 429"));
    remote.push_failure(SyncError::transient("HTTP 503"));

    let engine = engine(options(SyncPolicy::Incremental), remote.clone());
    let report = engine.run(&local_table(&[(1, "a")])).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.retries, 2);
    assert_eq!(remote.records().len(), 1);
}

#[test]
fn paged_fetch_sees_the_whole_remote() {
    // Page size 2 against 5 remote records: reconciliation still matches
    // every row, so a full sync produces no spurious creates.
    let remote = Arc::new(MemoryRemote::new(2));
    for i in 0..5 {
        seed(&remote, i, "x");
    }

    let engine = engine(options(SyncPolicy::Full), remote.clone());
    let rows: Vec<(i64, &str)> = (0..5).map(|i| (i, "z")).collect();
    let report = engine.run(&local_table(&rows)).unwrap();

    assert_eq!(report.creates.planned, 0);
    assert_eq!(report.updates.applied, 5);
    assert_eq!(remote.records().len(), 5);
}
