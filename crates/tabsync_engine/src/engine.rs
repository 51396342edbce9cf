//! The sync engine: one entry point per run.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncOptions;
use crate::diff::{detect_protected_columns, diff_tables, DiffReport};
use crate::error::SyncResult;
use crate::planner::plan_sync;
use crate::remote::{fetch_all_with, FetchView, RemoteReader, RemoteWriter};
use crate::transport::{ChunkFailure, DispatchStats, Dispatcher};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tabsync_model::{BatchKind, RecordBatch, RemoteRecord, SyncPolicy, Table};
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome counts for one operation kind within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Operations the planner produced.
    pub planned: usize,
    /// Operations applied successfully.
    pub applied: usize,
    /// Operations whose chunk failed terminally.
    pub failed: usize,
    /// Operations never attempted (cancellation).
    pub unattempted: usize,
}

/// The result of one sync run.
///
/// A run is best-effort: failing chunks are recorded here and do not abort
/// the rest. Whether partial failure constitutes overall failure is the
/// caller's decision.
#[derive(Debug)]
pub struct RunReport {
    /// Unique identifier of this run, for log correlation.
    pub run_id: Uuid,
    /// Policy the run executed.
    pub policy: SyncPolicy,
    /// Delete outcomes.
    pub deletes: BatchReport,
    /// Update outcomes.
    pub updates: BatchReport,
    /// Create outcomes.
    pub creates: BatchReport,
    /// Columns excluded from updates as server-computed.
    pub protected_columns: BTreeSet<String>,
    /// Network attempts made, including retries and schema calls.
    pub requests: u64,
    /// Retries after transient failures.
    pub retries: u64,
    /// Per-chunk failure records.
    pub failures: Vec<ChunkFailure>,
    /// True if the run stopped early on cancellation.
    pub cancelled: bool,
    /// Wall time of the run.
    pub duration: Duration,
}

impl RunReport {
    /// True if every planned operation was applied.
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && self.failures.is_empty()
            && [self.deletes, self.updates, self.creates]
                .iter()
                .all(|b| b.failed == 0 && b.unattempted == 0)
    }

    /// Total operations applied across all kinds.
    pub fn total_applied(&self) -> usize {
        self.deletes.applied + self.updates.applied + self.creates.applied
    }
}

/// Synchronizes a local table into a record-oriented remote target.
///
/// The engine owns the run's rate window (built per instance, never a
/// process global) and a cancellation flag that can be flipped from
/// another thread; the flag is honored between chunk dispatches.
pub struct SyncEngine<R: RemoteReader, W: RemoteWriter> {
    options: SyncOptions,
    reader: Arc<R>,
    writer: Arc<W>,
    clock: Arc<dyn Clock>,
    cancelled: Arc<AtomicBool>,
}

impl<R: RemoteReader, W: RemoteWriter> SyncEngine<R, W> {
    /// Creates an engine with the real clock.
    pub fn new(options: SyncOptions, reader: R, writer: W) -> Self {
        Self {
            options,
            reader: Arc::new(reader),
            writer: Arc::new(writer),
            clock: Arc::new(SystemClock),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replaces the clock (deterministic tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Requests cancellation; the run stops issuing new chunks. Sticky
    /// until [`SyncEngine::reset_cancel`] is called.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears a previous cancellation request.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Shared handle to the cancellation flag, for wiring to signal
    /// handlers.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// The engine's options.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Computes the operation plan without dispatching anything.
    ///
    /// Performs the same validation and remote reads as [`SyncEngine::run`]
    /// but leaves the remote untouched.
    pub fn plan(&self, table: &Table) -> SyncResult<crate::planner::SyncPlan> {
        self.options.validate()?;
        let dispatcher = Dispatcher::new(&self.options, self.clock.clone(), self.cancelled.clone());
        let mut stats = DispatchStats::default();
        let remote = self.fetch_records(&dispatcher, &mut stats, FetchView::Computed)?;
        let protected = self.protected_columns(&dispatcher, &mut stats)?;
        plan_sync(table, &remote, &self.options, &protected)
    }

    /// Executes one sync run.
    ///
    /// Validation happens before any I/O, so a configuration error never
    /// touches the remote. Batches dispatch sequentially in
    /// delete → update → create order; a failing chunk is recorded and the
    /// run continues with the remaining chunks.
    pub fn run(&self, table: &Table) -> SyncResult<RunReport> {
        self.options.validate()?;

        let run_id = Uuid::new_v4();
        let start = self.clock.now();
        info!(
            %run_id,
            policy = %self.options.policy,
            rows = table.row_count(),
            cols = table.col_count(),
            "sync run starting"
        );

        let dispatcher = Dispatcher::new(&self.options, self.clock.clone(), self.cancelled.clone());
        let mut overhead = DispatchStats::default();

        let remote = self.fetch_records(&dispatcher, &mut overhead, FetchView::Computed)?;
        let protected = self.protected_columns(&dispatcher, &mut overhead)?;

        if self.options.create_missing_columns {
            self.ensure_columns(&dispatcher, &mut overhead, table)?;
        }

        let plan = plan_sync(table, &remote, &self.options, &protected)?;
        let planned = [
            (BatchKind::Delete, plan.deletes.len()),
            (BatchKind::Update, plan.updates.len()),
            (BatchKind::Create, plan.creates.len()),
        ];

        let mut reports = [
            (BatchKind::Delete, BatchReport::default()),
            (BatchKind::Update, BatchReport::default()),
            (BatchKind::Create, BatchReport::default()),
        ];
        for (kind, report) in reports.iter_mut() {
            if let Some((_, count)) = planned.iter().find(|(k, _)| k == &*kind) {
                report.planned = *count;
            }
        }

        let mut totals = overhead;
        for batch in plan.into_batches() {
            let kind = batch.kind();
            let stats = if self.cancelled.load(Ordering::SeqCst) {
                warn!(%run_id, kind = %kind, "batch skipped: run cancelled");
                DispatchStats {
                    rows_unattempted: batch.len(),
                    cancelled: true,
                    ..DispatchStats::default()
                }
            } else {
                self.dispatch_batch(&dispatcher, &batch)
            };

            if let Some((_, report)) = reports.iter_mut().find(|(k, _)| *k == kind) {
                report.applied = stats.rows_applied;
                report.failed = stats.rows_failed;
                report.unattempted = stats.rows_unattempted;
            }
            totals.absorb(stats);
        }

        let report = RunReport {
            run_id,
            policy: self.options.policy,
            deletes: report_for(&reports, BatchKind::Delete),
            updates: report_for(&reports, BatchKind::Update),
            creates: report_for(&reports, BatchKind::Create),
            protected_columns: protected,
            requests: totals.requests,
            retries: totals.retries,
            failures: totals.failures,
            cancelled: totals.cancelled,
            duration: self.clock.now().saturating_duration_since(start),
        };

        info!(
            %run_id,
            applied = report.total_applied(),
            failed = report.failures.len(),
            requests = report.requests,
            retries = report.retries,
            cancelled = report.cancelled,
            "sync run finished"
        );
        Ok(report)
    }

    /// Compares the local table against the remote computed view.
    ///
    /// Observability only; never alters the remote or an operation plan.
    pub fn diff(&self, table: &Table, tolerance: f64) -> SyncResult<DiffReport> {
        let dispatcher = Dispatcher::new(&self.options, self.clock.clone(), self.cancelled.clone());
        let mut stats = DispatchStats::default();
        let remote = self.fetch_records(&dispatcher, &mut stats, FetchView::Computed)?;
        let remote_table = records_to_table(table, &remote);
        Ok(diff_tables(table, &remote_table, tolerance))
    }

    fn dispatch_batch(&self, dispatcher: &Dispatcher, batch: &RecordBatch) -> DispatchStats {
        info!(kind = %batch.kind(), operations = batch.len(), "dispatching batch");
        dispatcher.dispatch_record_batch(self.writer.as_ref(), batch, self.options.row_ceiling)
    }

    fn fetch_records(
        &self,
        dispatcher: &Dispatcher,
        stats: &mut DispatchStats,
        view: FetchView,
    ) -> SyncResult<Vec<RemoteRecord>> {
        let reader = self.reader.as_ref();
        fetch_all_with(|token| {
            dispatcher.request("fetch_page", stats, || reader.fetch_page(token, view))
        })
    }

    fn protected_columns(
        &self,
        dispatcher: &Dispatcher,
        stats: &mut DispatchStats,
    ) -> SyncResult<BTreeSet<String>> {
        if !self.options.protect_computed_columns {
            return Ok(BTreeSet::new());
        }
        let formula_view = self.fetch_records(dispatcher, stats, FetchView::Formula)?;
        Ok(detect_protected_columns(&formula_view))
    }

    /// Creates locally-present columns that the remote table lacks, so
    /// operations never reference unknown columns.
    fn ensure_columns(
        &self,
        dispatcher: &Dispatcher,
        stats: &mut DispatchStats,
        table: &Table,
    ) -> SyncResult<()> {
        let writer = self.writer.as_ref();
        let existing = dispatcher.request("list_columns", stats, || writer.list_columns())?;
        for column in table.columns() {
            if !existing.contains(column) {
                info!(column = %column, "creating missing remote column");
                dispatcher.request("create_column", stats, || writer.create_column(column))?;
            }
        }
        Ok(())
    }
}

fn report_for(reports: &[(BatchKind, BatchReport)], kind: BatchKind) -> BatchReport {
    reports
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, r)| *r)
        .unwrap_or_default()
}

/// Projects remote records onto the local column set, in remote order,
/// for positional diffing.
fn records_to_table(local: &Table, records: &[RemoteRecord]) -> Table {
    let mut table = Table::new(local.columns().to_vec()).unwrap_or_default();
    for record in records {
        let cells = local
            .columns()
            .iter()
            .map(|name| record.fields.get(name).cloned().unwrap_or_default())
            .collect();
        // Arity always matches: cells came from the same column list.
        let _ = table.push_row(cells);
    }
    table
}
