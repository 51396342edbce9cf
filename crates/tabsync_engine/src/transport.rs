//! Adaptive dispatch: sending chunks with retry, rate limiting, and
//! auto-bisection on oversize rejection.

use crate::clock::Clock;
use crate::config::SyncOptions;
use crate::error::{SyncError, SyncResult};
use crate::rate::RateLimiter;
use crate::remote::{GridWriter, RemoteWriter};
use crate::retry::RetryStrategy;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tabsync_model::{GridChunk, RecordBatch, RecordChunk, RecordSlice};
use tracing::{debug, info, warn};

/// A chunk shape the dispatcher can narrow by halving.
trait Bisect: Sized {
    /// Rows the chunk would send.
    fn rows(&self) -> usize;

    /// Halves the chunk by rows; `None` once a single row remains.
    fn halve(self) -> Option<(Self, Self)>;

    /// Human-readable position for logs and failure records.
    fn label(&self) -> String;
}

impl Bisect for RecordChunk<'_> {
    fn rows(&self) -> usize {
        self.row_count()
    }

    fn halve(self) -> Option<(Self, Self)> {
        self.split()
    }

    fn label(&self) -> String {
        format!(
            "{}[{}..{}]",
            self.kind(),
            self.offset,
            self.offset + self.row_count()
        )
    }
}

impl Bisect for GridChunk {
    fn rows(&self) -> usize {
        self.row_count()
    }

    fn halve(self) -> Option<(Self, Self)> {
        self.split()
    }

    fn label(&self) -> String {
        format!(
            "range(r{},c{} {}x{})",
            self.row_offset,
            self.col_offset,
            self.row_count(),
            self.col_count()
        )
    }
}

/// A chunk that could not be applied, with the error that stopped it.
#[derive(Debug)]
pub struct ChunkFailure {
    /// Position of the failed chunk within its batch or grid.
    pub label: String,
    /// Rows the chunk carried.
    pub rows: usize,
    /// The final error.
    pub error: SyncError,
}

/// Outcome of dispatching one batch (or grid) of operations.
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Rows applied successfully.
    pub rows_applied: usize,
    /// Rows whose chunk failed terminally.
    pub rows_failed: usize,
    /// Rows never attempted because the run was cancelled.
    pub rows_unattempted: usize,
    /// Network attempts made (each consumed one rate-limiter admission).
    pub requests: u64,
    /// Retries after transient failures.
    pub retries: u64,
    /// Per-chunk failure records.
    pub failures: Vec<ChunkFailure>,
    /// True if a cancellation stopped the dispatch early.
    pub cancelled: bool,
}

impl DispatchStats {
    /// Folds another dispatch outcome into this one.
    pub fn absorb(&mut self, other: DispatchStats) {
        self.rows_applied += other.rows_applied;
        self.rows_failed += other.rows_failed;
        self.rows_unattempted += other.rows_unattempted;
        self.requests += other.requests;
        self.retries += other.retries;
        self.failures.extend(other.failures);
        self.cancelled |= other.cancelled;
    }
}

/// Sends chunks sequentially through the retry and rate-limit policies,
/// narrowing oversized chunks by bisection.
///
/// One dispatcher serves one sync run; its rate window is the only mutable
/// state shared across the run's sends.
pub struct Dispatcher {
    limiter: Box<dyn RateLimiter>,
    strategy: Box<dyn RetryStrategy>,
    max_retries: u32,
    clock: Arc<dyn Clock>,
    cancelled: Arc<AtomicBool>,
}

impl Dispatcher {
    /// Builds a dispatcher from run options.
    pub fn new(options: &SyncOptions, clock: Arc<dyn Clock>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            limiter: options.rate_limit.build(clock.clone()),
            strategy: options.retry.build(),
            max_retries: options.retry.max_retries,
            clock,
            cancelled,
        }
    }

    /// Dispatches a record batch in row-ceiling-bounded chunks.
    ///
    /// Chunks go out in planner order; the cancellation flag is checked
    /// between chunks (a chunk's bisection tree is atomic once begun).
    /// Failing chunks are recorded and dispatch continues with the rest.
    pub fn dispatch_record_batch(
        &self,
        writer: &dyn RemoteWriter,
        batch: &RecordBatch,
        row_ceiling: usize,
    ) -> DispatchStats {
        let mut stats = DispatchStats::default();
        let plan = crate::chunk::RecordChunkPlan::new(batch, row_ceiling);

        for chunk in plan {
            if self.cancelled.load(Ordering::SeqCst) {
                stats.cancelled = true;
                stats.rows_unattempted += batch.len() - chunk.offset;
                warn!(kind = %batch.kind(), "dispatch cancelled, remaining chunks skipped");
                break;
            }
            let send = |c: &RecordChunk<'_>| match c.slice {
                RecordSlice::Create(records) => writer.create(records),
                RecordSlice::Update(records) => writer.update(records),
                RecordSlice::Delete(ids) => writer.delete(ids),
            };
            self.send_adaptive(chunk, &send, &mut stats);
        }
        stats
    }

    /// Dispatches planned grid blocks through `write_range`.
    pub fn dispatch_grid_ranges(
        &self,
        writer: &dyn GridWriter,
        plan: impl Iterator<Item = GridChunk>,
    ) -> DispatchStats {
        self.dispatch_grid(plan, &|c: &GridChunk| writer.write_range(c))
    }

    /// Dispatches planned append blocks through `append_rows`.
    pub fn dispatch_grid_appends(
        &self,
        writer: &dyn GridWriter,
        plan: impl Iterator<Item = GridChunk>,
    ) -> DispatchStats {
        self.dispatch_grid(plan, &|c: &GridChunk| writer.append_rows(&c.rows))
    }

    fn dispatch_grid(
        &self,
        mut plan: impl Iterator<Item = GridChunk>,
        send: &dyn Fn(&GridChunk) -> SyncResult<()>,
    ) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(chunk) = plan.next() {
            if self.cancelled.load(Ordering::SeqCst) {
                stats.cancelled = true;
                stats.rows_unattempted +=
                    chunk.row_count() + plan.by_ref().map(|c| c.row_count()).sum::<usize>();
                warn!("dispatch cancelled, remaining blocks skipped");
                break;
            }
            self.send_adaptive(chunk, send, &mut stats);
        }
        stats
    }

    /// Sends one planned chunk, bisecting on oversize rejection.
    ///
    /// Uses an explicit work queue rather than recursion so depth is
    /// bounded regardless of the initial chunk size. Halves are sent in
    /// order and both are always attempted: a failed first half does not
    /// prevent the second, so partial progress is maximized and failures
    /// are fully enumerated.
    fn send_adaptive<C: Bisect>(
        &self,
        chunk: C,
        send: &dyn Fn(&C) -> SyncResult<()>,
        stats: &mut DispatchStats,
    ) {
        let mut queue = VecDeque::new();
        queue.push_back(chunk);

        while let Some(current) = queue.pop_front() {
            let rows = current.rows();
            match self.request(&current.label(), stats, || send(&current)) {
                Ok(()) => {
                    debug!(chunk = %current.label(), rows, "chunk applied");
                    stats.rows_applied += rows;
                }
                Err(error) if error.is_oversize() => {
                    let label = current.label();
                    match current.halve() {
                    Some((first, second)) => {
                        info!(
                            rows,
                            first = first.rows(),
                            second = second.rows(),
                            "oversize rejection, bisecting chunk"
                        );
                        queue.push_front(second);
                        queue.push_front(first);
                    }
                    None => {
                        // No further narrowing is possible; surface, don't
                        // swallow.
                        warn!(chunk = %label, "single-row chunk still oversized");
                        stats.rows_failed += rows;
                        stats.failures.push(ChunkFailure {
                            label,
                            rows,
                            error: SyncError::terminal(format!(
                                "single-row chunk rejected as oversized: {error}"
                            )),
                        });
                    }
                    }
                }
                Err(error) => {
                    let label = current.label();
                    warn!(chunk = %label, %error, "chunk failed");
                    stats.rows_failed += rows;
                    stats.failures.push(ChunkFailure {
                        label,
                        rows,
                        error,
                    });
                }
            }
        }
    }

    /// One logical request: admit, attempt, and retry transient failures
    /// under the backoff strategy.
    ///
    /// Every network attempt, retries included, consumes one rate-limiter
    /// admission. Non-transient errors return immediately; in particular
    /// an oversize rejection is never retried as-is. The final error after
    /// exhausted retries is returned unchanged, so a send whose last
    /// failure is the oversize class remains eligible for bisection.
    ///
    /// Also serves non-chunk requests (schema calls, page fetches) so they
    /// share the run's admission and retry policies.
    pub fn request<T>(
        &self,
        label: &str,
        stats: &mut DispatchStats,
        send: impl Fn() -> SyncResult<T>,
    ) -> SyncResult<T> {
        let mut attempt: u32 = 1;
        loop {
            self.limiter.admit();
            stats.requests += 1;

            match send() {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt <= self.max_retries => {
                    let delay = self.strategy.next_delay(attempt);
                    warn!(
                        request = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "transient failure, backing off"
                    );
                    self.clock.sleep(delay);
                    stats.retries += 1;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate::RateLimitPolicy;
    use crate::remote::MemoryRemote;
    use crate::retry::{Backoff, RetryPolicy};
    use serde_json::json;
    use tabsync_model::{RecordPayload, SyncPolicy};

    fn payload(i: usize) -> RecordPayload {
        let mut map = RecordPayload::new();
        map.insert("n".into(), json!(i));
        map
    }

    fn fast_options() -> SyncOptions {
        SyncOptions::new(SyncPolicy::Clone)
            .with_rate_limit(RateLimitPolicy::FixedWait { delay_ms: 0 })
            .with_retry(RetryPolicy {
                max_retries: 2,
                backoff: Backoff::Fixed { delay_ms: 10 },
            })
    }

    fn dispatcher(options: &SyncOptions, clock: Arc<ManualClock>) -> Dispatcher {
        Dispatcher::new(options, clock, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn clean_dispatch_applies_all_rows() {
        let remote = MemoryRemote::new(100);
        let batch = RecordBatch::Create((0..10).map(payload).collect());
        let d = dispatcher(&fast_options(), Arc::new(ManualClock::new()));

        let stats = d.dispatch_record_batch(&remote, &batch, 4);
        assert_eq!(stats.rows_applied, 10);
        assert_eq!(stats.rows_failed, 0);
        assert_eq!(stats.requests, 3); // ceil(10/4)
        assert!(stats.failures.is_empty());
        assert_eq!(remote.records().len(), 10);
    }

    #[test]
    fn oversize_bisects_until_it_fits() {
        let remote = MemoryRemote::new(100);
        remote.set_oversize_row_limit(Some(2));
        let batch = RecordBatch::Create((0..5).map(payload).collect());
        let d = dispatcher(&fast_options(), Arc::new(ManualClock::new()));

        let stats = d.dispatch_record_batch(&remote, &batch, 10);
        // 5 -> oversize; (2,3): 2 ok, 3 -> oversize; (1,2): both ok.
        assert_eq!(stats.rows_applied, 5);
        assert_eq!(stats.rows_failed, 0);
        assert_eq!(stats.requests, 5);
        assert_eq!(remote.records().len(), 5);
    }

    #[test]
    fn bisection_attempts_every_leaf_without_short_circuit() {
        let remote = MemoryRemote::new(100);
        remote.set_oversize_row_limit(Some(0)); // everything is oversized
        let batch = RecordBatch::Create((0..4).map(payload).collect());
        let d = dispatcher(&fast_options(), Arc::new(ManualClock::new()));

        let stats = d.dispatch_record_batch(&remote, &batch, 10);
        // Full bisection tree over 2^2 rows: 1 + 2 + 4 = 2^3 - 1 sends,
        // with a terminal failure reported for every single-row leaf.
        assert_eq!(stats.requests, 7);
        assert_eq!(stats.failures.len(), 4);
        assert_eq!(stats.rows_failed, 4);
        assert_eq!(stats.rows_applied, 0);
        assert!(stats
            .failures
            .iter()
            .all(|f| matches!(f.error, SyncError::Terminal(_))));
    }

    #[test]
    fn transient_failure_retries_then_succeeds() {
        let remote = MemoryRemote::new(100);
        remote.push_failure(SyncError::transient("HTTP 503"));
        let batch = RecordBatch::Create(vec![payload(1)]);
        let clock = Arc::new(ManualClock::new());
        let d = dispatcher(&fast_options(), clock.clone());

        let stats = d.dispatch_record_batch(&remote, &batch, 10);
        assert_eq!(stats.rows_applied, 1);
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.retries, 1);
        assert_eq!(clock.sleeps(), vec![std::time::Duration::from_millis(10)]);
    }

    #[test]
    fn exhausted_retries_fail_the_chunk_but_not_the_batch() {
        let remote = MemoryRemote::new(100);
        // First chunk: more transient failures than max_retries allows.
        for _ in 0..3 {
            remote.push_failure(SyncError::transient("HTTP 503"));
        }
        let batch = RecordBatch::Create((0..4).map(payload).collect());
        let d = dispatcher(&fast_options(), Arc::new(ManualClock::new()));

        let stats = d.dispatch_record_batch(&remote, &batch, 2);
        assert_eq!(stats.rows_failed, 2);
        assert_eq!(stats.rows_applied, 2);
        assert_eq!(stats.failures.len(), 1);
        assert!(stats.failures[0].error.is_transient());
        assert_eq!(stats.retries, 2);
    }

    #[test]
    fn terminal_error_is_not_retried() {
        let remote = MemoryRemote::new(100);
        remote.push_failure(SyncError::terminal("HTTP 403"));
        let batch = RecordBatch::Create(vec![payload(1), payload(2)]);
        let d = dispatcher(&fast_options(), Arc::new(ManualClock::new()));

        let stats = d.dispatch_record_batch(&remote, &batch, 10);
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.retries, 0);
        assert_eq!(stats.rows_failed, 2);
    }

    #[test]
    fn cancellation_skips_remaining_chunks() {
        let remote = MemoryRemote::new(100);
        let batch = RecordBatch::Create((0..6).map(payload).collect());
        let cancelled = Arc::new(AtomicBool::new(true));
        let d = Dispatcher::new(&fast_options(), Arc::new(ManualClock::new()), cancelled);

        let stats = d.dispatch_record_batch(&remote, &batch, 2);
        assert!(stats.cancelled);
        assert_eq!(stats.rows_unattempted, 6);
        assert_eq!(stats.rows_applied, 0);
        assert_eq!(stats.requests, 0);
    }

    #[test]
    fn every_attempt_consumes_one_admission() {
        // A 500ms fixed-interval limiter with a manual clock: each admission
        // after the first sleeps, so sleeps = admissions - 1 - retries'
        // backoff sleeps. Use zero backoff to isolate admission waits.
        let remote = MemoryRemote::new(100);
        remote.push_failure(SyncError::transient("HTTP 429"));
        remote.push_failure(SyncError::transient("HTTP 429"));
        let options = SyncOptions::new(SyncPolicy::Clone)
            .with_rate_limit(RateLimitPolicy::FixedWait { delay_ms: 500 })
            .with_retry(RetryPolicy {
                max_retries: 3,
                backoff: Backoff::Fixed { delay_ms: 0 },
            });
        let clock = Arc::new(ManualClock::new());
        let d = dispatcher(&options, clock.clone());

        let batch = RecordBatch::Create(vec![payload(1)]);
        let stats = d.dispatch_record_batch(&remote, &batch, 10);
        assert_eq!(stats.requests, 3);

        // Two retry attempts each waited out the admission interval.
        let admission_waits = clock
            .sleeps()
            .into_iter()
            .filter(|d| *d == std::time::Duration::from_millis(500))
            .count();
        assert_eq!(admission_waits, 2);
    }

    #[test]
    fn grid_dispatch_bisects_ranges() {
        use tabsync_model::Grid;

        struct LimitedGridWriter {
            row_limit: usize,
            written: parking_lot::Mutex<Vec<(usize, usize, usize)>>,
        }
        impl GridWriter for LimitedGridWriter {
            fn write_range(&self, chunk: &GridChunk) -> SyncResult<()> {
                if chunk.row_count() > self.row_limit {
                    return Err(SyncError::oversize("too many rows"));
                }
                self.written
                    .lock()
                    .push((chunk.row_offset, chunk.col_offset, chunk.row_count()));
                Ok(())
            }
            fn append_rows(&self, _rows: &[Vec<serde_json::Value>]) -> SyncResult<()> {
                Ok(())
            }
        }

        let writer = LimitedGridWriter {
            row_limit: 2,
            written: parking_lot::Mutex::new(Vec::new()),
        };
        let grid = Grid::new(
            (0..6)
                .map(|r| vec![json!(r), json!(r * 10)])
                .collect::<Vec<_>>(),
        );
        let d = dispatcher(&fast_options(), Arc::new(ManualClock::new()));

        let plan = crate::chunk::GridChunkPlan::new(&grid, 6, 10);
        let stats = d.dispatch_grid_ranges(&writer, plan);
        assert_eq!(stats.rows_applied, 6);
        assert_eq!(stats.rows_failed, 0);

        // Written blocks preserve absolute row offsets and cover all rows.
        let written = writer.written.lock().clone();
        let total: usize = written.iter().map(|(_, _, rows)| rows).sum();
        assert_eq!(total, 6);
        assert!(written.iter().all(|(_, col, _)| *col == 0));
    }
}
