//! # tabsync Engine
//!
//! Resilient reconciliation-and-transport engine for synchronizing a local
//! tabular dataset into a rate-limited, size-constrained remote table
//! service.
//!
//! This crate provides:
//! - Reconciliation planning under four policies (full, incremental,
//!   overwrite, clone)
//! - Chunk planning under static row/column ceilings, for record-oriented
//!   and range-addressed targets
//! - Adaptive transport with auto-bisection on oversize rejection
//! - Pluggable retry strategies (exponential, linear, fixed)
//! - Pluggable rate limiters (fixed interval, sliding window, fixed window)
//! - Protected-column detection and observational diffing
//!
//! ## Architecture
//!
//! One [`SyncEngine`] run is a single logical worker: it fetches the remote
//! dataset through an injected [`RemoteReader`], plans operations, and
//! dispatches them **sequentially** through an injected [`RemoteWriter`],
//! in delete → update → create order. The rate window is owned by the run
//! (never a process global), and the rate limiter's `admit` plus the retry
//! backoff sleep are the only blocking points.
//!
//! A chunk the remote rejects as too large is halved and both halves
//! re-sent, halving again as needed, so the engine converges on a working
//! request shape in logarithmically many extra requests without knowing
//! the remote's true limit. A failing chunk is recorded in the
//! [`RunReport`] and the run continues: results are best-effort, never
//! all-or-nothing.
//!
//! ## Key Invariants
//!
//! - Configuration errors surface before any remote I/O
//! - Every network attempt consumes exactly one rate-limiter admission
//! - Bisection never produces an empty chunk; a one-row oversize
//!   rejection is a terminal chunk failure, surfaced not swallowed
//! - Cancellation is honored between chunk dispatches, never mid-bisection

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chunk;
mod clock;
mod config;
mod diff;
mod engine;
mod error;
mod planner;
mod rate;
mod remote;
mod retry;
mod transport;

pub use chunk::{AppendChunkPlan, GridChunkPlan, RecordChunkPlan};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncOptions;
pub use diff::{detect_protected_columns, diff_tables, ColumnDiff, DiffReport};
pub use engine::{BatchReport, RunReport, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use planner::{build_remote_index, plan_sync, SyncPlan};
pub use rate::{FixedInterval, FixedWindow, RateLimitPolicy, RateLimiter, SlidingWindow};
pub use remote::{
    fetch_all, fetch_all_with, FetchView, GridWriter, MemoryRemote, RecordPage, RemoteReader,
    RemoteWriter,
};
pub use retry::{
    Backoff, ExponentialBackoff, FixedWait, LinearGrowth, RetryPolicy, RetryStrategy,
};
pub use transport::{ChunkFailure, DispatchStats, Dispatcher};
