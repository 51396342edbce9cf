//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync run.
///
/// The variants form the error taxonomy the transport layer dispatches on:
/// configuration errors abort before any I/O, transient errors are retried,
/// oversize errors trigger chunk bisection, and terminal errors fail the
/// chunk without aborting the run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid policy/column combination. Fatal, surfaced before any I/O.
    #[error("configuration error: {0}")]
    Config(String),

    /// Retryable failure: network, server 5xx, or rate-limited.
    #[error("transient error: {0}")]
    Transient(String),

    /// The remote service rejected the request as too large. Triggers
    /// bisection, never retried as-is.
    #[error("payload too large: {0}")]
    Oversize(String),

    /// Non-retryable client error, or a one-row chunk still rejected as
    /// oversized. Fails the chunk, does not abort the run.
    #[error("terminal send error: {0}")]
    Terminal(String),

    /// The remote service misbehaved in a way that is neither retryable
    /// nor attributable to a single chunk (e.g. a paging cycle).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The run was cancelled between chunk dispatches.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a transient (retryable) error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Creates an oversize error.
    pub fn oversize(message: impl Into<String>) -> Self {
        Self::Oversize(message.into())
    }

    /// Creates a terminal send error.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal(message.into())
    }

    /// Returns true if the retry strategy should be consulted.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Transient(_))
    }

    /// Returns true if the error is the oversize class that triggers
    /// bisection.
    pub fn is_oversize(&self) -> bool {
        matches!(self, SyncError::Oversize(_))
    }
}
