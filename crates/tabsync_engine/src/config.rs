//! Sync run configuration.

use crate::error::{SyncError, SyncResult};
use crate::rate::RateLimitPolicy;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use tabsync_model::SyncPolicy;

/// Configuration for one sync run.
///
/// Deserializable so a profile file can carry it; the builder methods
/// cover programmatic construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncOptions {
    /// Reconciliation policy.
    pub policy: SyncPolicy,
    /// Column joining local rows to remote records. Required by every
    /// policy except `clone`.
    pub index_column: Option<String>,
    /// When set, update payloads are restricted to these columns plus the
    /// index column. Rejected for `clone`.
    pub selective_columns: Option<Vec<String>>,
    /// Maximum operations (or grid rows) per request.
    pub row_ceiling: usize,
    /// Maximum columns per request, for range-addressed targets.
    pub col_ceiling: usize,
    /// Retry behavior for transient failures.
    pub retry: RetryPolicy,
    /// Request-admission throttling.
    pub rate_limit: RateLimitPolicy,
    /// Detect server-computed columns via the formula view and exclude
    /// them from update payloads.
    pub protect_computed_columns: bool,
    /// Create locally-present columns missing from the remote table
    /// before dispatching operations.
    pub create_missing_columns: bool,
}

impl SyncOptions {
    /// Creates options for a policy with defaults for everything else.
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Sets the index column.
    pub fn with_index_column(mut self, column: impl Into<String>) -> Self {
        self.index_column = Some(column.into());
        self
    }

    /// Restricts update payloads to the given columns.
    pub fn with_selective_columns(mut self, columns: Vec<String>) -> Self {
        self.selective_columns = Some(columns);
        self
    }

    /// Sets the per-request row ceiling.
    pub fn with_row_ceiling(mut self, ceiling: usize) -> Self {
        self.row_ceiling = ceiling;
        self
    }

    /// Sets the per-request column ceiling.
    pub fn with_col_ceiling(mut self, ceiling: usize) -> Self {
        self.col_ceiling = ceiling;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the rate-limit policy.
    pub fn with_rate_limit(mut self, rate_limit: RateLimitPolicy) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Enables or disables protected-column detection.
    pub fn with_protection(mut self, enabled: bool) -> Self {
        self.protect_computed_columns = enabled;
        self
    }

    /// Enables or disables remote column creation.
    pub fn with_create_missing_columns(mut self, enabled: bool) -> Self {
        self.create_missing_columns = enabled;
        self
    }

    /// Checks policy/column consistency. Called before any I/O; a failure
    /// here aborts the run before the remote is touched.
    pub fn validate(&self) -> SyncResult<()> {
        if self.policy.requires_index() && self.index_column.is_none() {
            return Err(SyncError::config(format!(
                "policy {} requires an index column",
                self.policy
            )));
        }
        if self.selective_columns.is_some() && self.policy == SyncPolicy::Clone {
            return Err(SyncError::config(
                "selective sync is incompatible with the clone policy",
            ));
        }
        if self.row_ceiling == 0 {
            return Err(SyncError::config("row_ceiling must be at least 1"));
        }
        if self.col_ceiling == 0 {
            return Err(SyncError::config("col_ceiling must be at least 1"));
        }
        Ok(())
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            policy: SyncPolicy::Full,
            index_column: None,
            selective_columns: None,
            row_ceiling: 500,
            col_ceiling: 80,
            retry: RetryPolicy::default(),
            rate_limit: RateLimitPolicy::default(),
            protect_computed_columns: false,
            create_missing_columns: true,
        }
    }
}
