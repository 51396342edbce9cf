//! Reconciliation policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How local rows are reconciled against the remote dataset.
///
/// All four policies are deterministic pure functions of the two datasets;
/// the planner turns them into create/update/delete operation lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    /// Matched local rows update the remote record; unmatched rows are
    /// created. Nothing is deleted.
    Full,
    /// Matched local rows are dropped; only unmatched rows are created.
    Incremental,
    /// Matched remote records are deleted and recreated from the local row
    /// (full replacement of the record's shape); unmatched rows are created.
    Overwrite,
    /// Every remote record is deleted and every local row created. The
    /// index column is irrelevant and may be absent.
    Clone,
}

impl SyncPolicy {
    /// Returns true if the policy needs an index column to reconcile.
    pub fn requires_index(&self) -> bool {
        !matches!(self, SyncPolicy::Clone)
    }

    /// Canonical lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPolicy::Full => "full",
            SyncPolicy::Incremental => "incremental",
            SyncPolicy::Overwrite => "overwrite",
            SyncPolicy::Clone => "clone",
        }
    }
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(SyncPolicy::Full),
            "incremental" => Ok(SyncPolicy::Incremental),
            "overwrite" => Ok(SyncPolicy::Overwrite),
            "clone" => Ok(SyncPolicy::Clone),
            other => Err(format!("unknown sync policy: {other}")),
        }
    }
}
