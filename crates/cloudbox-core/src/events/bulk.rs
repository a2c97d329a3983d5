//! Bulk operation reports.

use serde::{Deserialize, Serialize};

use crate::types::ItemId;

/// Which action a bulk run applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BulkOperation {
    /// Move files or folders to the trash.
    Delete,
    /// Move files into a folder.
    Move {
        /// Destination folder path (`""` is the root).
        target: String,
    },
    /// Restore trash entries.
    Restore,
    /// Permanently delete trash entries.
    Purge,
}

impl std::fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BulkOperation::Delete => write!(f, "delete"),
            BulkOperation::Move { target } if target.is_empty() => write!(f, "move to root"),
            BulkOperation::Move { target } => write!(f, "move to '{target}'"),
            BulkOperation::Restore => write!(f, "restore"),
            BulkOperation::Purge => write!(f, "purge"),
        }
    }
}

/// One item a bulk run could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    /// The item.
    pub id: ItemId,
    /// Why it failed.
    pub reason: String,
}

/// Aggregated outcome of one bulk run.
///
/// `succeeded + recoverable + failed` always equals the snapshot size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    /// What was done.
    pub operation: BulkOperation,
    /// Items processed successfully.
    pub succeeded: Vec<ItemId>,
    /// Items skipped for a benign reason (already in trash, name taken).
    pub recoverable: Vec<BulkFailure>,
    /// Items that failed for any other reason.
    pub failed: Vec<BulkFailure>,
}

impl BulkReport {
    /// Empty report for `operation`.
    pub fn new(operation: BulkOperation) -> Self {
        Self {
            operation,
            succeeded: Vec::new(),
            recoverable: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Number of items the run covered.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.recoverable.len() + self.failed.len()
    }

    /// One-line summary with a count per bucket.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} succeeded", self.succeeded.len())];
        if !self.recoverable.is_empty() {
            parts.push(format!("{} skipped", self.recoverable.len()));
        }
        if !self.failed.is_empty() {
            parts.push(format!("{} failed", self.failed.len()));
        }
        format!("{}: {}", self.operation, parts.join(", "))
    }
}

/// Bulk operation events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BulkEvent {
    /// A bulk run finished.
    Finished {
        /// Aggregated outcome.
        report: BulkReport,
    },
}
