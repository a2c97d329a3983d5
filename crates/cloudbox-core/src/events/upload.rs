//! Upload queue events.

use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::types::{BatchId, UploadId, UploadReceipt};

/// Events emitted while admitting and draining uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UploadEvent {
    /// Files of a batch were accepted onto the queue.
    Admitted {
        /// The batch.
        batch_id: BatchId,
        /// Names of the admitted files in submission order.
        files: Vec<String>,
    },
    /// Files of a batch did not fit the remaining quota.
    Rejected {
        /// The batch.
        batch_id: BatchId,
        /// Names of every rejected file.
        files: Vec<String>,
        /// Bytes that were available for the batch.
        remaining: u64,
        /// Bytes the whole batch asked for.
        requested: u64,
    },
    /// A transfer started.
    Started {
        /// Queue item.
        upload_id: UploadId,
        /// File name.
        name: String,
        /// Items finished since the queue last started draining, plus one.
        position: usize,
        /// `position` plus the items still waiting.
        total: usize,
    },
    /// Advisory transfer telemetry.
    Progress {
        /// Queue item.
        upload_id: UploadId,
        /// Bytes sent.
        sent: u64,
        /// Total bytes.
        total: u64,
        /// Fraction complete in `[0, 1]`.
        fraction: f64,
        /// Sampled rate in bytes per second.
        bytes_per_second: Option<f64>,
        /// Estimated seconds left.
        eta_seconds: Option<f64>,
    },
    /// A transfer finished successfully.
    Completed {
        /// Queue item.
        upload_id: UploadId,
        /// File name as submitted.
        name: String,
        /// Server answer; `Renamed` means a name collision was resolved.
        receipt: UploadReceipt,
    },
    /// A transfer failed; the queue moves on.
    Failed {
        /// Queue item.
        upload_id: UploadId,
        /// File name as submitted.
        name: String,
        /// Failure reason.
        error: TransferError,
    },
    /// Queued items were discarded before they started.
    Cleared {
        /// Number of discarded items.
        discarded: usize,
    },
    /// The queue ran empty.
    Drained {
        /// Items that completed.
        succeeded: usize,
        /// Items that failed.
        failed: usize,
    },
}
