//! Quota admission for upload batches.

use serde::Serialize;

use cloudbox_core::types::{BatchId, UploadId, UploadSource};

/// A file accepted onto the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmittedFile {
    /// Queue item id.
    pub upload_id: UploadId,
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Outcome of admitting one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionReport {
    /// The batch.
    pub batch_id: BatchId,
    /// Admitted files in submission order.
    pub admitted: Vec<AdmittedFile>,
    /// Names of the rejected files in submission order.
    pub rejected: Vec<String>,
    /// Bytes that were available to the batch.
    pub remaining: u64,
    /// Total size of the batch.
    pub requested: u64,
}

impl AdmissionReport {
    /// Whether every file was admitted.
    pub fn fully_admitted(&self) -> bool {
        self.rejected.is_empty()
    }

    /// One-line notice naming every rejected file, if any.
    pub fn rejection_notice(&self) -> Option<String> {
        if self.rejected.is_empty() {
            return None;
        }
        Some(format!(
            "Not enough storage space for: {}",
            self.rejected.join(", ")
        ))
    }
}

/// Split a batch into admitted and rejected files.
///
/// A file is admitted iff the cumulative size of the batch up to and
/// including it fits in `remaining`. The running total counts rejected
/// files too, so the admitted files always form a prefix of the batch.
pub fn admit(
    sources: Vec<UploadSource>,
    remaining: u64,
) -> (Vec<UploadSource>, Vec<UploadSource>) {
    let mut cumulative: u64 = 0;
    sources.into_iter().partition(|source| {
        cumulative = cumulative.saturating_add(source.size);
        cumulative <= remaining
    })
}
