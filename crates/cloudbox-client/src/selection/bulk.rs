//! Concurrent bulk operations over a selection snapshot.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::events::{BulkEvent, BulkFailure, BulkOperation, BulkReport};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::Transport;
use cloudbox_core::types::ItemId;

use crate::events::EventBus;
use crate::session::TokenSource;
use crate::validation::normalize_path;

/// How a single item of a bulk run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Processed.
    Succeeded,
    /// Skipped for a benign reason.
    Recoverable(String),
    /// Failed.
    Failed(String),
}

impl ItemOutcome {
    /// Classify a transport result. Missing items and conflicts (already in
    /// the trash, name taken) are recoverable.
    pub fn classify(result: AppResult<()>) -> Self {
        match result {
            Ok(()) => Self::Succeeded,
            Err(e) if matches!(e.kind, ErrorKind::NotFound | ErrorKind::Conflict) => {
                Self::Recoverable(e.message)
            }
            Err(e) => Self::Failed(e.message),
        }
    }
}

/// Issues one transport call per item, all at once, and folds the results.
#[derive(Clone)]
pub struct BulkRunner {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenSource>,
    events: EventBus,
}

impl std::fmt::Debug for BulkRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkRunner").finish_non_exhaustive()
    }
}

impl BulkRunner {
    /// Create a runner.
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenSource>,
        events: EventBus,
    ) -> Self {
        Self {
            transport,
            tokens,
            events,
        }
    }

    /// Apply `operation` to every id in `ids` concurrently.
    ///
    /// Completion order does not affect the report: buckets keep the
    /// order of `ids`.
    pub async fn execute(&self, operation: BulkOperation, ids: Vec<ItemId>) -> AppResult<BulkReport> {
        if let BulkOperation::Move { target } = &operation {
            normalize_path(target)?;
        }
        let token = self
            .tokens
            .get_token()
            .ok_or_else(|| AppError::authentication("Not logged in"))?;

        let calls = ids.iter().map(|id| self.apply(&operation, &token, id));
        let outcomes = join_all(calls).await;

        let mut report = BulkReport::new(operation);
        for (id, outcome) in ids.into_iter().zip(outcomes) {
            match outcome {
                ItemOutcome::Succeeded => report.succeeded.push(id),
                ItemOutcome::Recoverable(reason) => {
                    report.recoverable.push(BulkFailure { id, reason })
                }
                ItemOutcome::Failed(reason) => {
                    warn!(id = %id, reason = %reason, "Bulk item failed");
                    report.failed.push(BulkFailure { id, reason })
                }
            }
        }

        info!(summary = %report.summary(), "Bulk operation finished");
        self.events.publish(BulkEvent::Finished {
            report: report.clone(),
        });
        Ok(report)
    }

    async fn apply(&self, operation: &BulkOperation, token: &str, id: &ItemId) -> ItemOutcome {
        let result = match operation {
            BulkOperation::Delete => self.transport.delete_file(token, id).await,
            BulkOperation::Move { target } => self
                .transport
                .move_file(token, id, target.trim_matches('/'))
                .await
                .map(|_| ()),
            BulkOperation::Restore => self.transport.restore(token, id).await,
            BulkOperation::Purge => self.transport.purge(token, id).await,
        };
        ItemOutcome::classify(result)
    }
}
