//! Serial upload queue.
//!
//! Files are admitted per batch against a fresh quota snapshot and then
//! transferred one at a time by a single drain task. A failed transfer is
//! reported and the queue moves on; nothing short of
//! [`UploadQueue::clear_pending`] stops it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use cloudbox_core::config::UploadConfig;
use cloudbox_core::error::{AppError, TransferError};
use cloudbox_core::events::{ListingEvent, UploadEvent};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::Transport;
use cloudbox_core::types::{BatchId, ProgressFn, UploadId, UploadReceipt, UploadSource};

use crate::events::EventBus;
use crate::session::{SessionState, TokenSource};
use crate::validation::{normalize_path, validate_name};

use super::admission::{AdmissionReport, AdmittedFile, admit};
use super::progress::TransferProgress;

/// Lifecycle of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Waiting for its turn.
    Queued,
    /// Transferring.
    Active,
    /// Stored by the server.
    Done,
    /// Transfer failed.
    Failed,
}

/// A file owned by the queue from admission until its terminal state.
#[derive(Debug, Clone)]
struct UploadItem {
    id: UploadId,
    source: UploadSource,
    target_path: String,
}

/// The item currently transferring.
#[derive(Debug, Clone)]
struct ActiveItem {
    id: UploadId,
    name: String,
    size: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<UploadItem>,
    active: Option<ActiveItem>,
    /// A drain task is running.
    draining: bool,
    /// Items finished since the drain task started.
    finished: usize,
    succeeded: usize,
    failed: usize,
}

impl QueueState {
    fn committed_bytes(&self) -> u64 {
        let pending: u64 = self.pending.iter().map(|i| i.source.size).sum();
        pending + self.active.as_ref().map_or(0, |a| a.size)
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenSource>,
    events: EventBus,
    config: UploadConfig,
    state: Mutex<QueueState>,
    /// Serializes quota check and enqueue across concurrent batches.
    admission: tokio::sync::Mutex<()>,
    /// `true` while no drain task is running.
    idle: watch::Sender<bool>,
}

/// Admits files against the storage quota and uploads them one at a time.
#[derive(Clone)]
pub struct UploadQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for UploadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadQueue")
            .field("len", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl UploadQueue {
    /// Create an empty queue.
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenSource>,
        events: EventBus,
        config: UploadConfig,
    ) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                transport,
                tokens,
                events,
                config,
                state: Mutex::new(QueueState::default()),
                admission: tokio::sync::Mutex::new(()),
                idle,
            }),
        }
    }

    /// Admit a batch into `target_path` and start draining.
    ///
    /// Names and the target path are validated before any network call.
    /// The quota is fetched fresh for every batch; bytes already queued or
    /// transferring count against it.
    pub async fn submit(
        &self,
        mut sources: Vec<UploadSource>,
        target_path: &str,
    ) -> AppResult<AdmissionReport> {
        let target_path = normalize_path(target_path)?;
        for source in &mut sources {
            let name = validate_name(&source.name)?;
            if name.len() != source.name.len() {
                source.name = name.to_string();
            }
        }

        let batch_id = BatchId::new();
        let requested: u64 = sources.iter().map(|s| s.size).sum();

        let _admission = self.inner.admission.lock().await;
        let token = self
            .inner
            .tokens
            .get_token()
            .ok_or_else(|| AppError::authentication("Not logged in"))?;
        let quota = self.inner.transport.quota(&token).await?;
        let committed = self.lock().committed_bytes();
        let remaining = quota.remaining.saturating_sub(committed);

        let (admitted, rejected) = admit(sources, remaining);
        let report = AdmissionReport {
            batch_id,
            admitted: admitted
                .iter()
                .map(|s| AdmittedFile {
                    upload_id: UploadId::new(),
                    name: s.name.clone(),
                    size: s.size,
                })
                .collect(),
            rejected: rejected.into_iter().map(|s| s.name).collect(),
            remaining,
            requested,
        };

        info!(
            batch_id = %batch_id,
            admitted = report.admitted.len(),
            rejected = report.rejected.len(),
            remaining,
            requested,
            "Upload batch admitted"
        );

        if !report.rejected.is_empty() {
            self.inner.events.publish(UploadEvent::Rejected {
                batch_id,
                files: report.rejected.clone(),
                remaining,
                requested,
            });
        }
        if report.admitted.is_empty() {
            return Ok(report);
        }
        self.inner.events.publish(UploadEvent::Admitted {
            batch_id,
            files: report.admitted.iter().map(|f| f.name.clone()).collect(),
        });

        let start_drain = {
            let mut state = self.lock();
            for (file, source) in report.admitted.iter().zip(admitted) {
                state.pending.push_back(UploadItem {
                    id: file.upload_id,
                    source,
                    target_path: target_path.clone(),
                });
            }
            let start = !state.draining;
            if start {
                state.draining = true;
                state.finished = 0;
                state.succeeded = 0;
                state.failed = 0;
                self.inner.idle.send_replace(false);
            }
            start
        };

        if start_drain {
            let queue = self.clone();
            tokio::spawn(async move { queue.drain().await });
        }

        Ok(report)
    }

    /// Drop every item that has not started. The active transfer, if any,
    /// runs to completion. Returns the number of discarded items.
    pub fn clear_pending(&self) -> usize {
        let discarded = {
            let mut state = self.lock();
            let n = state.pending.len();
            state.pending.clear();
            n
        };
        if discarded > 0 {
            info!(discarded, "Cleared pending uploads");
            self.inner
                .events
                .publish(UploadEvent::Cleared { discarded });
        }
        discarded
    }

    /// Items not yet in a terminal state (queued plus active).
    pub fn len(&self) -> usize {
        let state = self.lock();
        state.pending.len() + usize::from(state.active.is_some())
    }

    /// Whether nothing is queued or transferring.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id and name of the transferring item.
    pub fn active(&self) -> Option<(UploadId, String)> {
        self.lock().active.as_ref().map(|a| (a.id, a.name.clone()))
    }

    /// Names of the queued items in order, with their state.
    pub fn items(&self) -> Vec<(String, ItemState)> {
        let state = self.lock();
        state
            .active
            .iter()
            .map(|a| (a.name.clone(), ItemState::Active))
            .chain(
                state
                    .pending
                    .iter()
                    .map(|i| (i.source.name.clone(), ItemState::Queued)),
            )
            .collect()
    }

    /// Wait until the drain task has finished, including the settle delay
    /// and the listing refresh request.
    pub async fn wait_idle(&self) {
        let mut idle = self.inner.idle.subscribe();
        let _ = idle.wait_for(|idle| *idle).await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drain(&self) {
        loop {
            while let Some((item, position, total)) = self.next_item() {
                let ok = self.run_item(item, position, total).await;
                let mut state = self.lock();
                state.active = None;
                state.finished += 1;
                if ok {
                    state.succeeded += 1;
                } else {
                    state.failed += 1;
                }
            }

            let (succeeded, failed) = {
                let state = self.lock();
                (state.succeeded, state.failed)
            };
            info!(succeeded, failed, "Upload queue drained");
            self.inner
                .events
                .publish(UploadEvent::Drained { succeeded, failed });

            time::sleep(self.inner.config.settle_delay()).await;
            self.inner.events.publish(ListingEvent::RefreshRequested {
                cause: "uploads finished".to_string(),
            });

            let mut state = self.lock();
            if state.pending.is_empty() {
                state.draining = false;
                self.inner.idle.send_replace(true);
                return;
            }
            state.finished = 0;
            state.succeeded = 0;
            state.failed = 0;
        }
    }

    fn next_item(&self) -> Option<(UploadItem, usize, usize)> {
        let mut state = self.lock();
        let item = state.pending.pop_front()?;
        state.active = Some(ActiveItem {
            id: item.id,
            name: item.source.name.clone(),
            size: item.source.size,
        });
        let position = state.finished + 1;
        let total = position + state.pending.len();
        Some((item, position, total))
    }

    /// Transfer one item. Returns whether it succeeded.
    async fn run_item(&self, item: UploadItem, position: usize, total: usize) -> bool {
        let UploadItem {
            id,
            source,
            target_path,
        } = item;
        let name = source.name.clone();

        self.inner.events.publish(UploadEvent::Started {
            upload_id: id,
            name: name.clone(),
            position,
            total,
        });
        debug!(upload_id = %id, file = %name, position, total, "Starting upload");

        if self.inner.tokens.force_renew().await != SessionState::Active {
            warn!(upload_id = %id, "Pre-upload renewal failed; trying with the last known token");
        }
        let token = self.inner.tokens.peek_token().unwrap_or_default();

        let timeout = match self.inner.transport.upload_timeout(&token).await {
            Ok(timeout) if !timeout.is_zero() => timeout,
            Ok(_) => self.inner.config.fallback_timeout(),
            Err(e) => {
                debug!(error = %e, "Upload timeout unavailable; using fallback");
                self.inner.config.fallback_timeout()
            }
        };

        let keepalive_task = AbortOnDrop(tokio::spawn(keepalive(
            self.inner.tokens.clone(),
            self.inner.config.transfer_renewal_interval(),
        )));

        let transfer = self.inner.transport.upload(
            &token,
            &source,
            &target_path,
            timeout,
            self.progress_reporter(id, source.size),
        );
        let result = match time::timeout(timeout, transfer).await {
            Ok(result) => result,
            Err(_) => Err(TransferError::Timeout { after: timeout }),
        };
        drop(keepalive_task);

        match result {
            Ok(receipt) => {
                if let UploadReceipt::Renamed { new_name, .. } = &receipt {
                    info!(upload_id = %id, file = %name, stored_as = %new_name, "Upload stored under a new name");
                } else {
                    info!(upload_id = %id, file = %name, "Upload complete");
                }
                self.inner.events.publish(UploadEvent::Completed {
                    upload_id: id,
                    name,
                    receipt,
                });
                true
            }
            Err(error) => {
                warn!(
                    upload_id = %id,
                    file = %name,
                    error = %error,
                    quota = error.is_quota_rejection(),
                    "Upload failed"
                );
                self.inner.events.publish(UploadEvent::Failed {
                    upload_id: id,
                    name,
                    error,
                });
                false
            }
        }
    }

    fn progress_reporter(&self, upload_id: UploadId, size: u64) -> ProgressFn {
        let events = self.inner.events.clone();
        let progress = Mutex::new(TransferProgress::new(
            size,
            self.inner.config.rate_sample_interval(),
        ));
        Arc::new(move |sent| {
            let mut progress = progress.lock().unwrap_or_else(PoisonError::into_inner);
            let sampled = progress.record(sent);
            if sampled || progress.is_complete() {
                events.publish(UploadEvent::Progress {
                    upload_id,
                    sent: progress.sent(),
                    total: progress.total(),
                    fraction: progress.fraction(),
                    bytes_per_second: progress.rate(),
                    eta_seconds: progress.eta().map(|d| d.as_secs_f64()),
                });
            }
        })
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Renews the session every `period` for as long as a transfer runs.
async fn keepalive(tokens: Arc<dyn TokenSource>, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        debug!("Renewing session during transfer");
        tokens.force_renew().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use cloudbox_core::events::{ClientEvent, EventPayload};
    use cloudbox_core::types::QuotaSnapshot;
    use tokio::sync::broadcast;

    use super::*;
    use crate::testing::{Call, ScriptedTransport};

    const MB: u64 = 1024 * 1024;

    /// Token source that counts renewals.
    #[derive(Debug, Default)]
    struct CountingTokens {
        renewals: AtomicUsize,
        renewal_fails: bool,
    }

    #[async_trait]
    impl TokenSource for CountingTokens {
        fn get_token(&self) -> Option<String> {
            Some("tok".to_string())
        }

        fn peek_token(&self) -> Option<String> {
            Some("tok".to_string())
        }

        async fn force_renew(&self) -> SessionState {
            self.renewals.fetch_add(1, Ordering::SeqCst);
            self.state()
        }

        fn state(&self) -> SessionState {
            if self.renewal_fails {
                SessionState::Expired
            } else {
                SessionState::Active
            }
        }
    }

    fn queue_with(
        transport: &Arc<ScriptedTransport>,
        tokens: Arc<CountingTokens>,
    ) -> (UploadQueue, broadcast::Receiver<ClientEvent>) {
        let events = EventBus::new(1024);
        let rx = events.subscribe();
        let queue = UploadQueue::new(
            transport.clone(),
            tokens,
            events,
            UploadConfig::default(),
        );
        (queue, rx)
    }

    fn file(name: &str, size: u64) -> UploadSource {
        UploadSource::from_bytes(name, vec![0u8; size as usize])
    }

    fn upload_events(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<UploadEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EventPayload::Upload(e) = event.payload {
                out.push(e);
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_admission_reports_rejected_files() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_quota(QuotaSnapshot::from_usage(90 * MB, 100 * MB));
        let (queue, mut rx) = queue_with(&transport, Arc::default());

        let report = queue
            .submit(vec![file("a", 6 * MB), file("b", 6 * MB)], "docs")
            .await
            .unwrap();

        assert_eq!(report.admitted.len(), 1);
        assert_eq!(report.admitted[0].name, "a");
        assert_eq!(report.rejected, vec!["b".to_string()]);
        queue.wait_idle().await;

        let events = upload_events(&mut rx);
        let rejected: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                UploadEvent::Rejected { files, .. } => Some(files.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(rejected, vec![vec!["b".to_string()]]);
        assert_eq!(transport.upload_order(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_bytes_count_against_next_batch() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_quota(QuotaSnapshot::from_usage(0, 10));
        transport.set_upload_delay(Duration::from_secs(10));
        let (queue, _rx) = queue_with(&transport, Arc::default());

        let first = queue.submit(vec![file("a", 6)], "").await.unwrap();
        let second = queue.submit(vec![file("b", 6)], "").await.unwrap();

        assert!(first.fully_admitted());
        assert_eq!(second.remaining, 4);
        assert_eq!(second.rejected, vec!["b".to_string()]);
        queue.wait_idle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_name_is_rejected_before_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let (queue, _rx) = queue_with(&transport, Arc::default());

        let err = queue.submit(vec![file("a:b", 1)], "").await.unwrap_err();

        assert_eq!(err.kind, cloudbox_core::ErrorKind::Validation);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_names_are_uploaded_trimmed() {
        let transport = Arc::new(ScriptedTransport::new());
        let (queue, mut rx) = queue_with(&transport, Arc::default());

        let report = queue.submit(vec![file("  notes.txt ", 3)], "").await.unwrap();
        queue.wait_idle().await;

        assert_eq!(report.admitted[0].name, "notes.txt");
        assert_eq!(transport.upload_order(), vec!["notes.txt"]);
        assert!(upload_events(&mut rx).iter().any(|e| matches!(
            e,
            UploadEvent::Completed { name, .. } if name == "notes.txt"
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_rejection_fails_item_and_queue_continues() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_upload(Err(crate::transport::http::upload_rejection(
            reqwest::StatusCode::INSUFFICIENT_STORAGE,
            "",
        )));
        let (queue, mut rx) = queue_with(&transport, Arc::default());

        queue.submit(vec![file("a", 1), file("b", 1)], "").await.unwrap();
        queue.wait_idle().await;

        let events = upload_events(&mut rx);
        let failure = events.iter().find_map(|e| match e {
            UploadEvent::Failed { name, error, .. } => Some((name.clone(), error.clone())),
            _ => None,
        });
        let (name, error) = failure.unwrap();
        assert_eq!(name, "a");
        assert!(error.is_quota_rejection());
        assert!(error.to_string().contains("quota"));
        assert_eq!(transport.upload_order(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_transfer_one_at_a_time_in_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_upload_delay(Duration::from_secs(3));
        let (queue, _rx) = queue_with(&transport, Arc::default());

        queue
            .submit(vec![file("1", 10), file("2", 10), file("3", 10)], "")
            .await
            .unwrap();
        assert_eq!(queue.len(), 3);
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(queue.items()[0], ("1".to_string(), ItemState::Active));
        assert_eq!(queue.len(), 3);

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(queue.len(), 2);
        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(queue.len(), 1);

        queue.wait_idle().await;
        assert_eq!(queue.len(), 0);
        assert_eq!(transport.upload_order(), vec!["1", "2", "3"]);
        assert_eq!(transport.max_concurrent_uploads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_block_next_item() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_upload(Err(TransferError::Network {
            message: "connection reset".into(),
        }));
        transport.push_upload(Err(TransferError::Server {
            status: 500,
            message: "boom".into(),
        }));
        let (queue, mut rx) = queue_with(&transport, Arc::default());

        queue
            .submit(vec![file("a", 1), file("b", 1), file("c", 1)], "")
            .await
            .unwrap();
        queue.wait_idle().await;

        let events = upload_events(&mut rx);
        let failed = events
            .iter()
            .filter(|e| matches!(e, UploadEvent::Failed { .. }))
            .count();
        let completed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                UploadEvent::Completed { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(failed, 2);
        assert_eq!(completed, vec!["c"]);
        assert!(events.iter().any(|e| matches!(
            e,
            UploadEvent::Drained {
                succeeded: 1,
                failed: 2
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_distinct_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_upload_timeout(Some(Duration::from_secs(2)));
        transport.set_upload_delay(Duration::from_secs(60));
        let (queue, mut rx) = queue_with(&transport, Arc::default());

        queue.submit(vec![file("slow", 10)], "").await.unwrap();
        queue.wait_idle().await;

        let events = upload_events(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            UploadEvent::Failed {
                error: TransferError::Timeout { after },
                ..
            } if *after == Duration::from_secs(2)
        )));
        assert_eq!(transport.max_concurrent_uploads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_timeout_when_advertisement_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_upload_timeout(None);
        let (queue, _rx) = queue_with(&transport, Arc::default());

        queue.submit(vec![file("a", 1)], "").await.unwrap();
        queue.wait_idle().await;

        let timeouts: Vec<_> = transport
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload { timeout, .. } => Some(timeout),
                _ => None,
            })
            .collect();
        assert_eq!(timeouts, vec![Duration::from_secs(3 * 60 * 60)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_renews_during_long_transfer_and_stops_after() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_upload_delay(Duration::from_secs(12 * 60));
        let tokens = Arc::new(CountingTokens::default());
        let (queue, _rx) = queue_with(&transport, tokens.clone());

        queue.submit(vec![file("big", 100)], "").await.unwrap();
        queue.wait_idle().await;
        // One pre-flight renewal plus ticks at 5 and 10 minutes.
        assert_eq!(tokens.renewals.load(Ordering::SeqCst), 3);

        time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(tokens.renewals.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_renewal_still_attempts_upload() {
        let transport = Arc::new(ScriptedTransport::new());
        let tokens = Arc::new(CountingTokens {
            renewals: AtomicUsize::new(0),
            renewal_fails: true,
        });
        let (queue, mut rx) = queue_with(&transport, tokens.clone());

        queue.submit(vec![file("a", 1)], "").await.unwrap();
        queue.wait_idle().await;

        assert_eq!(tokens.renewals.load(Ordering::SeqCst), 1);
        let tokens_used: Vec<_> = transport
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload { token, .. } => Some(token),
                _ => None,
            })
            .collect();
        assert_eq!(tokens_used, vec!["tok".to_string()]);
        assert!(upload_events(&mut rx)
            .iter()
            .any(|e| matches!(e, UploadEvent::Completed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_logged_in_fails_admission() {
        let transport = Arc::new(ScriptedTransport::new());
        let (queue, _rx) = queue_with(&transport, Arc::default());
        let logged_out = UploadQueue::new(
            transport.clone(),
            Arc::new(LoggedOut),
            EventBus::default(),
            UploadConfig::default(),
        );

        let err = logged_out.submit(vec![file("b", 1)], "").await.unwrap_err();

        assert!(err.is_authentication());
        assert!(queue.is_empty());
        assert!(transport.calls().is_empty());
    }

    #[derive(Debug)]
    struct LoggedOut;

    #[async_trait]
    impl TokenSource for LoggedOut {
        fn get_token(&self) -> Option<String> {
            None
        }

        fn peek_token(&self) -> Option<String> {
            None
        }

        async fn force_renew(&self) -> SessionState {
            SessionState::LoggedOut
        }

        fn state(&self) -> SessionState {
            SessionState::LoggedOut
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_renamed_receipt_is_reported_and_queue_proceeds() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_upload(Ok(UploadReceipt::Renamed {
            id: Some("X (1).ext".into()),
            original_name: "X.ext".into(),
            new_name: "X (1).ext".into(),
        }));
        let (queue, mut rx) = queue_with(&transport, Arc::default());

        queue
            .submit(vec![file("X.ext", 5), file("next.txt", 5)], "")
            .await
            .unwrap();
        queue.wait_idle().await;

        let receipts: Vec<_> = upload_events(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::Completed { receipt, .. } => Some(receipt),
                _ => None,
            })
            .collect();
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].stored_name(), "X (1).ext");
        assert!(matches!(receipts[1], UploadReceipt::Stored { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_pending_keeps_active_transfer() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_upload_delay(Duration::from_secs(5));
        let (queue, mut rx) = queue_with(&transport, Arc::default());

        queue
            .submit(vec![file("a", 1), file("b", 1), file("c", 1)], "")
            .await
            .unwrap();
        time::sleep(Duration::from_secs(1)).await;

        assert_eq!(queue.clear_pending(), 2);
        assert_eq!(queue.len(), 1);
        queue.wait_idle().await;

        assert_eq!(transport.upload_order(), vec!["a"]);
        assert!(upload_events(&mut rx)
            .iter()
            .any(|e| matches!(e, UploadEvent::Cleared { discarded: 2 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_requested_once_after_settle_delay() {
        let transport = Arc::new(ScriptedTransport::new());
        let events = EventBus::new(1024);
        let mut rx = events.subscribe();
        let queue = UploadQueue::new(
            transport.clone(),
            Arc::new(CountingTokens::default()),
            events,
            UploadConfig::default(),
        );

        queue
            .submit(vec![file("a", 1), file("b", 1)], "")
            .await
            .unwrap();

        let mut drained_at = None;
        let mut refreshes = Vec::new();
        while refreshes.is_empty() {
            let event = rx.recv().await.unwrap();
            match event.payload {
                EventPayload::Upload(UploadEvent::Drained { .. }) => {
                    drained_at = Some(Instant::now())
                }
                EventPayload::Listing(ListingEvent::RefreshRequested { .. }) => {
                    refreshes.push(Instant::now())
                }
                _ => {}
            }
        }
        let drained_at = drained_at.unwrap();
        assert_eq!(refreshes[0] - drained_at, Duration::from_millis(500));
        queue.wait_idle().await;
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(
                event.payload,
                EventPayload::Listing(ListingEvent::RefreshRequested { .. })
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events_carry_fraction() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_upload_delay(Duration::from_secs(2));
        let (queue, mut rx) = queue_with(&transport, Arc::default());

        queue.submit(vec![file("a", 1000)], "").await.unwrap();
        queue.wait_idle().await;

        let fractions: Vec<f64> = upload_events(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::Progress { fraction, .. } => Some(fraction),
                _ => None,
            })
            .collect();
        assert_eq!(fractions.last().copied(), Some(1.0));
        assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
    }
}
