//! Scripted in-memory [`Transport`] for tests.
//!
//! Records every call and answers from programmable queues, falling back
//! to a well-behaved default when a queue is empty.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use cloudbox_core::error::{AppError, TransferError};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::Transport;
use cloudbox_core::types::{
    FileRecord, ItemId, MoveReceipt, ProgressFn, QuotaSnapshot, RefreshGrant, SessionUser,
    TokenGrant, UploadReceipt, UploadSource, Validation,
};

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exchange(String),
    Refresh(String),
    Logout(String),
    Validate(String),
    Touch(String),
    Quota,
    ListFiles,
    ListFolders,
    ListTrash,
    ListTrashFolders,
    UploadTimeout,
    Upload {
        token: String,
        name: String,
        target: String,
        timeout: Duration,
    },
    Download(String),
    CreateFolder(String),
    Move { id: String, target: String },
    Rename { id: String, name: String },
    DeleteFile(String),
    DeleteFolder(String),
    Restore(String),
    Purge(String),
    ClearTrash,
    CreateShare(String),
    DeleteShare(String),
}

#[derive(Debug, Default)]
struct Listing {
    files: Vec<FileRecord>,
    folders: Vec<String>,
    trash: Vec<FileRecord>,
    trash_folders: Vec<String>,
}

#[derive(Debug)]
struct Script {
    exchange_error: Option<AppError>,
    refreshes: VecDeque<AppResult<RefreshGrant>>,
    refresh_delay: Duration,
    validations: VecDeque<AppResult<Validation>>,
    touch_delay: Duration,
    touch_error: Option<AppError>,
    logout_error: bool,
    quota: QuotaSnapshot,
    uploads: VecDeque<Result<UploadReceipt, TransferError>>,
    upload_delay: Duration,
    upload_timeout: Option<Duration>,
    item_delay: Duration,
    listing: Listing,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            exchange_error: None,
            refreshes: VecDeque::new(),
            refresh_delay: Duration::ZERO,
            validations: VecDeque::new(),
            touch_delay: Duration::ZERO,
            touch_error: None,
            logout_error: false,
            quota: QuotaSnapshot::from_usage(0, 1 << 30),
            uploads: VecDeque::new(),
            upload_delay: Duration::ZERO,
            upload_timeout: Some(Duration::from_secs(60 * 60)),
            item_delay: Duration::ZERO,
            listing: Listing::default(),
        }
    }
}

/// In-memory transport with scripted answers.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    calls: Mutex<Vec<Call>>,
    script: Mutex<Script>,
    item_failures: DashMap<String, AppError>,
    contents: DashMap<String, Bytes>,
    refreshes: AtomicUsize,
    active_uploads: AtomicUsize,
    max_active_uploads: AtomicUsize,
}

impl ScriptedTransport {
    /// Transport where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of refresh requests received.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// File names in the order their uploads started.
    pub fn upload_order(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Highest number of uploads that were in progress at once.
    pub fn max_concurrent_uploads(&self) -> usize {
        self.max_active_uploads.load(Ordering::SeqCst)
    }

    /// Make the bootstrap exchange fail.
    pub fn set_exchange_error(&self, error: AppError) {
        self.script().exchange_error = Some(error);
    }

    /// Queue the answer to the next refresh call.
    pub fn push_refresh(&self, result: AppResult<RefreshGrant>) {
        self.script().refreshes.push_back(result);
    }

    /// Delay every refresh answer.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.script().refresh_delay = delay;
    }

    /// Queue the answer to the next validate call.
    pub fn push_validate(&self, result: AppResult<Validation>) {
        self.script().validations.push_back(result);
    }

    /// Delay every touch answer.
    pub fn set_touch_delay(&self, delay: Duration) {
        self.script().touch_delay = delay;
    }

    /// Make every touch fail with `error`.
    pub fn set_touch_error(&self, error: Option<AppError>) {
        self.script().touch_error = error;
    }

    /// Make server-side logout fail.
    pub fn set_logout_error(&self, fail: bool) {
        self.script().logout_error = fail;
    }

    /// Quota answer.
    pub fn set_quota(&self, quota: QuotaSnapshot) {
        self.script().quota = quota;
    }

    /// Queue the outcome of the next upload.
    pub fn push_upload(&self, result: Result<UploadReceipt, TransferError>) {
        self.script().uploads.push_back(result);
    }

    /// Time every upload takes.
    pub fn set_upload_delay(&self, delay: Duration) {
        self.script().upload_delay = delay;
    }

    /// Advertised upload timeout; `None` makes the call fail.
    pub fn set_upload_timeout(&self, timeout: Option<Duration>) {
        self.script().upload_timeout = timeout;
    }

    /// Time every single-item operation takes.
    pub fn set_item_delay(&self, delay: Duration) {
        self.script().item_delay = delay;
    }

    /// Make item operations on `id` fail with `error`.
    pub fn fail_item(&self, id: impl Into<String>, error: AppError) {
        self.item_failures.insert(id.into(), error);
    }

    /// Content served for downloads of `id`. Unset ids serve their own id.
    pub fn set_content(&self, id: impl Into<String>, content: impl Into<Bytes>) {
        self.contents.insert(id.into(), content.into());
    }

    /// Listing answers outside the trash.
    pub fn set_listing(&self, files: Vec<FileRecord>, folders: Vec<String>) {
        let mut script = self.script();
        script.listing.files = files;
        script.listing.folders = folders;
    }

    /// Listing answers inside the trash.
    pub fn set_trash(&self, files: Vec<FileRecord>, folders: Vec<String>) {
        let mut script = self.script();
        script.listing.trash = files;
        script.listing.trash_folders = folders;
    }

    async fn item_op(&self, call: Call, id: &str) -> AppResult<()> {
        self.record(call);
        let delay = self.script().item_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.item_failures.get(id) {
            Some(error) => Err(error.value().clone()),
            None => Ok(()),
        }
    }
}

/// Tracks in-progress uploads, also when a timed-out upload is dropped.
struct UploadSlot<'a> {
    active: &'a AtomicUsize,
}

impl<'a> UploadSlot<'a> {
    fn enter(active: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for UploadSlot<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn exchange_bootstrap_token(&self, token: &str) -> AppResult<TokenGrant> {
        self.record(Call::Exchange(token.to_string()));
        let error = self.script().exchange_error.clone();
        if let Some(error) = error {
            return Err(error);
        }
        Ok(TokenGrant {
            access_token: "access-0".to_string(),
            refresh_token: Some("refresh-0".to_string()),
            user: Some("tester".to_string()),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<RefreshGrant> {
        self.record(Call::Refresh(refresh_token.to_string()));
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        let (delay, scripted) = {
            let mut script = self.script();
            (script.refresh_delay, script.refreshes.pop_front())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        scripted.unwrap_or_else(|| {
            Ok(RefreshGrant {
                access_token: format!("access-{n}"),
                refresh_token: None,
            })
        })
    }

    async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        self.record(Call::Logout(refresh_token.to_string()));
        if self.script().logout_error {
            return Err(AppError::network("connection refused"));
        }
        Ok(())
    }

    async fn validate(&self, access_token: &str) -> AppResult<Validation> {
        self.record(Call::Validate(access_token.to_string()));
        let scripted = self.script().validations.pop_front();
        scripted.unwrap_or_else(|| {
            Ok(Validation::Valid(SessionUser {
                display_name: "tester".to_string(),
                is_admin: false,
            }))
        })
    }

    async fn touch(&self, token: &str) -> AppResult<()> {
        self.record(Call::Touch(token.to_string()));
        let (delay, error) = {
            let script = self.script();
            (script.touch_delay, script.touch_error.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        error.map_or(Ok(()), Err)
    }

    async fn quota(&self, _token: &str) -> AppResult<QuotaSnapshot> {
        self.record(Call::Quota);
        Ok(self.script().quota)
    }

    async fn list_files(&self, _token: &str) -> AppResult<Vec<FileRecord>> {
        self.record(Call::ListFiles);
        Ok(self.script().listing.files.clone())
    }

    async fn list_folders(&self, _token: &str) -> AppResult<Vec<String>> {
        self.record(Call::ListFolders);
        Ok(self.script().listing.folders.clone())
    }

    async fn list_trash(&self, _token: &str) -> AppResult<Vec<FileRecord>> {
        self.record(Call::ListTrash);
        Ok(self.script().listing.trash.clone())
    }

    async fn list_trash_folders(&self, _token: &str) -> AppResult<Vec<String>> {
        self.record(Call::ListTrashFolders);
        Ok(self.script().listing.trash_folders.clone())
    }

    async fn upload_timeout(&self, _token: &str) -> AppResult<Duration> {
        self.record(Call::UploadTimeout);
        self.script()
            .upload_timeout
            .ok_or_else(|| AppError::server("upload timeout unavailable"))
    }

    async fn upload(
        &self,
        token: &str,
        source: &UploadSource,
        target_path: &str,
        timeout: Duration,
        progress: ProgressFn,
    ) -> Result<UploadReceipt, TransferError> {
        self.record(Call::Upload {
            token: token.to_string(),
            name: source.name.clone(),
            target: target_path.to_string(),
            timeout,
        });
        let _slot = UploadSlot::enter(&self.active_uploads, &self.max_active_uploads);

        progress(source.size / 2);
        let delay = self.script().upload_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script().uploads.pop_front();
        let result = scripted.unwrap_or_else(|| {
            let id = if target_path.is_empty() {
                source.name.clone()
            } else {
                format!("{target_path}/{}", source.name)
            };
            Ok(UploadReceipt::Stored {
                id: Some(id),
                name: source.name.clone(),
            })
        });
        if result.is_ok() {
            progress(source.size);
        }
        result
    }

    async fn download(
        &self,
        _token: &str,
        id: &ItemId,
        dest: &Path,
        progress: ProgressFn,
    ) -> AppResult<u64> {
        self.item_op(Call::Download(id.to_string()), id.as_str())
            .await?;
        let content = self
            .contents
            .get(id.as_str())
            .map(|c| c.value().clone())
            .unwrap_or_else(|| Bytes::from(id.to_string()));
        tokio::fs::write(dest, &content).await?;
        progress(content.len() as u64);
        Ok(content.len() as u64)
    }

    async fn create_folder(&self, _token: &str, path: &str) -> AppResult<()> {
        self.item_op(Call::CreateFolder(path.to_string()), path).await
    }

    async fn move_file(
        &self,
        _token: &str,
        id: &ItemId,
        target_folder: &str,
    ) -> AppResult<MoveReceipt> {
        let call = Call::Move {
            id: id.to_string(),
            target: target_folder.to_string(),
        };
        self.item_op(call, id.as_str()).await?;
        Ok(MoveReceipt::default())
    }

    async fn rename(&self, _token: &str, id: &ItemId, new_name: &str) -> AppResult<()> {
        let call = Call::Rename {
            id: id.to_string(),
            name: new_name.to_string(),
        };
        self.item_op(call, id.as_str()).await
    }

    async fn delete_file(&self, _token: &str, id: &ItemId) -> AppResult<()> {
        self.item_op(Call::DeleteFile(id.to_string()), id.as_str()).await
    }

    async fn delete_folder(&self, _token: &str, path: &str) -> AppResult<()> {
        self.item_op(Call::DeleteFolder(path.to_string()), path).await
    }

    async fn restore(&self, _token: &str, id: &ItemId) -> AppResult<()> {
        self.item_op(Call::Restore(id.to_string()), id.as_str()).await
    }

    async fn purge(&self, _token: &str, id: &ItemId) -> AppResult<()> {
        self.item_op(Call::Purge(id.to_string()), id.as_str()).await
    }

    async fn clear_trash(&self, _token: &str) -> AppResult<()> {
        self.item_op(Call::ClearTrash, "").await
    }

    async fn create_share(&self, _token: &str, id: &ItemId) -> AppResult<String> {
        self.item_op(Call::CreateShare(id.to_string()), id.as_str())
            .await?;
        Ok(format!("/share/{}", id.name()))
    }

    async fn delete_share(&self, _token: &str, id: &ItemId) -> AppResult<()> {
        self.item_op(Call::DeleteShare(id.to_string()), id.as_str()).await
    }
}
