//! The narrow interface through which the client talks to the service.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransferError;
use crate::result::AppResult;
use crate::types::{
    FileRecord, ItemId, MoveReceipt, ProgressFn, QuotaSnapshot, RefreshGrant, TokenGrant,
    UploadReceipt, UploadSource, Validation,
};

/// Remote API boundary.
///
/// The concrete binding is `HttpTransport` over the REST endpoints; tests
/// substitute a scripted implementation. Every method is a suspension
/// point; nothing else in the core awaits.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug + 'static {
    /// Exchange a one-time bootstrap token for a credential pair.
    async fn exchange_bootstrap_token(&self, token: &str) -> AppResult<TokenGrant>;

    /// Mint a new access token.
    async fn refresh(&self, refresh_token: &str) -> AppResult<RefreshGrant>;

    /// Invalidate the refresh token server-side. Callers ignore failures.
    async fn logout(&self, refresh_token: &str) -> AppResult<()>;

    /// Ask whether an access token is still valid.
    async fn validate(&self, access_token: &str) -> AppResult<Validation>;

    /// Idle mode: extend the server-side session.
    async fn touch(&self, token: &str) -> AppResult<()>;

    /// Current quota usage.
    async fn quota(&self, token: &str) -> AppResult<QuotaSnapshot>;

    /// Files outside the trash.
    async fn list_files(&self, token: &str) -> AppResult<Vec<FileRecord>>;

    /// Folder paths outside the trash.
    async fn list_folders(&self, token: &str) -> AppResult<Vec<String>>;

    /// Trash entries.
    async fn list_trash(&self, token: &str) -> AppResult<Vec<FileRecord>>;

    /// Folder paths inside the trash.
    async fn list_trash_folders(&self, token: &str) -> AppResult<Vec<String>>;

    /// Server-advertised per-upload timeout.
    async fn upload_timeout(&self, token: &str) -> AppResult<Duration>;

    /// Upload one file whole. `progress` receives cumulative bytes sent.
    async fn upload(
        &self,
        token: &str,
        source: &UploadSource,
        target_path: &str,
        timeout: Duration,
        progress: ProgressFn,
    ) -> Result<UploadReceipt, TransferError>;

    /// Download a stored file into `dest`. `progress` receives cumulative
    /// bytes received. Returns the number of bytes written.
    async fn download(
        &self,
        token: &str,
        id: &ItemId,
        dest: &Path,
        progress: ProgressFn,
    ) -> AppResult<u64>;

    /// Create a folder (and missing parents).
    async fn create_folder(&self, token: &str, path: &str) -> AppResult<()>;

    /// Move a file into another folder.
    async fn move_file(&self, token: &str, id: &ItemId, target_folder: &str)
    -> AppResult<MoveReceipt>;

    /// Rename a file or folder.
    async fn rename(&self, token: &str, id: &ItemId, new_name: &str) -> AppResult<()>;

    /// Move a file to the trash.
    async fn delete_file(&self, token: &str, id: &ItemId) -> AppResult<()>;

    /// Move a folder to the trash.
    async fn delete_folder(&self, token: &str, path: &str) -> AppResult<()>;

    /// Restore a trash entry.
    async fn restore(&self, token: &str, id: &ItemId) -> AppResult<()>;

    /// Permanently delete a trash entry.
    async fn purge(&self, token: &str, id: &ItemId) -> AppResult<()>;

    /// Permanently delete everything in the trash.
    async fn clear_trash(&self, token: &str) -> AppResult<()>;

    /// Create (or fetch the existing) share link; returns a server-relative URL.
    async fn create_share(&self, token: &str, id: &ItemId) -> AppResult<String>;

    /// Remove a share link.
    async fn delete_share(&self, token: &str, id: &ItemId) -> AppResult<()>;
}
