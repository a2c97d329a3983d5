//! File browser: listing snapshots, view state, selection, and the
//! operations that change remote state.
//!
//! Every successful operation reloads the listing exactly once. Listings
//! are published as whole `Arc<Listing>` snapshots, so readers never see a
//! half-updated tree.

pub mod listing;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cloudbox_core::config::ApiConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::events::{
    BulkOperation, BulkReport, ClientEvent, EventPayload, ListingEvent, SelectionEvent,
    SelectionState,
};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::Transport;
use cloudbox_core::types::{ItemId, MoveReceipt, ProgressFn};

use crate::events::EventBus;
use crate::selection::{BulkRunner, SelectionSet};
use crate::session::TokenSource;
use crate::validation::{join_path, normalize_path, validate_name};

pub use listing::{Listing, View};

struct Inner {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenSource>,
    events: EventBus,
    api: ApiConfig,
    bulk: BulkRunner,
    listing: watch::Sender<Arc<Listing>>,
    view: Mutex<View>,
    selection: Mutex<SelectionSet>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

/// Listing, navigation and item operations for one session.
#[derive(Clone)]
pub struct Browser {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Browser")
            .field("view", &self.view())
            .field("selected", &self.selection_len())
            .finish()
    }
}

impl Browser {
    /// Create a browser with an empty listing at the root of the files view.
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenSource>,
        events: EventBus,
        api: ApiConfig,
    ) -> Self {
        let bulk = BulkRunner::new(transport.clone(), tokens.clone(), events.clone());
        let (listing, _) = watch::channel(Arc::new(Listing::default()));
        Self {
            inner: Arc::new(Inner {
                transport,
                tokens,
                events,
                api,
                bulk,
                listing,
                view: Mutex::new(View::default()),
                selection: Mutex::new(SelectionSet::new()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Latest published listing.
    pub fn listing(&self) -> Arc<Listing> {
        self.inner.listing.borrow().clone()
    }

    /// Receive every listing published from now on.
    pub fn watch_listing(&self) -> watch::Receiver<Arc<Listing>> {
        self.inner.listing.subscribe()
    }

    /// Reload files, folders, trash, trash folders and quota concurrently
    /// and publish them as one snapshot.
    pub async fn refresh(&self) -> AppResult<Arc<Listing>> {
        let token = self.token()?;
        let t = &self.inner.transport;
        let (files, folders, trash, trash_folders, quota) = tokio::try_join!(
            t.list_files(&token),
            t.list_folders(&token),
            t.list_trash(&token),
            t.list_trash_folders(&token),
            t.quota(&token),
        )?;

        let listing = Arc::new(Listing::new(files, folders, trash, trash_folders, quota));
        debug!(
            files = listing.files.len(),
            folders = listing.folders.len(),
            trash = listing.trash.len(),
            "Listing refreshed"
        );
        self.inner.listing.send_replace(listing.clone());
        self.inner.events.publish(ListingEvent::Refreshed {
            files: listing.files.len(),
            folders: listing.folders.len(),
            trash: listing.trash.len(),
        });
        Ok(listing)
    }

    /// Reload whenever something publishes [`ListingEvent::RefreshRequested`].
    ///
    /// The task stops with the last browser handle.
    pub fn spawn_refresh_listener(&self) {
        let rx = self.inner.events.subscribe();
        let handle = tokio::spawn(refresh_listener(Arc::downgrade(&self.inner), rx));
        if let Some(old) = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            old.abort();
        }
    }

    // -- View and selection --

    /// Current view.
    pub fn view(&self) -> View {
        self.lock_view().clone()
    }

    /// Switch views. Any change clears the selection.
    pub fn navigate(&self, view: View) -> AppResult<()> {
        let view = view.with_path(normalize_path(view.path())?);
        {
            let mut current = self.lock_view();
            if *current == view {
                return Ok(());
            }
            *current = view;
        }
        self.clear_selection();
        Ok(())
    }

    /// Open a folder in the current mode.
    pub fn open_folder(&self, path: &str) -> AppResult<()> {
        let view = self.view().with_path(path.to_string());
        self.navigate(view)
    }

    /// Ids visible in the current view.
    pub fn visible_ids(&self) -> Vec<ItemId> {
        self.listing().visible_ids(&self.view())
    }

    /// Select an item.
    pub fn select(&self, id: ItemId) {
        let changed = self.lock_selection().add(id);
        self.selection_changed(changed);
    }

    /// Deselect an item.
    pub fn deselect(&self, id: &ItemId) {
        let changed = self.lock_selection().remove(id);
        self.selection_changed(changed);
    }

    /// Flip an item's selection.
    pub fn toggle(&self, id: ItemId) {
        self.lock_selection().toggle(id);
        self.selection_changed(true);
    }

    /// Select everything in the current view.
    pub fn select_all_visible(&self) {
        let visible = self.visible_ids();
        let changed = self.lock_selection().select_all(&visible);
        self.selection_changed(changed);
    }

    /// Deselect everything.
    pub fn clear_selection(&self) {
        if self.lock_selection().clear() {
            self.inner.events.publish(SelectionEvent::Cleared);
        }
    }

    /// Selected ids.
    pub fn selection(&self) -> Vec<ItemId> {
        self.lock_selection().snapshot()
    }

    /// Number of selected ids.
    pub fn selection_len(&self) -> usize {
        self.lock_selection().len()
    }

    /// Select-all checkbox state for the current view.
    pub fn selection_state(&self) -> SelectionState {
        let visible = self.visible_ids();
        self.lock_selection().tri_state(&visible)
    }

    // -- Single-item operations --

    /// Create `name` inside the current folder. Returns the new path.
    pub async fn create_folder(&self, name: &str) -> AppResult<String> {
        let path = join_path(self.view().path(), name)?;
        self.create_folder_at(&path).await?;
        Ok(path)
    }

    /// Create a folder at an absolute path, with missing parents.
    pub async fn create_folder_at(&self, path: &str) -> AppResult<()> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Err(AppError::validation("Folder path must not be empty"));
        }
        let token = self.token()?;
        self.inner.transport.create_folder(&token, &path).await?;
        info!(path = %path, "Folder created");
        self.refresh_after("folder created").await;
        Ok(())
    }

    /// Rename a file or folder.
    pub async fn rename(&self, id: &ItemId, new_name: &str) -> AppResult<()> {
        let new_name = validate_name(new_name)?;
        let token = self.token()?;
        self.inner.transport.rename(&token, id, new_name).await?;
        info!(id = %id, new_name = %new_name, "Item renamed");
        self.refresh_after("item renamed").await;
        Ok(())
    }

    /// Move a file into `target_folder`.
    pub async fn move_item(&self, id: &ItemId, target_folder: &str) -> AppResult<MoveReceipt> {
        let target = normalize_path(target_folder)?;
        let token = self.token()?;
        let receipt = self.inner.transport.move_file(&token, id, &target).await?;
        if receipt.renamed {
            info!(id = %id, target = %target, new_name = ?receipt.new_name, "Item moved and renamed");
        } else {
            info!(id = %id, target = %target, "Item moved");
        }
        self.refresh_after("item moved").await;
        Ok(receipt)
    }

    /// Create (or fetch) a share link. Returns the absolute URL.
    pub async fn share(&self, id: &ItemId) -> AppResult<String> {
        let token = self.token()?;
        let relative = self.inner.transport.create_share(&token, id).await?;
        let url = self.inner.api.absolute_url(&relative);
        info!(id = %id, url = %url, "Share link created");
        self.refresh_after("share created").await;
        Ok(url)
    }

    /// Download a file. A directory `dest` receives the file under its
    /// stored name. Returns the written path and byte count.
    ///
    /// Nothing changes remotely, so the listing is not reloaded.
    pub async fn download(
        &self,
        id: &ItemId,
        dest: &Path,
        progress: ProgressFn,
    ) -> AppResult<(PathBuf, u64)> {
        let name = validate_name(id.name())?;
        let target = if tokio::fs::metadata(dest).await.is_ok_and(|m| m.is_dir()) {
            dest.join(name)
        } else {
            dest.to_path_buf()
        };

        let token = self.token()?;
        let written = self
            .inner
            .transport
            .download(&token, id, &target, progress)
            .await?;
        info!(id = %id, path = %target.display(), bytes = written, "File downloaded");
        Ok((target, written))
    }

    /// Remove a share link.
    pub async fn unshare(&self, id: &ItemId) -> AppResult<()> {
        let token = self.token()?;
        self.inner.transport.delete_share(&token, id).await?;
        self.refresh_after("share removed").await;
        Ok(())
    }

    /// Move a file to the trash.
    pub async fn delete_file(&self, id: &ItemId) -> AppResult<()> {
        let token = self.token()?;
        self.inner.transport.delete_file(&token, id).await?;
        self.refresh_after("file deleted").await;
        Ok(())
    }

    /// Move a folder and its contents to the trash.
    pub async fn delete_folder(&self, path: &str) -> AppResult<()> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Err(AppError::validation("Cannot delete the root folder"));
        }
        let token = self.token()?;
        self.inner.transport.delete_folder(&token, &path).await?;
        self.refresh_after("folder deleted").await;
        Ok(())
    }

    /// Restore a trash entry.
    pub async fn restore(&self, id: &ItemId) -> AppResult<()> {
        let token = self.token()?;
        self.inner.transport.restore(&token, id).await?;
        self.refresh_after("item restored").await;
        Ok(())
    }

    /// Permanently delete a trash entry.
    pub async fn purge(&self, id: &ItemId) -> AppResult<()> {
        let token = self.token()?;
        self.inner.transport.purge(&token, id).await?;
        self.refresh_after("item purged").await;
        Ok(())
    }

    /// Permanently delete everything in the trash.
    pub async fn clear_trash(&self) -> AppResult<()> {
        let token = self.token()?;
        self.inner.transport.clear_trash(&token).await?;
        info!("Trash cleared");
        self.refresh_after("trash cleared").await;
        Ok(())
    }

    // -- Bulk operations over the selection --

    /// Move every selected file to the trash.
    pub async fn bulk_delete(&self) -> AppResult<BulkReport> {
        self.run_bulk(BulkOperation::Delete).await
    }

    /// Move every selected file into `target`.
    pub async fn bulk_move(&self, target: &str) -> AppResult<BulkReport> {
        let target = normalize_path(target)?;
        self.run_bulk(BulkOperation::Move { target }).await
    }

    /// Restore every selected trash entry.
    pub async fn bulk_restore(&self) -> AppResult<BulkReport> {
        self.run_bulk(BulkOperation::Restore).await
    }

    /// Permanently delete every selected trash entry.
    pub async fn bulk_purge(&self) -> AppResult<BulkReport> {
        self.run_bulk(BulkOperation::Purge).await
    }

    async fn run_bulk(&self, operation: BulkOperation) -> AppResult<BulkReport> {
        let ids = self.selection();
        if ids.is_empty() {
            return Err(AppError::validation("Nothing selected"));
        }
        let report = self.inner.bulk.execute(operation, ids).await?;
        self.clear_selection();
        self.refresh_after("bulk operation finished").await;
        Ok(report)
    }

    // -- Helpers --

    fn token(&self) -> AppResult<String> {
        self.inner
            .tokens
            .get_token()
            .ok_or_else(|| AppError::authentication("Not logged in"))
    }

    /// The operation already succeeded; a failed reload only logs.
    async fn refresh_after(&self, cause: &str) {
        if let Err(e) = self.refresh().await {
            warn!(cause = %cause, error = %e, "Listing refresh failed");
        }
    }

    fn selection_changed(&self, changed: bool) {
        if changed {
            let count = self.selection_len();
            self.inner.events.publish(SelectionEvent::Changed { count });
        }
    }

    fn lock_view(&self) -> MutexGuard<'_, View> {
        self.inner.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_selection(&self) -> MutexGuard<'_, SelectionSet> {
        self.inner
            .selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn refresh_listener(inner: Weak<Inner>, mut rx: broadcast::Receiver<ClientEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Refresh listener lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        let EventPayload::Listing(ListingEvent::RefreshRequested { cause }) = event.payload else {
            continue;
        };
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let browser = Browser { inner };
        debug!(cause = %cause, "Refresh requested");
        browser.refresh_after(&cause).await;
    }
}
