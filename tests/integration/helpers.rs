//! Shared test helpers for integration tests.

use std::sync::Arc;
use std::time::Duration;

use cloudbox_client::ClientContext;
use cloudbox_client::session::MemoryCredentialStore;
use cloudbox_client::testing::ScriptedTransport;
use cloudbox_core::config::{ClientConfig, SessionMode};
use cloudbox_core::events::{ClientEvent, EventPayload};
use cloudbox_core::traits::CredentialStore;
use cloudbox_core::types::{FileRecord, ItemId};
use tokio::sync::broadcast;

/// Test application context
pub struct TestApp {
    /// Context under test
    pub ctx: ClientContext,
    /// Scripted server
    pub transport: Arc<ScriptedTransport>,
    /// Credential storage
    pub store: Arc<MemoryCredentialStore>,
}

impl TestApp {
    /// Rotating-mode client with nothing stored
    pub fn new() -> Self {
        Self::with_mode(SessionMode::Rotating)
    }

    /// Client in the given session mode
    pub fn with_mode(mode: SessionMode) -> Self {
        let mut config = ClientConfig::default();
        config.session.mode = mode;
        config.api.base_url = "https://cloud.example.com".to_string();
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryCredentialStore::new());
        let ctx = ClientContext::with_parts(config, transport.clone(), store.clone());
        Self {
            ctx,
            transport,
            store,
        }
    }

    /// Sign in with a bootstrap token
    pub async fn login(&self) {
        self.ctx.login("bootstrap").await.expect("login failed");
    }

    /// Pretend an earlier run left a credential pair behind
    pub fn store_credentials(&self, access: &str, refresh: &str) {
        self.store
            .set(cloudbox_core::traits::keys::ACCESS_TOKEN, access)
            .expect("store access token");
        self.store
            .set(cloudbox_core::traits::keys::REFRESH_TOKEN, refresh)
            .expect("store refresh token");
    }
}

/// A listing record
pub fn record(id: &str, size: u64) -> FileRecord {
    FileRecord {
        id: ItemId::from(id),
        filename: None,
        size,
        uploaded_at: None,
        shared: false,
        share_expires_at: None,
    }
}

/// Collect every event that arrives within `window`
pub async fn drain_events(
    rx: &mut broadcast::Receiver<ClientEvent>,
    window: Duration,
) -> Vec<EventPayload> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        events.push(event.payload);
    }
    events
}
