//! The owned object tying one session's components together.

use std::sync::Arc;

use tracing::info;

use cloudbox_core::config::{ClientConfig, SessionMode};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::{CredentialStore, Transport};
use cloudbox_core::types::SessionUser;

use crate::browser::Browser;
use crate::events::EventBus;
use crate::session::{FileCredentialStore, IdleSession, SessionState, SessionTokenManager, TokenSource};
use crate::transport::HttpTransport;
use crate::upload::UploadQueue;

/// The configured session model. Exactly one exists per context.
#[derive(Debug, Clone)]
pub enum Session {
    /// Access token rotated with a refresh token.
    Rotating(SessionTokenManager),
    /// Single token kept alive by user activity.
    Idle(IdleSession),
}

impl Session {
    /// Exchange a bootstrap token.
    pub async fn establish(&self, bootstrap_token: &str) -> AppResult<()> {
        match self {
            Self::Rotating(s) => s.establish(bootstrap_token).await,
            Self::Idle(s) => s.establish(bootstrap_token).await,
        }
    }

    /// Re-authenticate from stored credentials.
    pub async fn resume(&self) -> AppResult<SessionUser> {
        match self {
            Self::Rotating(s) => s.resume().await,
            Self::Idle(s) => s.resume().await,
        }
    }

    /// End the session.
    pub async fn logout(&self) {
        match self {
            Self::Rotating(s) => s.logout().await,
            Self::Idle(s) => s.logout().await,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        match self {
            Self::Rotating(s) => s.state(),
            Self::Idle(s) => s.state(),
        }
    }

    fn token_source(&self) -> Arc<dyn TokenSource> {
        match self {
            Self::Rotating(s) => Arc::new(s.clone()),
            Self::Idle(s) => Arc::new(s.clone()),
        }
    }
}

/// Session, upload queue and browser sharing one transport and event bus.
#[derive(Debug, Clone)]
pub struct ClientContext {
    config: ClientConfig,
    events: EventBus,
    transport: Arc<dyn Transport>,
    session: Session,
    uploads: UploadQueue,
    browser: Browser,
}

impl ClientContext {
    /// Build a context talking HTTP and persisting credentials to the
    /// configured file.
    pub fn new(config: ClientConfig) -> AppResult<Self> {
        let transport = Arc::new(HttpTransport::new(&config.api)?);
        let store = Arc::new(FileCredentialStore::new(
            config.storage.credentials_path.clone(),
        ));
        Ok(Self::with_parts(config, transport, store))
    }

    /// Build a context over an arbitrary transport and store.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let events = EventBus::new(config.events.buffer_size);
        let session = match config.session.mode {
            SessionMode::Rotating => Session::Rotating(SessionTokenManager::new(
                transport.clone(),
                store,
                events.clone(),
                config.session.clone(),
            )),
            SessionMode::Idle => Session::Idle(IdleSession::new(
                transport.clone(),
                store,
                events.clone(),
                config.session.clone(),
            )),
        };
        let tokens = session.token_source();
        let uploads = UploadQueue::new(
            transport.clone(),
            tokens.clone(),
            events.clone(),
            config.upload.clone(),
        );
        let browser = Browser::new(
            transport.clone(),
            tokens,
            events.clone(),
            config.api.clone(),
        );

        Self {
            config,
            events,
            transport,
            session,
            uploads,
            browser,
        }
    }

    /// Sign in with a one-time bootstrap token.
    pub async fn login(&self, bootstrap_token: &str) -> AppResult<()> {
        self.session.establish(bootstrap_token).await?;
        self.browser.spawn_refresh_listener();
        Ok(())
    }

    /// Restore the stored session.
    pub async fn resume(&self) -> AppResult<SessionUser> {
        let user = self.session.resume().await?;
        self.browser.spawn_refresh_listener();
        Ok(user)
    }

    /// Sign out: drop queued uploads and the selection, then end the session.
    pub async fn logout(&self) {
        let dropped = self.uploads.clear_pending();
        self.browser.clear_selection();
        self.session.logout().await;
        info!(dropped_uploads = dropped, "Signed out");
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Loaded configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Event bus shared by every component.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Transport shared by every component.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// The session model in use.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Upload queue.
    pub fn uploads(&self) -> &UploadQueue {
        &self.uploads
    }

    /// File browser.
    pub fn browser(&self) -> &Browser {
        &self.browser
    }
}
