//! Activity-anchored session.
//!
//! A single session token stays valid as long as the user keeps
//! interacting. Every input event touches the server, and a local
//! countdown logs out once the idle timeout passes without input.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use cloudbox_core::config::SessionConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::events::{LogoutReason, SessionEvent};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::{CredentialStore, Transport, keys};
use cloudbox_core::types::{SessionUser, Validation};

use crate::events::EventBus;

use super::{SessionState, TokenSource};

/// Kind of user input that counts as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Pointer movement.
    Pointer,
    /// Key press.
    Key,
    /// Click.
    Click,
    /// Touch input.
    Touch,
}

#[derive(Debug, Clone)]
struct Snapshot {
    state: SessionState,
    token: Option<String>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    events: EventBus,
    config: SessionConfig,
    snapshot: watch::Sender<Snapshot>,
    last_activity: std::sync::Mutex<Instant>,
    /// Set while a touch request is outstanding; new touches are absorbed.
    touch_in_flight: AtomicBool,
    countdown: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let handle = self
            .countdown
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Session whose validity follows the last user interaction.
#[derive(Clone)]
pub struct IdleSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for IdleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleSession")
            .field("state", &self.state())
            .field("remaining", &self.remaining())
            .finish()
    }
}

impl IdleSession {
    /// Create a logged-out idle session.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        events: EventBus,
        config: SessionConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(Snapshot {
            state: SessionState::LoggedOut,
            token: None,
        });
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                events,
                config,
                snapshot,
                last_activity: std::sync::Mutex::new(Instant::now()),
                touch_in_flight: AtomicBool::new(false),
                countdown: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Exchange a bootstrap token and keep the issued token as the
    /// session token.
    pub async fn establish(&self, bootstrap_token: &str) -> AppResult<()> {
        let grant = self
            .inner
            .transport
            .exchange_bootstrap_token(bootstrap_token)
            .await
            .map_err(|e| AppError::authentication(format!("Login failed: {}", e.message)))?;

        if let Err(e) = self.inner.store.set(keys::ACCESS_TOKEN, &grant.access_token) {
            warn!(error = %e, "Failed to persist session token");
        }
        self.activate(grant.access_token);

        info!(user = ?grant.user, "Idle session established");
        self.inner.events.publish(SessionEvent::Established {
            user: grant.user,
            is_admin: false,
        });
        Ok(())
    }

    /// Validate the stored session token and start the countdown.
    pub async fn resume(&self) -> AppResult<SessionUser> {
        let token = match self.peek_token() {
            Some(token) => token,
            None => self
                .inner
                .store
                .get(keys::ACCESS_TOKEN)?
                .filter(|t| !t.is_empty())
                .ok_or_else(|| AppError::authentication("Not logged in"))?,
        };

        match self.inner.transport.validate(&token).await? {
            Validation::Valid(user) => {
                self.activate(token);
                info!(user = %user.display_name, "Idle session resumed");
                self.inner.events.publish(SessionEvent::Established {
                    user: Some(user.display_name.clone()),
                    is_admin: user.is_admin,
                });
                Ok(user)
            }
            Validation::Invalid => {
                self.logout_local(LogoutReason::Rejected);
                Err(AppError::authentication("Session expired; log in again"))
            }
        }
    }

    /// Record user input: reset the countdown and extend the server-side
    /// session.
    pub async fn record_activity(&self, kind: ActivityKind) {
        if self.state() != SessionState::Active {
            return;
        }
        *self
            .inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
        debug!(?kind, "Activity recorded");
        self.touch().await;
    }

    /// Time left before the idle logout, or `None` when not logged in.
    pub fn remaining(&self) -> Option<Duration> {
        if self.state() != SessionState::Active {
            return None;
        }
        let last = *self
            .inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Some(self.inner.config.idle_timeout().saturating_sub(last.elapsed()))
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.inner.snapshot.borrow().state
    }

    /// Session token while active.
    pub fn get_token(&self) -> Option<String> {
        let snapshot = self.inner.snapshot.borrow();
        match snapshot.state {
            SessionState::Active => snapshot.token.clone(),
            _ => None,
        }
    }

    /// Last known session token.
    pub fn peek_token(&self) -> Option<String> {
        self.inner.snapshot.borrow().token.clone()
    }

    /// Clear local state. Idempotent.
    pub async fn logout(&self) {
        self.logout_local(LogoutReason::UserRequested);
    }

    async fn touch(&self) {
        let Some(token) = self.get_token() else {
            return;
        };
        let Some(flight) = TouchFlight::acquire(&self.inner.touch_in_flight) else {
            return;
        };

        let result = self.inner.transport.touch(&token).await;
        drop(flight);

        match result {
            Ok(()) => self.inner.events.publish(SessionEvent::Touched),
            Err(e) if e.is_authentication() => {
                warn!(error = %e, "Session touch rejected");
                self.logout_local(LogoutReason::Rejected);
            }
            Err(e) => debug!(error = %e, "Session touch failed"),
        }
    }

    fn activate(&self, token: String) {
        *self
            .inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.inner.snapshot.send_modify(|snapshot| {
            snapshot.state = SessionState::Active;
            snapshot.token = Some(token);
        });

        let handle = tokio::spawn(countdown(
            Arc::downgrade(&self.inner),
            self.inner.config.idle_check_interval(),
        ));
        let previous = self
            .inner
            .countdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn logout_local(&self, reason: LogoutReason) {
        let handle = self
            .inner
            .countdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }

        let changed = self.inner.snapshot.send_if_modified(|snapshot| {
            let was_active = snapshot.state != SessionState::LoggedOut;
            snapshot.state = SessionState::LoggedOut;
            snapshot.token = None;
            was_active
        });

        if let Err(e) = self.inner.store.remove(keys::ACCESS_TOKEN) {
            warn!(error = %e, "Failed to clear stored session token");
        }

        if changed {
            info!(?reason, "Logged out");
            self.inner
                .events
                .publish(SessionEvent::LoggedOut { reason });
        }
    }
}

/// Holds the touch-in-flight flag; releasing happens on drop, so a
/// cancelled touch frees it too.
struct TouchFlight<'a>(&'a AtomicBool);

impl<'a> TouchFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for TouchFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn countdown(inner: Weak<Inner>, check_interval: Duration) {
    let mut ticker = time::interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let session = IdleSession { inner };
        match session.remaining() {
            None => break,
            Some(left) if left.is_zero() => {
                info!("Idle timeout reached");
                session.logout_local(LogoutReason::Inactivity);
                break;
            }
            Some(_) => {}
        }
    }
}

#[async_trait]
impl TokenSource for IdleSession {
    fn get_token(&self) -> Option<String> {
        IdleSession::get_token(self)
    }

    fn peek_token(&self) -> Option<String> {
        IdleSession::peek_token(self)
    }

    /// Idle sessions have nothing to rotate; a touch extends the
    /// server-side validity instead.
    async fn force_renew(&self) -> SessionState {
        self.touch().await;
        self.state()
    }

    fn state(&self) -> SessionState {
        IdleSession::state(self)
    }
}

#[cfg(test)]
mod tests {
    use cloudbox_core::events::EventPayload;

    use super::*;
    use crate::session::MemoryCredentialStore;
    use crate::testing::{Call, ScriptedTransport};

    fn session(transport: &Arc<ScriptedTransport>) -> (IdleSession, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let config = SessionConfig {
            idle_timeout_minutes: 1,
            idle_check_interval_seconds: 1,
            ..SessionConfig::default()
        };
        let session = IdleSession::new(transport.clone(), store.clone(), EventBus::default(), config);
        (session, store)
    }

    fn touches(transport: &ScriptedTransport) -> usize {
        transport
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Touch(_)))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_touches_server() {
        let transport = Arc::new(ScriptedTransport::new());
        let (session, _) = session(&transport);
        session.establish("boot").await.unwrap();

        session.record_activity(ActivityKind::Key).await;
        session.record_activity(ActivityKind::Click).await;

        assert_eq!(touches(&transport), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_in_flight_absorbs_new_activity() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_touch_delay(Duration::from_millis(300));
        let (session, _) = session(&transport);
        session.establish("boot").await.unwrap();

        tokio::join!(
            session.record_activity(ActivityKind::Pointer),
            session.record_activity(ActivityKind::Pointer),
            session.record_activity(ActivityKind::Touch),
        );

        assert_eq!(touches(&transport), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_touch_releases_in_flight_flag() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_touch_delay(Duration::from_secs(2));
        let (session, _) = session(&transport);
        session.establish("boot").await.unwrap();

        let renewal = tokio::spawn({
            let session = session.clone();
            async move { TokenSource::force_renew(&session).await }
        });
        time::sleep(Duration::from_millis(500)).await;
        renewal.abort();
        let _ = renewal.await;

        session.record_activity(ActivityKind::Key).await;
        session.record_activity(ActivityKind::Click).await;

        assert_eq!(touches(&transport), 3);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_logs_out_after_idle_timeout() {
        let transport = Arc::new(ScriptedTransport::new());
        let (session, store) = session(&transport);
        session.establish("boot").await.unwrap();
        let mut events = session.inner.events.subscribe();

        time::sleep(Duration::from_secs(50)).await;
        session.record_activity(ActivityKind::Key).await;
        time::sleep(Duration::from_secs(50)).await;
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.remaining(), Some(Duration::from_secs(10)));

        time::sleep(Duration::from_secs(12)).await;
        assert_eq!(session.state(), SessionState::LoggedOut);
        assert_eq!(session.remaining(), None);
        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);

        let mut saw_logout = false;
        while let Ok(event) = events.try_recv() {
            if let EventPayload::Session(SessionEvent::LoggedOut { reason }) = event.payload {
                assert_eq!(reason, LogoutReason::Inactivity);
                saw_logout = true;
            }
        }
        assert!(saw_logout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_touch_logs_out() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_touch_error(Some(AppError::authentication("unknown token")));
        let (session, _) = session(&transport);
        session.establish("boot").await.unwrap();

        session.record_activity(ActivityKind::Click).await;

        assert_eq!(session.state(), SessionState::LoggedOut);
        assert_eq!(session.get_token(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_validates_stored_token() {
        let transport = Arc::new(ScriptedTransport::new());
        let (session, store) = session(&transport);
        store.set(keys::ACCESS_TOKEN, "kept").unwrap();

        let user = session.resume().await.unwrap();

        assert_eq!(user.display_name, "tester");
        assert_eq!(session.get_token().as_deref(), Some("kept"));
        assert_eq!(transport.calls(), vec![Call::Validate("kept".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_with_invalid_token_clears_it() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_validate(Ok(Validation::Invalid));
        let (session, store) = session(&transport);
        store.set(keys::ACCESS_TOKEN, "kept").unwrap();

        assert!(session.resume().await.unwrap_err().is_authentication());
        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
    }
}
