//! Rotating access/refresh session.
//!
//! States: `LoggedOut` → (bootstrap exchange or resume) → `Active`
//! → (renewal failure) → `Expired` → (next token use) → `LoggedOut`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use cloudbox_core::config::SessionConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::events::{LogoutReason, SessionEvent};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::{CredentialStore, Transport, keys};
use cloudbox_core::types::credential::redact;
use cloudbox_core::types::{Credential, RefreshGrant, SessionUser, Validation};

use crate::events::EventBus;

use super::{SessionState, TokenSource};

/// Credential state published to readers.
#[derive(Debug, Clone)]
struct Snapshot {
    state: SessionState,
    credential: Option<Credential>,
    /// Bumped whenever a session starts or ends. A renewal response is
    /// only applied if the epoch it started under is still current.
    epoch: u64,
}

impl Snapshot {
    fn logged_out(epoch: u64) -> Self {
        Self {
            state: SessionState::LoggedOut,
            credential: None,
            epoch,
        }
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    events: EventBus,
    config: SessionConfig,
    snapshot: watch::Sender<Snapshot>,
    /// Held for the duration of one refresh call.
    renewal_lock: Mutex<()>,
    /// Number of refresh calls that have completed. Waiters compare it
    /// before and after taking `renewal_lock` to join a finished renewal.
    renewals_completed: AtomicU64,
    /// Background renewal clock.
    clock: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let handle = self
            .clock
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Keeps a short-lived access token valid for an unbounded session.
///
/// [`get_token`](Self::get_token) never performs I/O. Renewal runs on a
/// fixed clock and on explicit [`force_renew`](Self::force_renew) calls;
/// at most one refresh request is in flight at a time.
#[derive(Clone)]
pub struct SessionTokenManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.inner.snapshot.borrow();
        f.debug_struct("SessionTokenManager")
            .field("state", &snapshot.state)
            .field("credential", &snapshot.credential)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl SessionTokenManager {
    /// Create a logged-out manager. Nothing is read from the store until
    /// [`resume`](Self::resume) is called.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        events: EventBus,
        config: SessionConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::logged_out(0));
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                events,
                config,
                snapshot,
                renewal_lock: Mutex::new(()),
                renewals_completed: AtomicU64::new(0),
                clock: std::sync::Mutex::new(None),
            }),
        }
    }

    /// Exchange a one-time bootstrap token for a credential pair.
    ///
    /// On failure the session stays logged out and the error is reported
    /// as an authentication error.
    pub async fn establish(&self, bootstrap_token: &str) -> AppResult<()> {
        let grant = self
            .inner
            .transport
            .exchange_bootstrap_token(bootstrap_token)
            .await
            .map_err(|e| {
                warn!(error = %e, "Bootstrap token exchange failed");
                AppError::authentication(format!("Login failed: {}", e.message))
            })?;

        let credential = Credential::new(
            grant.access_token,
            grant.refresh_token,
            self.inner.config.access_token_lifetime(),
        );
        self.persist(&credential);
        self.install(credential);
        self.start_clock();

        info!(user = ?grant.user, "Session established");
        self.inner.events.publish(SessionEvent::Established {
            user: grant.user,
            is_admin: false,
        });
        Ok(())
    }

    /// Re-authenticate a stored session: validate the access token, and
    /// if that fails, refresh once and validate again.
    ///
    /// A refresh-only credential is renewed before the first validation.
    /// A rejected refresh logs out.
    pub async fn resume(&self) -> AppResult<SessionUser> {
        let credential = match self.current_credential() {
            Some(credential) => credential,
            None => self
                .load_stored()?
                .ok_or_else(|| AppError::authentication("Not logged in"))?,
        };
        let epoch = self.install(credential.clone());

        if credential.has_access_token() {
            match self
                .inner
                .transport
                .validate(&credential.access_token)
                .await
            {
                Ok(Validation::Valid(user)) => return self.activate(epoch, user),
                Ok(Validation::Invalid) => debug!("Stored access token rejected; refreshing"),
                Err(e) => warn!(error = %e, "Validation failed; refreshing"),
            }
        }

        if self.force_renew().await != SessionState::Active {
            self.logout_local(LogoutReason::Rejected);
            return Err(AppError::authentication("Session expired; log in again"));
        }

        let token = self
            .peek_token()
            .ok_or_else(|| AppError::session("Session ended during resume"))?;
        match self.inner.transport.validate(&token).await? {
            Validation::Valid(user) => self.activate(epoch, user),
            Validation::Invalid => {
                self.logout_local(LogoutReason::Rejected);
                Err(AppError::authentication(
                    "Renewed token was rejected; log in again",
                ))
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.inner.snapshot.borrow().state
    }

    /// Estimated expiry of the current access token.
    pub fn access_expiry(&self) -> Option<DateTime<Utc>> {
        self.inner
            .snapshot
            .borrow()
            .credential
            .as_ref()
            .filter(|c| c.has_access_token())
            .map(|c| c.access_expiry_estimate)
    }

    /// Whether the access token is still within its estimated lifetime.
    /// A stale token is renewed by the next clock tick or forced renewal.
    pub fn is_access_fresh(&self) -> bool {
        self.inner
            .snapshot
            .borrow()
            .credential
            .as_ref()
            .is_some_and(|c| c.is_access_fresh(Utc::now()))
    }

    /// Token for an authenticated call. Never performs I/O.
    ///
    /// An expired session is logged out here and `None` is returned.
    pub fn get_token(&self) -> Option<String> {
        let snapshot = self.inner.snapshot.borrow().clone();
        match snapshot.state {
            SessionState::Active => snapshot
                .credential
                .filter(Credential::has_access_token)
                .map(|c| c.access_token),
            SessionState::Expired => {
                self.logout_local(LogoutReason::Expired);
                None
            }
            SessionState::LoggedOut => None,
        }
    }

    /// Last known access token, expired or not, without any transition.
    pub fn peek_token(&self) -> Option<String> {
        self.inner
            .snapshot
            .borrow()
            .credential
            .as_ref()
            .filter(|c| c.has_access_token())
            .map(|c| c.access_token.clone())
    }

    /// Renew now. Concurrent callers share a single refresh request.
    ///
    /// Resolves once the new token is stored or the session has left the
    /// active state.
    pub async fn force_renew(&self) -> SessionState {
        let seen = self.inner.renewals_completed.load(Ordering::Acquire);
        let _guard = self.inner.renewal_lock.lock().await;
        if self.inner.renewals_completed.load(Ordering::Acquire) != seen {
            debug!("Joined renewal that completed while waiting");
            return self.state();
        }
        self.renew_locked().await
    }

    /// End the session. Local state is always cleared; the server-side
    /// invalidation is best effort.
    pub async fn logout(&self) {
        let refresh_token = self.logout_local(LogoutReason::UserRequested);
        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self.inner.transport.logout(&refresh_token).await {
                debug!(error = %e, "Server-side logout failed; local state already cleared");
            }
        }
    }

    fn activate(&self, epoch: u64, user: SessionUser) -> AppResult<SessionUser> {
        {
            let snapshot = self.inner.snapshot.borrow();
            if snapshot.epoch != epoch || snapshot.state != SessionState::Active {
                return Err(AppError::session("Session ended during resume"));
            }
        }
        self.start_clock();
        info!(user = %user.display_name, is_admin = user.is_admin, "Session resumed");
        self.inner.events.publish(SessionEvent::Established {
            user: Some(user.display_name.clone()),
            is_admin: user.is_admin,
        });
        Ok(user)
    }

    /// Refresh under `renewal_lock` and apply the result.
    async fn renew_locked(&self) -> SessionState {
        let snapshot = self.inner.snapshot.borrow().clone();
        if snapshot.state != SessionState::Active {
            return snapshot.state;
        }

        let refresh_token = snapshot
            .credential
            .as_ref()
            .and_then(|c| c.refresh_token.clone());
        let result = match refresh_token {
            Some(refresh_token) => {
                debug!(refresh_token = %redact(&refresh_token), "Renewing access token");
                self.inner.transport.refresh(&refresh_token).await
            }
            None => Err(AppError::authentication("No refresh token held")),
        };
        self.inner.renewals_completed.fetch_add(1, Ordering::AcqRel);
        self.apply_renewal(snapshot.epoch, result)
    }

    fn apply_renewal(&self, epoch: u64, result: AppResult<RefreshGrant>) -> SessionState {
        let lifetime = self.inner.config.access_token_lifetime();
        match result {
            Ok(grant) => {
                let mut renewed = None;
                self.inner.snapshot.send_if_modified(|snapshot| {
                    if snapshot.epoch != epoch || snapshot.state == SessionState::LoggedOut {
                        return false;
                    }
                    let Some(current) = snapshot.credential.as_ref() else {
                        return false;
                    };
                    let mut credential =
                        current.with_access_token(grant.access_token.clone(), lifetime);
                    if let Some(rotated) = grant.refresh_token.clone() {
                        credential.refresh_token = Some(rotated);
                    }
                    snapshot.state = SessionState::Active;
                    snapshot.credential = Some(credential.clone());
                    renewed = Some(credential);
                    true
                });

                match renewed {
                    Some(credential) => {
                        self.persist(&credential);
                        info!(expires_at = %credential.access_expiry_estimate, "Access token renewed");
                        self.inner.events.publish(SessionEvent::Renewed {
                            expires_at: credential.access_expiry_estimate,
                        });
                    }
                    None => debug!("Discarding renewal response for an ended session"),
                }
            }
            Err(e) => {
                let expired = self.inner.snapshot.send_if_modified(|snapshot| {
                    if snapshot.epoch == epoch && snapshot.state == SessionState::Active {
                        snapshot.state = SessionState::Expired;
                        true
                    } else {
                        false
                    }
                });
                if expired {
                    warn!(error = %e, "Access token renewal failed; session expired");
                    self.inner.events.publish(SessionEvent::Expired {
                        reason: e.message.clone(),
                    });
                }
            }
        }
        self.state()
    }

    /// Make `credential` the active one under a new epoch.
    fn install(&self, credential: Credential) -> u64 {
        let mut epoch = 0;
        self.inner.snapshot.send_modify(|snapshot| {
            snapshot.epoch += 1;
            snapshot.state = SessionState::Active;
            snapshot.credential = Some(credential);
            epoch = snapshot.epoch;
        });
        epoch
    }

    /// Clear local state. Returns the refresh token that was held, for the
    /// server-side logout call.
    fn logout_local(&self, reason: LogoutReason) -> Option<String> {
        self.stop_clock();

        let mut previous = None;
        let changed = self.inner.snapshot.send_if_modified(|snapshot| {
            let was_logged_in = snapshot.state != SessionState::LoggedOut;
            previous = snapshot.credential.take();
            *snapshot = Snapshot::logged_out(snapshot.epoch + 1);
            was_logged_in
        });

        let refresh_token = previous
            .and_then(|c| c.refresh_token)
            .or_else(|| self.inner.store.get(keys::REFRESH_TOKEN).ok().flatten());

        for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN] {
            if let Err(e) = self.inner.store.remove(key) {
                warn!(key, error = %e, "Failed to clear stored credential");
            }
        }

        if changed {
            info!(?reason, "Logged out");
            self.inner
                .events
                .publish(SessionEvent::LoggedOut { reason });
        }
        refresh_token
    }

    fn current_credential(&self) -> Option<Credential> {
        let snapshot = self.inner.snapshot.borrow();
        match snapshot.state {
            SessionState::LoggedOut => None,
            _ => snapshot.credential.clone(),
        }
    }

    fn load_stored(&self) -> AppResult<Option<Credential>> {
        let access = self.inner.store.get(keys::ACCESS_TOKEN)?.unwrap_or_default();
        let refresh = self.inner.store.get(keys::REFRESH_TOKEN)?;
        if access.is_empty() && refresh.is_none() {
            return Ok(None);
        }
        Ok(Some(Credential::new(
            access,
            refresh,
            self.inner.config.access_token_lifetime(),
        )))
    }

    fn persist(&self, credential: &Credential) {
        let mut result = self
            .inner
            .store
            .set(keys::ACCESS_TOKEN, &credential.access_token);
        if result.is_ok() {
            result = match &credential.refresh_token {
                Some(refresh) => self.inner.store.set(keys::REFRESH_TOKEN, refresh),
                None => self.inner.store.remove(keys::REFRESH_TOKEN),
            };
        }
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist credential");
        }
    }

    fn start_clock(&self) {
        let period = self.inner.config.renewal_interval();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(renewal_clock(weak, period));

        let previous = self
            .inner
            .clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        debug!(period_secs = period.as_secs(), "Renewal clock started");
    }

    fn stop_clock(&self) {
        let handle = self
            .inner
            .clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Fires a renewal every `period` while the session stays active.
///
/// Holds only a weak reference so a dropped manager stops the clock.
async fn renewal_clock(inner: Weak<Inner>, period: std::time::Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let manager = SessionTokenManager { inner };
        if manager.state() != SessionState::Active {
            break;
        }

        // A renewal already in flight covers this tick.
        match manager.inner.renewal_lock.try_lock() {
            Ok(_guard) => {
                manager.renew_locked().await;
            }
            Err(_) => debug!("Renewal in flight; skipping scheduled tick"),
        }

        if manager.state() != SessionState::Active {
            break;
        }
    }
}

#[async_trait]
impl TokenSource for SessionTokenManager {
    fn get_token(&self) -> Option<String> {
        SessionTokenManager::get_token(self)
    }

    fn peek_token(&self) -> Option<String> {
        SessionTokenManager::peek_token(self)
    }

    async fn force_renew(&self) -> SessionState {
        SessionTokenManager::force_renew(self).await
    }

    fn state(&self) -> SessionState {
        SessionTokenManager::state(self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cloudbox_core::events::EventPayload;

    use super::*;
    use crate::session::MemoryCredentialStore;
    use crate::testing::{Call, ScriptedTransport};

    fn config() -> SessionConfig {
        SessionConfig {
            renewal_interval_seconds: 600,
            access_token_lifetime_seconds: 900,
            ..SessionConfig::default()
        }
    }

    fn manager(transport: &Arc<ScriptedTransport>) -> (SessionTokenManager, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = SessionTokenManager::new(
            transport.clone(),
            store.clone(),
            EventBus::default(),
            config(),
        );
        (manager, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_establish_persists_and_activates() {
        let transport = Arc::new(ScriptedTransport::new());
        let (manager, store) = manager(&transport);

        manager.establish("boot").await.unwrap();

        assert_eq!(manager.state(), SessionState::Active);
        assert_eq!(manager.get_token().as_deref(), Some("access-0"));
        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap().as_deref(), Some("access-0"));
        assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap().as_deref(), Some("refresh-0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_exchange_stays_logged_out() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_exchange_error(AppError::authentication("bad token"));
        let (manager, store) = manager(&transport);

        let err = manager.establish("boot").await.unwrap_err();

        assert!(err.is_authentication());
        assert_eq!(manager.state(), SessionState::LoggedOut);
        assert_eq!(manager.get_token(), None);
        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_force_renew_issues_one_refresh() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_refresh_delay(Duration::from_millis(200));
        let (manager, _) = manager(&transport);
        manager.establish("boot").await.unwrap();

        let (a, b) = tokio::join!(manager.force_renew(), manager.force_renew());

        assert_eq!(a, SessionState::Active);
        assert_eq!(b, SessionState::Active);
        assert_eq!(transport.refresh_count(), 1);
        assert_eq!(manager.get_token().as_deref(), Some("access-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_force_renew_refreshes_each_time() {
        let transport = Arc::new(ScriptedTransport::new());
        let (manager, _) = manager(&transport);
        manager.establish("boot").await.unwrap();

        manager.force_renew().await;
        manager.force_renew().await;

        assert_eq!(transport.refresh_count(), 2);
        assert_eq!(manager.get_token().as_deref(), Some("access-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_freshness_follows_expiry_estimate() {
        let transport = Arc::new(ScriptedTransport::new());
        let (manager, _) = manager(&transport);
        assert!(!manager.is_access_fresh());

        manager.establish("boot").await.unwrap();
        assert!(manager.is_access_fresh());

        // Payload is `{"exp":1000}`, long expired.
        transport.push_refresh(Ok(RefreshGrant {
            access_token: "h.eyJleHAiOjEwMDB9.s".into(),
            refresh_token: None,
        }));
        manager.force_renew().await;
        assert!(!manager.is_access_fresh());

        manager.logout().await;
        assert!(!manager.is_access_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_keeps_refresh_token() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_refresh(Ok(RefreshGrant {
            access_token: "fresh".into(),
            refresh_token: None,
        }));
        let (manager, store) = manager(&transport);
        manager.establish("boot").await.unwrap();

        manager.force_renew().await;

        assert_eq!(manager.get_token().as_deref(), Some("fresh"));
        assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap().as_deref(), Some("refresh-0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_renews_on_interval() {
        let transport = Arc::new(ScriptedTransport::new());
        let (manager, _) = manager(&transport);
        manager.establish("boot").await.unwrap();

        time::sleep(Duration::from_secs(599)).await;
        assert_eq!(transport.refresh_count(), 0);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.refresh_count(), 1);

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(transport.refresh_count(), 2);
        assert_eq!(manager.get_token().as_deref(), Some("access-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_tick_skipped_while_renewal_in_flight() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_refresh_delay(Duration::from_secs(30));
        let (manager, _) = manager(&transport);
        manager.establish("boot").await.unwrap();

        time::sleep(Duration::from_secs(590)).await;
        let forced = tokio::spawn({
            let manager = manager.clone();
            async move { manager.force_renew().await }
        });
        time::sleep(Duration::from_secs(25)).await;
        assert_eq!(forced.await.unwrap(), SessionState::Active);

        assert_eq!(transport.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_renewal_expires_then_logs_out_on_use() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_refresh(Err(AppError::authentication("refresh rejected")));
        let (manager, store) = manager(&transport);
        manager.establish("boot").await.unwrap();
        let mut events = manager.inner.events.subscribe();

        assert_eq!(manager.force_renew().await, SessionState::Expired);
        assert_eq!(manager.state(), SessionState::Expired);
        assert!(manager.peek_token().is_some());

        assert_eq!(manager.get_token(), None);
        assert_eq!(manager.state(), SessionState::LoggedOut);
        assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap(), None);

        let first = events.recv().await.unwrap();
        assert!(matches!(first.payload, EventPayload::Session(SessionEvent::Expired { .. })));
        let second = events.recv().await.unwrap();
        assert!(matches!(
            second.payload,
            EventPayload::Session(SessionEvent::LoggedOut {
                reason: LogoutReason::Expired
            })
        ));
        // Expired sessions are not invalidated server-side.
        assert!(!transport.calls().iter().any(|c| matches!(c, Call::Logout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_renewal_after_logout_is_discarded() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_refresh_delay(Duration::from_secs(5));
        let (manager, store) = manager(&transport);
        manager.establish("boot").await.unwrap();

        let renewal = tokio::spawn({
            let manager = manager.clone();
            async move { manager.force_renew().await }
        });
        time::sleep(Duration::from_secs(1)).await;
        manager.logout().await;

        assert_eq!(renewal.await.unwrap(), SessionState::LoggedOut);
        assert_eq!(manager.state(), SessionState::LoggedOut);
        assert_eq!(manager.peek_token(), None);
        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_is_idempotent_and_survives_server_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.set_logout_error(true);
        let (manager, store) = manager(&transport);
        manager.establish("boot").await.unwrap();

        manager.logout().await;
        manager.logout().await;

        assert_eq!(manager.state(), SessionState::LoggedOut);
        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
        assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap(), None);
        let logouts = transport
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Logout(_)))
            .count();
        assert_eq!(logouts, 1);

        // The clock is stopped.
        time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(transport.refresh_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_with_valid_token() {
        let transport = Arc::new(ScriptedTransport::new());
        let (manager, store) = manager(&transport);
        store.set(keys::ACCESS_TOKEN, "stored-access").unwrap();
        store.set(keys::REFRESH_TOKEN, "stored-refresh").unwrap();

        let user = manager.resume().await.unwrap();

        assert_eq!(user.display_name, "tester");
        assert_eq!(manager.get_token().as_deref(), Some("stored-access"));
        assert_eq!(transport.refresh_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_refreshes_expired_access_token() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_validate(Ok(Validation::Invalid));
        let (manager, store) = manager(&transport);
        store.set(keys::ACCESS_TOKEN, "stale").unwrap();
        store.set(keys::REFRESH_TOKEN, "stored-refresh").unwrap();

        let user = manager.resume().await.unwrap();

        assert_eq!(user.display_name, "tester");
        assert_eq!(manager.state(), SessionState::Active);
        assert_eq!(manager.get_token().as_deref(), Some("access-1"));
        assert_eq!(
            transport.calls(),
            vec![
                Call::Validate("stale".into()),
                Call::Refresh("stored-refresh".into()),
                Call::Validate("access-1".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_with_refresh_only_renews_first() {
        let transport = Arc::new(ScriptedTransport::new());
        let (manager, store) = manager(&transport);
        store.set(keys::REFRESH_TOKEN, "stored-refresh").unwrap();

        manager.resume().await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                Call::Refresh("stored-refresh".into()),
                Call::Validate("access-1".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_with_rejected_refresh_logs_out() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_validate(Ok(Validation::Invalid));
        transport.push_refresh(Err(AppError::authentication("gone")));
        let (manager, store) = manager(&transport);
        store.set(keys::ACCESS_TOKEN, "stale").unwrap();
        store.set(keys::REFRESH_TOKEN, "stored-refresh").unwrap();

        let err = manager.resume().await.unwrap_err();

        assert!(err.is_authentication());
        assert_eq!(manager.state(), SessionState::LoggedOut);
        assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_without_stored_credential() {
        let transport = Arc::new(ScriptedTransport::new());
        let (manager, _) = manager(&transport);

        let err = manager.resume().await.unwrap_err();

        assert!(err.is_authentication());
        assert!(transport.calls().is_empty());
    }
}
