//! Session lifecycle scenarios.

use std::time::Duration;

use cloudbox_client::SessionState;
use cloudbox_client::context::Session;
use cloudbox_client::session::ActivityKind;
use cloudbox_client::testing::Call;
use cloudbox_core::config::SessionMode;
use cloudbox_core::error::ErrorKind;
use cloudbox_core::traits::{CredentialStore, keys};
use cloudbox_core::types::Validation;

use crate::helpers::TestApp;

#[tokio::test(start_paused = true)]
async fn test_expired_access_token_is_renewed_transparently() {
    let app = TestApp::new();
    app.store_credentials("stale-access", "stored-refresh");
    app.transport.push_validate(Ok(Validation::Invalid));

    let user = app.ctx.resume().await.unwrap();

    assert_eq!(user.display_name, "tester");
    assert_eq!(app.ctx.state(), SessionState::Active);
    assert_eq!(
        app.transport.calls(),
        vec![
            Call::Validate("stale-access".into()),
            Call::Refresh("stored-refresh".into()),
            Call::Validate("access-1".into()),
        ]
    );
    assert_eq!(
        app.store.get(keys::ACCESS_TOKEN).unwrap().as_deref(),
        Some("access-1")
    );
}

#[tokio::test(start_paused = true)]
async fn test_resume_without_credentials_requires_login() {
    let app = TestApp::new();

    let err = app.ctx.resume().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Authentication);
    assert_eq!(app.ctx.state(), SessionState::LoggedOut);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_renewals_share_one_refresh() {
    let app = TestApp::new();
    app.login().await;
    app.transport.set_refresh_delay(Duration::from_millis(200));
    let Session::Rotating(manager) = app.ctx.session().clone() else {
        panic!("expected rotating session");
    };

    let (a, b) = tokio::join!(manager.force_renew(), manager.force_renew());

    assert_eq!(a, SessionState::Active);
    assert_eq!(b, SessionState::Active);
    assert_eq!(app.transport.refresh_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_renewal_landing_after_logout_is_ignored() {
    let app = TestApp::new();
    app.login().await;
    app.transport.set_refresh_delay(Duration::from_secs(1));
    let Session::Rotating(manager) = app.ctx.session().clone() else {
        panic!("expected rotating session");
    };

    let renewal = tokio::spawn({
        let manager = manager.clone();
        async move { manager.force_renew().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    app.ctx.logout().await;
    renewal.await.unwrap();

    assert_eq!(app.ctx.state(), SessionState::LoggedOut);
    assert!(manager.get_token().is_none());
    assert!(app.store.get(keys::ACCESS_TOKEN).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_logs_out_after_inactivity() {
    let app = TestApp::with_mode(SessionMode::Idle);
    app.login().await;
    let Session::Idle(idle) = app.ctx.session().clone() else {
        panic!("expected idle session");
    };

    tokio::time::sleep(Duration::from_secs(20 * 60)).await;
    idle.record_activity(ActivityKind::Click).await;
    tokio::time::sleep(Duration::from_secs(20 * 60)).await;
    assert_eq!(app.ctx.state(), SessionState::Active);

    tokio::time::sleep(Duration::from_secs(11 * 60)).await;
    assert_eq!(app.ctx.state(), SessionState::LoggedOut);
    assert_eq!(app.transport.refresh_count(), 0);
}
