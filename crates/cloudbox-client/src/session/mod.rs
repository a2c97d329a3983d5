//! Session credential lifecycle.
//!
//! Two mutually exclusive session models exist:
//!
//! - [`SessionTokenManager`] rotates a short-lived access token on a fixed
//!   clock using a long-lived refresh token.
//! - [`IdleSession`] keeps a single token alive by touching the server on
//!   user input and logs out locally after a period without input.
//!
//! Both implement [`TokenSource`], which is all the upload queue and bulk
//! operations see.

pub mod idle;
pub mod manager;
pub mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use idle::{ActivityKind, IdleSession};
pub use manager::SessionTokenManager;
pub use store::{FileCredentialStore, MemoryCredentialStore};

/// Coarse session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No credential; the user must sign in.
    LoggedOut,
    /// A credential is held and believed valid.
    Active,
    /// Renewal failed; the next token use logs out.
    Expired,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::LoggedOut => write!(f, "logged out"),
            SessionState::Active => write!(f, "active"),
            SessionState::Expired => write!(f, "expired"),
        }
    }
}

/// Source of access tokens for authenticated calls.
#[async_trait]
pub trait TokenSource: Send + Sync + std::fmt::Debug + 'static {
    /// Token for an authenticated call, without network I/O.
    ///
    /// Returns `None` when logged out. Using an expired session logs it out.
    fn get_token(&self) -> Option<String>;

    /// Last known token with no state transition, for best-effort attempts.
    fn peek_token(&self) -> Option<String>;

    /// Renew out of band. Resolves once a new token is stored or the
    /// session has left the active state.
    async fn force_renew(&self) -> SessionState;

    /// Current state.
    fn state(&self) -> SessionState;
}
