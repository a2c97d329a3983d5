//! Session lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// The user asked to log out.
    UserRequested,
    /// A token was used after renewal had failed.
    Expired,
    /// The server rejected the stored credential.
    Rejected,
    /// Idle mode: no input within the idle timeout.
    Inactivity,
}

/// Events related to the session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// A session became active.
    Established {
        /// Display name of the user, when known.
        user: Option<String>,
        /// Whether the user is an administrator.
        is_admin: bool,
    },
    /// The access token was renewed.
    Renewed {
        /// Estimated expiry of the new access token.
        expires_at: DateTime<Utc>,
    },
    /// Renewal failed; the next authenticated use will log out.
    Expired {
        /// Failure description.
        reason: String,
    },
    /// Idle mode: the server-side session was extended.
    Touched,
    /// The session ended and local credentials were cleared.
    LoggedOut {
        /// Why the session ended.
        reason: LogoutReason,
    },
}
