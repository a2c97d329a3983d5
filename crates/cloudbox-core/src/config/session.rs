//! Session lifecycle configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which session model the client runs.
///
/// The two models are mutually exclusive: a client either rotates
/// short-lived access tokens or keeps a single token alive through
/// user activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Access/refresh token pair renewed on a fixed clock.
    #[default]
    Rotating,
    /// Single session token whose validity follows the last user input.
    Idle,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Rotating => write!(f, "rotating"),
            SessionMode::Idle => write!(f, "idle"),
        }
    }
}

/// Session management configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session model.
    #[serde(default)]
    pub mode: SessionMode,
    /// Interval of the background renewal clock in seconds.
    #[serde(default = "default_renewal_interval")]
    pub renewal_interval_seconds: u64,
    /// Assumed access token lifetime when the token carries no `exp` claim.
    #[serde(default = "default_access_lifetime")]
    pub access_token_lifetime_seconds: u64,
    /// Idle mode: minutes without input before the client logs out.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_minutes: u64,
    /// Idle mode: how often the local countdown is checked, in seconds.
    #[serde(default = "default_idle_check_interval")]
    pub idle_check_interval_seconds: u64,
}

impl SessionConfig {
    /// Renewal clock period.
    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval_seconds)
    }

    /// Fallback access token lifetime.
    pub fn access_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.access_token_lifetime_seconds)
    }

    /// Idle timeout.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_minutes * 60)
    }

    /// Countdown check period.
    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_interval_seconds)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            renewal_interval_seconds: default_renewal_interval(),
            access_token_lifetime_seconds: default_access_lifetime(),
            idle_timeout_minutes: default_idle_timeout(),
            idle_check_interval_seconds: default_idle_check_interval(),
        }
    }
}

fn default_renewal_interval() -> u64 {
    10 * 60
}

fn default_access_lifetime() -> u64 {
    15 * 60
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_idle_check_interval() -> u64 {
    1
}
