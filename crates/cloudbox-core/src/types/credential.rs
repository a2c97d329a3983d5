//! Session credential types.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The access/refresh credential pair held by a logged-in client.
///
/// An empty access token means the session is logged out.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Short-lived token authorizing individual API calls.
    pub access_token: String,
    /// Long-lived token used only to mint new access tokens.
    pub refresh_token: Option<String>,
    /// When the access token is expected to stop working.
    pub access_expiry_estimate: DateTime<Utc>,
}

impl Credential {
    /// Build a credential, estimating the access expiry from the token's
    /// `exp` claim or, failing that, from `fallback_lifetime`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        fallback_lifetime: Duration,
    ) -> Self {
        let access_token = access_token.into();
        let access_expiry_estimate = estimate_expiry(&access_token, fallback_lifetime);
        Self {
            access_token,
            refresh_token,
            access_expiry_estimate,
        }
    }

    /// Whether an access token is present at all.
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Whether the access token is believed to still be valid at `now`.
    pub fn is_access_fresh(&self, now: DateTime<Utc>) -> bool {
        self.has_access_token() && self.access_expiry_estimate > now
    }

    /// Replace the access token, keeping the refresh token.
    pub fn with_access_token(&self, access_token: impl Into<String>, fallback_lifetime: Duration) -> Self {
        Self::new(access_token, self.refresh_token.clone(), fallback_lifetime)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .field("access_expiry_estimate", &self.access_expiry_estimate)
            .finish()
    }
}

/// Shorten a secret to a loggable prefix.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…")
}

/// Read the `exp` claim of a JWT without verifying it.
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    struct ExpClaim {
        exp: i64,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claim: ExpClaim = serde_json::from_slice(&bytes).ok()?;
    Utc.timestamp_opt(claim.exp, 0).single()
}

fn estimate_expiry(token: &str, fallback_lifetime: Duration) -> DateTime<Utc> {
    jwt_expiry(token).unwrap_or_else(|| {
        Utc::now()
            + chrono::Duration::from_std(fallback_lifetime).unwrap_or(chrono::Duration::zero())
    })
}

/// Result of exchanging a one-time bootstrap token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    /// New access token.
    pub access_token: String,
    /// New refresh token.
    pub refresh_token: Option<String>,
    /// Server-side user handle, when reported.
    #[serde(default, alias = "telegramId")]
    pub user: Option<String>,
}

/// Result of a refresh call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshGrant {
    /// Freshly minted access token.
    pub access_token: String,
    /// Rotated refresh token, when the server rotates.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The user a valid session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Display name.
    pub display_name: String,
    /// Whether the user may open the admin panel.
    pub is_admin: bool,
}

/// Outcome of asking the server whether an access token is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The token is valid for this user.
    Valid(SessionUser),
    /// The token is expired or unknown.
    Invalid,
}
