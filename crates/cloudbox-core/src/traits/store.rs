//! Durable key-value storage for the credential pair.

use crate::result::AppResult;

/// Fixed storage keys.
pub mod keys {
    /// Key holding the access token.
    pub const ACCESS_TOKEN: &str = "access_token";
    /// Key holding the refresh token.
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// Synchronous key-value storage that survives restarts.
///
/// Reads happen on the hot path of `get_token`, so the interface is
/// synchronous like browser local storage.
pub trait CredentialStore: Send + Sync + std::fmt::Debug + 'static {
    /// Read a value.
    fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> AppResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> AppResult<()>;
}
