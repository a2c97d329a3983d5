//! Remote API configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for reaching the storage service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the service, e.g. `https://cloud.example.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout in seconds for ordinary (non-upload) requests.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Timeout in seconds for a whole file download.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_seconds: u64,
    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ApiConfig {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Download timeout as a [`Duration`].
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Join a server-relative path (`/share/abc`) onto the base URL.
    pub fn absolute_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
            download_timeout_seconds: default_download_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_download_timeout() -> u64 {
    3 * 60 * 60
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("cloudbox/{}", env!("CARGO_PKG_VERSION"))
}
