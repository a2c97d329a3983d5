//! Client configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod api;
pub mod logging;
pub mod session;
pub mod storage;
pub mod upload;

use serde::{Deserialize, Serialize};

pub use self::api::ApiConfig;
pub use self::logging::LoggingConfig;
pub use self::session::{SessionConfig, SessionMode};
pub use self::storage::StorageConfig;
pub use self::upload::UploadConfig;

use crate::error::AppError;

/// Root client configuration.
///
/// This struct is the top-level deserialization target for the merged
/// configuration sources (default.toml, an optional explicit file, and
/// `CLOUDBOX__*` environment variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Remote API settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Session lifecycle settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Upload queue settings.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Local credential storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Event bus settings.
    #[serde(default)]
    pub events: EventsConfig,
}

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Number of events buffered per subscriber before old ones are dropped.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from TOML files and the environment.
    ///
    /// Merges `config/default.toml`, the optional explicit file, and
    /// environment variables prefixed with `CLOUDBOX__`, then validates
    /// the result.
    pub fn load(path: Option<&str>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("CLOUDBOX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.api.base_url.trim().is_empty() {
            return Err(AppError::configuration("api.base_url must not be empty"));
        }

        if self.api.download_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "api.download_timeout_seconds must be positive",
            ));
        }

        let session = &self.session;
        if session.renewal_interval_seconds == 0 {
            return Err(AppError::configuration(
                "session.renewal_interval_seconds must be positive",
            ));
        }
        if session.renewal_interval_seconds >= session.access_token_lifetime_seconds {
            return Err(AppError::configuration(format!(
                "session.renewal_interval_seconds ({}) must be shorter than the access token lifetime ({})",
                session.renewal_interval_seconds, session.access_token_lifetime_seconds
            )));
        }
        if session.idle_timeout_minutes == 0 || session.idle_check_interval_seconds == 0 {
            return Err(AppError::configuration(
                "idle session timeout and check interval must be positive",
            ));
        }

        let upload = &self.upload;
        if upload.fallback_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "upload.fallback_timeout_seconds must be positive",
            ));
        }
        if upload.transfer_renewal_interval_seconds == 0
            || upload.transfer_renewal_interval_seconds >= session.renewal_interval_seconds
        {
            return Err(AppError::configuration(format!(
                "upload.transfer_renewal_interval_seconds ({}) must be positive and shorter than session.renewal_interval_seconds ({})",
                upload.transfer_renewal_interval_seconds, session.renewal_interval_seconds
            )));
        }

        if self.events.buffer_size == 0 {
            return Err(AppError::configuration("events.buffer_size must be positive"));
        }

        Ok(())
    }
}

fn default_buffer_size() -> usize {
    256
}
