//! Upload queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upload queue timing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Per-item timeout used when the server does not advertise one.
    #[serde(default = "default_fallback_timeout")]
    pub fallback_timeout_seconds: u64,
    /// Period of the forced renewal while a transfer is active.
    #[serde(default = "default_transfer_renewal_interval")]
    pub transfer_renewal_interval_seconds: u64,
    /// Delay between queue drain and the listing refresh request.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Minimum time between two transfer rate samples.
    #[serde(default = "default_rate_sample_interval")]
    pub rate_sample_interval_ms: u64,
}

impl UploadConfig {
    /// Fallback per-item timeout.
    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_seconds)
    }

    /// Mid-transfer renewal period.
    pub fn transfer_renewal_interval(&self) -> Duration {
        Duration::from_secs(self.transfer_renewal_interval_seconds)
    }

    /// Drain-to-refresh delay.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Minimum rate sampling slice.
    pub fn rate_sample_interval(&self) -> Duration {
        Duration::from_millis(self.rate_sample_interval_ms)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            fallback_timeout_seconds: default_fallback_timeout(),
            transfer_renewal_interval_seconds: default_transfer_renewal_interval(),
            settle_delay_ms: default_settle_delay(),
            rate_sample_interval_ms: default_rate_sample_interval(),
        }
    }
}

fn default_fallback_timeout() -> u64 {
    3 * 60 * 60
}

fn default_transfer_renewal_interval() -> u64 {
    5 * 60
}

fn default_settle_delay() -> u64 {
    500
}

fn default_rate_sample_interval() -> u64 {
    500
}
