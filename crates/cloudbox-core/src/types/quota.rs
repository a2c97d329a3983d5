//! Storage quota snapshot.

use serde::{Deserialize, Serialize};

/// Quota state fetched right before an admission decision.
///
/// Never cached across admission checks: each batch fetches its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Bytes in use.
    pub used: u64,
    /// Total bytes allowed.
    pub quota: u64,
    /// Bytes still available.
    pub remaining: u64,
    /// Fill level as reported by the server, 0-100 (may exceed 100).
    #[serde(default)]
    pub percentage: f64,
}

/// Coarse fill level for quota displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaLevel {
    /// Below 70% used.
    Normal,
    /// 70% to 90% used.
    Warning,
    /// 90% or more used.
    Critical,
}

impl QuotaSnapshot {
    /// Build a snapshot from used and total byte counts.
    pub fn from_usage(used: u64, quota: u64) -> Self {
        let percentage = if quota > 0 {
            used as f64 / quota as f64 * 100.0
        } else {
            0.0
        };
        Self {
            used,
            quota,
            remaining: quota.saturating_sub(used),
            percentage,
        }
    }

    /// Fill percentage clamped to 0-100.
    pub fn clamped_percentage(&self) -> f64 {
        self.percentage.clamp(0.0, 100.0)
    }

    /// Fill level bucket.
    pub fn level(&self) -> QuotaLevel {
        let pct = self.clamped_percentage();
        if pct < 70.0 {
            QuotaLevel::Normal
        } else if pct < 90.0 {
            QuotaLevel::Warning
        } else {
            QuotaLevel::Critical
        }
    }
}

/// Human-readable byte count (`1.5 MB`), base 1024.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        let rounded = (value * 100.0).round() / 100.0;
        format!("{rounded} {}", UNITS[unit])
    }
}
