//! Transfer telemetry for the active upload.

use std::time::Duration;

use tokio::time::Instant;

/// Byte counter with a throttled rate sample.
///
/// The rate is only recomputed once at least `min_slice` has passed since
/// the previous sample. Purely advisory.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    total: u64,
    sent: u64,
    min_slice: Duration,
    sample_at: Instant,
    sample_bytes: u64,
    rate: Option<f64>,
}

impl TransferProgress {
    /// Start tracking a transfer of `total` bytes.
    pub fn new(total: u64, min_slice: Duration) -> Self {
        Self {
            total,
            sent: 0,
            min_slice,
            sample_at: Instant::now(),
            sample_bytes: 0,
            rate: None,
        }
    }

    /// Record the cumulative bytes sent. Returns true when a new rate
    /// sample was taken.
    pub fn record(&mut self, sent: u64) -> bool {
        self.sent = sent.min(self.total);
        let now = Instant::now();
        let elapsed = now.duration_since(self.sample_at);
        if elapsed < self.min_slice || elapsed.is_zero() {
            return false;
        }
        let delta = self.sent.saturating_sub(self.sample_bytes);
        self.rate = Some(delta as f64 / elapsed.as_secs_f64());
        self.sample_at = now;
        self.sample_bytes = self.sent;
        true
    }

    /// Bytes sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Total bytes.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Fraction complete in `[0, 1]`. An empty file counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.sent as f64 / self.total as f64
    }

    /// Last sampled rate in bytes per second.
    pub fn rate(&self) -> Option<f64> {
        self.rate
    }

    /// Estimated time left at the sampled rate.
    pub fn eta(&self) -> Option<Duration> {
        let rate = self.rate.filter(|r| *r > 0.0)?;
        let left = self.total.saturating_sub(self.sent) as f64;
        Some(Duration::from_secs_f64(left / rate))
    }

    /// Whether every byte has been sent.
    pub fn is_complete(&self) -> bool {
        self.sent >= self.total
    }
}
