// Engine tuning knobs

use std::time::Duration;

/// Decoder dequeue timeout for both input and output queues
pub const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(1);

/// Consecutive polls without decoded output before the stream is treated as ended
pub const STALL_LIMIT: u32 = 10;

/// Sleep between progress estimates while the output drains
pub const DRAIN_SLEEP: Duration = Duration::from_millis(15);

/// Playback engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub dequeue_timeout: Duration,
    pub stall_limit: u32,
    pub drain_sleep: Duration,
    /// Duration reported instead of the demuxer's when non-zero
    pub target_duration: Duration,
    /// Minimum spacing between progress events, zero for every access unit
    pub progress_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dequeue_timeout: DEQUEUE_TIMEOUT,
            stall_limit: STALL_LIMIT,
            drain_sleep: DRAIN_SLEEP,
            target_duration: Duration::ZERO,
            progress_interval: Duration::ZERO,
        }
    }
}

impl EngineConfig {
    pub fn with_target_duration(mut self, duration: Duration) -> Self {
        self.target_duration = duration;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_stall_limit(mut self, limit: u32) -> Self {
        self.stall_limit = limit.max(1);
        self
    }

    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }

    pub fn with_drain_sleep(mut self, sleep: Duration) -> Self {
        self.drain_sleep = sleep;
        self
    }
}
