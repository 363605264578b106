use std::env;
use std::time::Duration;

pub(crate) fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

pub(crate) fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Tuning knobs for the bulk processor and the ingestion loop.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    pub bulk_actions: usize,
    pub bulk_size: usize,
    /// `None` disables the periodic flusher.
    pub flush_interval: Option<Duration>,
    pub workers: usize,
    pub channel_capacity: usize,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub backoff_retries: u32,
    pub throttle_poll: Duration,
    pub stats_interval: Duration,
}

impl BulkConfig {
    pub fn from_env() -> Self {
        let flush_interval = env_duration_millis("BULK_FLUSH_INTERVAL_MS", 1_000);

        Self {
            bulk_actions: env_usize("BULK_ACTIONS", 1_000).max(1),
            bulk_size: env_usize("BULK_SIZE_BYTES", 5 * 1024 * 1024).max(1),
            flush_interval: (!flush_interval.is_zero()).then_some(flush_interval),
            workers: env_usize("BULK_WORKERS", 1).max(1),
            channel_capacity: env_usize("BULK_CHANNEL_CAPACITY", 1_024).max(1),
            backoff_initial: env_duration_millis("BULK_BACKOFF_INITIAL_MS", 200),
            backoff_max: env_duration_millis("BULK_BACKOFF_MAX_MS", 10_000),
            backoff_retries: env_u32("BULK_BACKOFF_RETRIES", 3),
            throttle_poll: env_duration_millis("BULK_THROTTLE_POLL_MS", 100),
            stats_interval: env_duration_millis("STATS_INTERVAL_MS", 1_000),
        }
    }

    /// Worker count to use; `0` falls back to the configured default.
    pub fn resolve_workers(&self, requested: usize) -> usize {
        if requested == 0 {
            self.workers
        } else {
            requested
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
