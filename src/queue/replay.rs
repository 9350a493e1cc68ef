use std::time::Duration;

use crate::config::EngineConfig;

/// Exponential backoff before the Nth retry of a queued mutation:
/// `base * 2^(n-1)`, capped.
pub fn backoff_delay(retry_count: u32, config: &EngineConfig) -> Duration {
    let exp = retry_count.saturating_sub(1).min(31);
    let ms = config
        .backoff_base_ms
        .saturating_mul(1u64 << exp)
        .min(config.backoff_cap_ms);
    Duration::from_millis(ms)
}

/// Outcome of one replay pass over the queue.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Items confirmed by the server and removed from the queue.
    pub replayed: usize,
    /// Items newly marked failed during this pass.
    pub failed: usize,
    /// Items still queued after the pass.
    pub remaining: usize,
    /// True when another replay was already in flight and this call was a
    /// no-op.
    pub skipped: bool,
}
