use std::time::Duration;

/// Tunables for the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Retries before a queued mutation is marked failed and excluded from
    /// automatic replay. Failed items need an explicit `retry_failed`.
    pub retry_threshold: u32,
    /// Base replay backoff in milliseconds (doubles per retry).
    pub backoff_base_ms: u64,
    /// Ceiling for the replay backoff.
    pub backoff_cap_ms: u64,
    /// Cadence of the fallback job poll.
    pub poll_interval: Duration,
    /// Coarser cadence for the mechanics roster, which changes rarely.
    pub mechanic_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_threshold: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
            poll_interval: Duration::from_secs(30),
            mechanic_poll_interval: Duration::from_secs(150),
        }
    }
}

impl EngineConfig {
    pub fn with_retry_threshold(mut self, retries: u32) -> Self {
        self.retry_threshold = retries;
        self
    }

    pub fn with_backoff(mut self, base_ms: u64, cap_ms: u64) -> Self {
        self.backoff_base_ms = base_ms;
        self.backoff_cap_ms = cap_ms;
        self
    }

    pub fn with_poll_intervals(mut self, jobs: Duration, mechanics: Duration) -> Self {
        self.poll_interval = jobs;
        self.mechanic_poll_interval = mechanics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_default() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.retry_threshold, 3);
        assert_eq!(cfg.backoff_base_ms, 1_000);
        assert_eq!(cfg.backoff_cap_ms, 30_000);
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.mechanic_poll_interval, Duration::from_secs(150));
    }

    #[test]
    fn engine_config_builders() {
        let cfg = EngineConfig::default()
            .with_retry_threshold(5)
            .with_backoff(10, 100)
            .with_poll_intervals(Duration::from_secs(5), Duration::from_secs(60));
        assert_eq!(cfg.retry_threshold, 5);
        assert_eq!(cfg.backoff_base_ms, 10);
        assert_eq!(cfg.backoff_cap_ms, 100);
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.mechanic_poll_interval, Duration::from_secs(60));
    }
}
