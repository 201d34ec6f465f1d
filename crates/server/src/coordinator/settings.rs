use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// How long a record, and so a key, is retained after creation.
    pub ttl: Duration,
    /// Upper bound a duplicate waits for the original to finish.
    pub max_wait: Duration,
    /// A `PENDING` record older than this is presumed abandoned and may be reclaimed.
    pub stale_after: Duration,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub sweep_interval: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            max_wait: Duration::from_secs(10),
            stale_after: Duration::from_secs(60),
            poll_interval: Duration::from_millis(25),
            max_poll_interval: Duration::from_millis(500),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CoordinatorSettings {
    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.max_poll_interval.as_secs().max(1))
    }
}
