//! Pool configuration, builder-style with an environment-overridable
//! `from_env()` constructor — the same shape as the teacher's
//! `gvthread_runtime::config::SchedulerConfig::from_env()`.

use std::time::Duration;

use cache_core::env::env_get;

/// Constructor parameters for [`crate::WorkerPool`] (spec §6).
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Baseline worker count; also the initial spawn count on `start()`.
    pub low_watermark: usize,
    /// Hard ceiling on worker count.
    pub high_watermark: usize,
    /// Queue admits a task iff `queue.len() > max_queue_size` is false
    /// (the strict inequality is the defined contract — the queue can
    /// hold `max_queue_size + 1` entries at peak).
    pub max_queue_size: usize,
    /// Per-wait timeout before a worker above `low_watermark` considers
    /// contracting.
    pub idle_time: Duration,
}

impl PoolConfig {
    /// Panics if `low_watermark == 0` or `high_watermark <= low_watermark`
    /// — these are constructor preconditions (spec §6), not recoverable
    /// runtime faults.
    pub fn new(low_watermark: usize, high_watermark: usize, max_queue_size: usize, idle_time: Duration) -> Self {
        assert!(low_watermark > 0, "low_watermark must be > 0");
        assert!(
            high_watermark > low_watermark,
            "high_watermark must be > low_watermark"
        );
        Self {
            low_watermark,
            high_watermark,
            max_queue_size,
            idle_time,
        }
    }

    /// Defaults layered with environment-variable overrides:
    /// `POOL_LOW_WATERMARK`, `POOL_HIGH_WATERMARK`, `POOL_MAX_QUEUE_SIZE`,
    /// `POOL_IDLE_TIME_MS`.
    pub fn from_env() -> Self {
        let low_watermark = env_get("POOL_LOW_WATERMARK", 4usize);
        let high_watermark = env_get("POOL_HIGH_WATERMARK", 16usize);
        let max_queue_size = env_get("POOL_MAX_QUEUE_SIZE", 128usize);
        let idle_time_ms = env_get("POOL_IDLE_TIME_MS", 500u64);
        Self::new(
            low_watermark,
            high_watermark,
            max_queue_size,
            Duration::from_millis(idle_time_ms),
        )
    }

    pub fn low_watermark(mut self, v: usize) -> Self {
        self.low_watermark = v;
        self
    }

    pub fn high_watermark(mut self, v: usize) -> Self {
        self.high_watermark = v;
        self
    }

    pub fn max_queue_size(mut self, v: usize) -> Self {
        self.max_queue_size = v;
        self
    }

    pub fn idle_time(mut self, v: Duration) -> Self {
        self.idle_time = v;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(4, 16, 128, Duration::from_millis(500))
    }
}
