//! Job worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Job worker pool, dispatch channel, and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent executors.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Capacity of the bounded dispatch channel.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Default retry ceiling assigned to new jobs.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Highest `max_retries` a submitter may request.
    #[serde(default = "default_max_retries_ceiling")]
    pub max_retries_ceiling: u32,
    /// Base delay for exponential retry backoff, in milliseconds.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    /// Upper bound for a single retry delay, in milliseconds.
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
    /// Deadline for a single processor execution, in seconds.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_seconds: u64,
    /// How long shutdown waits for in-flight jobs before cancelling them.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    /// Maximum page size for job listings.
    #[serde(default = "default_list_limit_max")]
    pub list_limit_max: usize,
}

impl WorkerConfig {
    /// Base retry delay as a [`Duration`].
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Maximum retry delay as a [`Duration`].
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    /// Processor deadline as a [`Duration`].
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    /// Shutdown grace as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
            max_retries: default_max_retries(),
            max_retries_ceiling: default_max_retries_ceiling(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            job_timeout_seconds: default_job_timeout(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
            list_limit_max: default_list_limit_max(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_retries_ceiling() -> u32 {
    10
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_retry_max_delay() -> u64 {
    60_000
}

fn default_job_timeout() -> u64 {
    600
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_list_limit_max() -> usize {
    200
}
