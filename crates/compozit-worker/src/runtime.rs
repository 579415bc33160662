//! Wires the registry, dispatch channel, worker pool, and retry scheduler.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing;

use compozit_core::config::WorkerConfig;
use compozit_entity::JobEventSink;

use crate::dispatch;
use crate::inflight::InFlightJobs;
use crate::pool::WorkerPool;
use crate::processor::ProcessorRegistry;
use crate::queue::{JobQueue, QueueStats};
use crate::registry::JobRegistry;
use crate::retry::{RetryPolicy, RetryScheduler};

/// Snapshot for health reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeStats {
    /// Queue and registry counters.
    #[serde(flatten)]
    pub queue: QueueStats,
    /// Worker task count.
    pub workers: usize,
    /// Retries waiting for their backoff.
    pub pending_retries: usize,
}

/// The running job subsystem.
#[derive(Debug)]
pub struct JobRuntime {
    queue: Arc<JobQueue>,
    pool: WorkerPool,
    retry: Arc<RetryScheduler>,
    shutdown_timeout: Duration,
}

impl JobRuntime {
    /// Build the subsystem and spawn its tasks. Must be called inside a Tokio runtime.
    pub fn start(
        config: &WorkerConfig,
        registry: Arc<dyn JobRegistry>,
        processors: ProcessorRegistry,
        events: Arc<dyn JobEventSink>,
    ) -> Self {
        let (sender, receiver) = dispatch::channel(config.queue_capacity);

        let queue = Arc::new(JobQueue::new(
            registry,
            sender,
            events,
            Arc::new(InFlightJobs::new()),
            Arc::new(processors),
            config.clone(),
        ));

        let retry = Arc::new(RetryScheduler::start(
            Arc::clone(&queue),
            RetryPolicy::from_config(config),
        ));
        let pool = WorkerPool::start(
            config.concurrency,
            Arc::clone(&queue),
            receiver,
            Arc::clone(&retry),
        );

        tracing::info!(
            concurrency = pool.worker_count(),
            queue_capacity = config.queue_capacity,
            max_retries = config.max_retries,
            "Job runtime started"
        );

        Self {
            queue,
            pool,
            retry,
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// The facade handed to request handlers.
    pub fn queue(&self) -> Arc<JobQueue> {
        Arc::clone(&self.queue)
    }

    /// Current counters.
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            queue: self.queue.stats(),
            workers: self.pool.worker_count(),
            pending_retries: self.retry.pending(),
        }
    }

    /// Drain the worker pool, then fail any retry still waiting.
    pub async fn shutdown(&self) {
        self.pool.shutdown(self.shutdown_timeout).await;
        let failed = self.retry.shutdown().await;
        tracing::info!(failed_retries = failed, "Job runtime stopped");
    }
}
