//! Worker pool: a fixed set of tasks pulling job ids off the dispatch channel.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing;

use compozit_core::types::JobId;
use compozit_entity::{JobStatus, JobUpdate};

use crate::dispatch::DispatchReceiver;
use crate::processor::{JobContext, ProcessingError};
use crate::queue::JobQueue;
use crate::registry::UpdateOutcome;
use crate::retry::RetryScheduler;

/// Error recorded on jobs whose processor was stopped by pool shutdown.
pub const INTERRUPTED_BY_SHUTDOWN: &str = "interrupted by shutdown";

/// Handle to the running worker tasks.
#[derive(Debug)]
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    receiver: DispatchReceiver,
    handles: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

#[derive(Debug, Clone)]
struct Worker {
    id: usize,
    queue: Arc<JobQueue>,
    receiver: DispatchReceiver,
    retry: Arc<RetryScheduler>,
    job_timeout: Duration,
}

impl WorkerPool {
    /// Spawn `count` workers (at least one).
    pub fn start(
        count: usize,
        queue: Arc<JobQueue>,
        receiver: DispatchReceiver,
        retry: Arc<RetryScheduler>,
    ) -> Self {
        let count = count.max(1);
        let job_timeout = queue.config().job_timeout();

        let handles = (0..count)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: Arc::clone(&queue),
                    receiver: receiver.clone(),
                    retry: Arc::clone(&retry),
                    job_timeout,
                };
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::info!(
            workers = count,
            job_timeout_secs = job_timeout.as_secs(),
            "Worker pool started"
        );

        Self {
            queue,
            receiver,
            handles: Mutex::new(handles),
            worker_count: count,
        }
    }

    /// Number of worker tasks.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Jobs currently being executed.
    pub fn active_jobs(&self) -> usize {
        self.queue.inflight().len()
    }

    /// Stop accepting work, let workers drain the backlog, and wait for them.
    ///
    /// If `grace` elapses first, every in-flight job is signalled to stop;
    /// workers still running after a second `grace` are aborted and their
    /// jobs failed.
    pub async fn shutdown(&self, grace: Duration) {
        tracing::info!("Worker pool shutting down, draining dispatch queue...");
        self.receiver.close().await;

        let handles: Vec<JoinHandle<()>> = self
            .handles
            .lock()
            .map(|mut guard| guard.drain(..).collect())
            .unwrap_or_default();
        if handles.is_empty() {
            return;
        }
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let all = join_all(handles);
        tokio::pin!(all);

        if tokio::time::timeout(grace, &mut all).await.is_ok() {
            tracing::info!("Worker pool shut down complete");
            return;
        }

        tracing::warn!(
            in_flight = self.active_jobs(),
            "Shutdown grace elapsed, cancelling in-flight jobs"
        );
        self.queue.inflight().cancel_all();

        if tokio::time::timeout(grace, &mut all).await.is_err() {
            tracing::error!("Workers did not stop after cancellation, aborting");
            for abort in aborts {
                abort.abort();
            }
            all.await;
            self.fail_abandoned();
        }
        tracing::info!("Worker pool shut down complete");
    }

    /// Fail jobs left behind by aborted workers.
    fn fail_abandoned(&self) {
        let inflight = self.queue.inflight();
        for job_id in inflight.ids() {
            tracing::warn!(job_id = %job_id, "Job interrupted by shutdown");
            if let Err(e) = self.queue.fail_job(&job_id, INTERRUPTED_BY_SHUTDOWN) {
                tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
            }
            inflight.remove(&job_id);
        }
    }
}

impl Worker {
    async fn run(self) {
        tracing::debug!(worker = self.id, "Worker started");

        while let Some(job_id) = self.receiver.recv().await {
            self.process(job_id).await;
        }

        tracing::debug!(worker = self.id, "Worker stopped");
    }

    async fn process(&self, job_id: JobId) {
        let job = match self.queue.get(&job_id) {
            Some(job) if job.status == JobStatus::Queued => job,
            Some(job) => {
                tracing::debug!(
                    worker = self.id,
                    job_id = %job_id,
                    status = %job.status,
                    "Skipping job that is no longer queued"
                );
                return;
            }
            None => {
                tracing::warn!(worker = self.id, job_id = %job_id, "Dispatched job not found");
                return;
            }
        };

        let Some(processor) = self.queue.processors().get(job.kind) else {
            let message = format!("No processor registered for job type '{}'", job.kind);
            tracing::error!(worker = self.id, job_id = %job_id, "{}", message);
            if let Err(e) = self.queue.fail_job(&job_id, &message) {
                tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
            }
            return;
        };

        let inflight = Arc::clone(self.queue.inflight());
        let token = inflight.register(&job_id);

        let job = match self.queue.update_status(&job_id, JobUpdate::processing()) {
            Ok(UpdateOutcome::Applied(job)) => job,
            Ok(UpdateOutcome::Ignored(_)) => {
                inflight.remove(&job_id);
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to claim job");
                inflight.remove(&job_id);
                return;
            }
        };

        tracing::info!(
            worker = self.id,
            job_id = %job_id,
            kind = %job.kind,
            attempt = job.retry_count + 1,
            max_attempts = job.max_retries + 1,
            "Processing job"
        );

        let deadline = Instant::now() + self.job_timeout;
        let ctx = JobContext::new(
            job_id.clone(),
            token.clone(),
            deadline,
            Arc::clone(&self.queue),
        );

        let started = std::time::Instant::now();
        let outcome = self.execute(processor.execute(&ctx, &job)).await;
        ctx.finish();

        if token.is_cancelled() {
            self.settle_cancelled(&job_id);
        } else {
            match outcome {
                Ok(result) => {
                    match self
                        .queue
                        .update_status(&job_id, JobUpdate::completed(result))
                    {
                        Ok(UpdateOutcome::Applied(_)) => tracing::info!(
                            worker = self.id,
                            job_id = %job_id,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Job completed"
                        ),
                        Ok(UpdateOutcome::Ignored(job)) => tracing::debug!(
                            job_id = %job_id,
                            status = %job.status,
                            "Discarding result for settled job"
                        ),
                        Err(e) => tracing::error!(
                            job_id = %job_id,
                            error = %e,
                            "Failed to mark job as completed"
                        ),
                    }
                }
                Err(err) => self.retry.on_failure(&job_id, &err),
            }
        }

        inflight.remove(&job_id);
    }

    /// Run a processor future under the job deadline, converting panics.
    async fn execute<F>(&self, fut: F) -> Result<Value, ProcessingError>
    where
        F: std::future::Future<Output = Result<Value, ProcessingError>>,
    {
        match tokio::time::timeout(self.job_timeout, AssertUnwindSafe(fut).catch_unwind()).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(worker = self.id, panic = %message, "Processor panicked");
                Err(ProcessingError::Panicked(message))
            }
            Err(_) => Err(ProcessingError::TimedOut(self.job_timeout)),
        }
    }

    fn settle_cancelled(&self, job_id: &JobId) {
        match self.queue.get(job_id) {
            Some(job) if job.status == JobStatus::Cancelled => {
                tracing::info!(worker = self.id, job_id = %job_id, "Abandoned cancelled job");
            }
            Some(_) => {
                tracing::warn!(worker = self.id, job_id = %job_id, "Job interrupted by shutdown");
                if let Err(e) = self.queue.fail_job(job_id, INTERRUPTED_BY_SHUTDOWN) {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
                }
            }
            None => {}
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
