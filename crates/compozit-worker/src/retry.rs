//! Retry scheduler: a single task owning a min-heap of delayed re-dispatches.
//!
//! Workers report failures through [`RetryScheduler::on_failure`]. The
//! registry decides between retry and terminal failure; retries are then
//! parked in the heap until their backoff elapses and re-sent on the
//! dispatch channel. A retry that cannot be re-sent fails the job, so no job
//! is ever left `queued` without a path back to a worker.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing;

use compozit_core::config::WorkerConfig;
use compozit_core::types::JobId;
use compozit_entity::{JobEventKind, JobStatus};

use crate::dispatch::DispatchError;
use crate::processor::ProcessingError;
use crate::queue::JobQueue;
use crate::registry::RetryDecision;

/// Error recorded on jobs still waiting for a retry when the scheduler stops.
pub const SHUTDOWN_BEFORE_RETRY: &str = "shutdown before retry";

/// Error recorded when a due retry finds the dispatch channel full.
pub const QUEUE_FULL_ON_RETRY: &str = "dispatch queue full on retry";

/// Exponential backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay unit.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Policy from the worker configuration.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.retry_base_delay(), config.retry_max_delay())
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct RetryEntry {
    fire_at: Instant,
    seq: u64,
    job_id: JobId,
}

#[derive(Debug)]
enum Command {
    Schedule { job_id: JobId, fire_at: Instant },
    Shutdown(oneshot::Sender<usize>),
}

/// Handle to the retry task.
#[derive(Debug)]
pub struct RetryScheduler {
    queue: Arc<JobQueue>,
    policy: RetryPolicy,
    commands: mpsc::UnboundedSender<Command>,
    pending: Arc<AtomicUsize>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RetryScheduler {
    /// Spawn the retry task.
    pub fn start(queue: Arc<JobQueue>, policy: RetryPolicy) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn(run(Arc::clone(&queue), rx, Arc::clone(&pending)));

        tracing::info!(
            base_delay_ms = policy.base_delay.as_millis() as u64,
            max_delay_ms = policy.max_delay.as_millis() as u64,
            "Retry scheduler started"
        );

        Self {
            queue,
            policy,
            commands,
            pending,
            task: Mutex::new(Some(task)),
        }
    }

    /// Record a processing failure for a job that was `processing`.
    pub fn on_failure(&self, job_id: &JobId, error: &ProcessingError) {
        let message = error.to_string();

        if !error.is_retryable() {
            tracing::warn!(job_id = %job_id, error = %message, "Job failed permanently");
            self.fail(job_id, &message);
            return;
        }

        let decision = match self.queue.registry().schedule_retry(job_id, &message) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record job failure");
                return;
            }
        };

        match decision {
            RetryDecision::Retry { attempt, job } => {
                let delay = self.policy.delay_for(attempt);
                tracing::warn!(
                    job_id = %job_id,
                    attempt,
                    max_retries = job.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "Job failed, scheduling retry"
                );
                self.queue.publish(JobEventKind::Updated, job);

                self.pending.fetch_add(1, Ordering::SeqCst);
                let command = Command::Schedule {
                    job_id: job_id.clone(),
                    fire_at: Instant::now() + delay,
                };
                if self.commands.send(command).is_err() {
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    self.fail(job_id, SHUTDOWN_BEFORE_RETRY);
                }
            }
            RetryDecision::Exhausted(job) => {
                tracing::error!(
                    job_id = %job_id,
                    retries = job.retry_count,
                    error = %message,
                    "Job failed after exhausting retries"
                );
                self.queue.publish(JobEventKind::Failed, job);
            }
            RetryDecision::Abandoned(job) => {
                tracing::debug!(job_id = %job_id, status = %job.status, "Failure ignored for settled job");
            }
        }
    }

    /// Retries waiting for their delay to elapse.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stop the task and fail every pending retry. Returns how many were failed.
    pub async fn shutdown(&self) -> usize {
        let (ack_tx, ack_rx) = oneshot::channel();
        let drained = if self.commands.send(Command::Shutdown(ack_tx)).is_ok() {
            ack_rx.await.unwrap_or(0)
        } else {
            0
        };

        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Retry scheduler task ended abnormally");
            }
        }

        tracing::info!(drained, "Retry scheduler stopped");
        drained
    }

    fn fail(&self, job_id: &JobId, error: &str) {
        if let Err(e) = self.queue.fail_job(job_id, error) {
            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
        }
    }
}

async fn run(
    queue: Arc<JobQueue>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    pending: Arc<AtomicUsize>,
) {
    let mut heap: BinaryHeap<Reverse<RetryEntry>> = BinaryHeap::new();
    let mut seq: u64 = 0;
    // placeholder deadline while the heap is empty; the branch is disabled then
    let idle = Duration::from_secs(24 * 60 * 60);

    loop {
        let next_fire = heap
            .peek()
            .map(|Reverse(entry)| entry.fire_at)
            .unwrap_or_else(|| Instant::now() + idle);

        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Schedule { job_id, fire_at }) => {
                    seq += 1;
                    heap.push(Reverse(RetryEntry { fire_at, seq, job_id }));
                }
                Some(Command::Shutdown(ack)) => {
                    let drained = drain(&queue, &mut heap, &pending);
                    let _ = ack.send(drained);
                    return;
                }
                None => {
                    drain(&queue, &mut heap, &pending);
                    return;
                }
            },
            _ = tokio::time::sleep_until(next_fire), if !heap.is_empty() => {
                let now = Instant::now();
                while heap.peek().is_some_and(|Reverse(entry)| entry.fire_at <= now) {
                    if let Some(Reverse(entry)) = heap.pop() {
                        pending.fetch_sub(1, Ordering::SeqCst);
                        redispatch(&queue, entry.job_id);
                    }
                }
            }
        }
    }
}

fn redispatch(queue: &JobQueue, job_id: JobId) {
    match queue.get(&job_id) {
        Some(job) if job.status == JobStatus::Queued => {}
        Some(job) => {
            tracing::debug!(job_id = %job_id, status = %job.status, "Dropping retry for settled job");
            return;
        }
        None => return,
    }

    let error = match queue.dispatch().try_dispatch(job_id.clone()) {
        Ok(()) => {
            tracing::debug!(job_id = %job_id, "Retry dispatched");
            return;
        }
        Err(DispatchError::Full) => QUEUE_FULL_ON_RETRY,
        Err(DispatchError::Closed) => SHUTDOWN_BEFORE_RETRY,
    };

    tracing::warn!(job_id = %job_id, error, "Could not re-dispatch retry");
    if let Err(e) = queue.fail_job(&job_id, error) {
        tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
    }
}

fn drain(queue: &JobQueue, heap: &mut BinaryHeap<Reverse<RetryEntry>>, pending: &AtomicUsize) -> usize {
    let mut drained = 0;
    while let Some(Reverse(entry)) = heap.pop() {
        pending.fetch_sub(1, Ordering::SeqCst);
        match queue.fail_job(&entry.job_id, SHUTDOWN_BEFORE_RETRY) {
            Ok(outcome) if outcome.is_applied() => drained += 1,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(job_id = %entry.job_id, error = %e, "Failed to mark job as failed");
            }
        }
    }
    drained
}
