//! Processor contract and the per-kind processor registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing;

use compozit_core::types::JobId;
use compozit_entity::{Job, JobKind};

use crate::queue::JobQueue;

/// Work executor for one job kind.
#[async_trait]
pub trait Processor: Send + Sync + std::fmt::Debug {
    /// The job kind this processor handles.
    fn kind(&self) -> JobKind;

    /// Run the job to completion.
    ///
    /// Long-running processors should poll [`JobContext::is_cancelled`] or
    /// await [`JobContext::cancel_token`] between units of work.
    async fn execute(&self, ctx: &JobContext, job: &Job) -> Result<Value, ProcessingError>;
}

/// Why a processor did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingError {
    /// Do not retry.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// May succeed on another attempt.
    #[error("{0}")]
    Transient(String),

    /// The processor observed its cancellation token and stopped.
    #[error("cancelled")]
    Cancelled,

    /// The processor exceeded its deadline.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The processor panicked.
    #[error("processor panicked: {0}")]
    Panicked(String),
}

impl ProcessingError {
    /// Shorthand for a retryable failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Shorthand for a non-retryable failure.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    /// Whether the retry scheduler may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::TimedOut(_) | Self::Panicked(_)
        )
    }
}

/// Handle given to a processor for one execution.
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: JobId,
    cancel: CancellationToken,
    attempt: CancellationToken,
    deadline: Instant,
    queue: Arc<JobQueue>,
}

impl JobContext {
    pub(crate) fn new(
        job_id: JobId,
        cancel: CancellationToken,
        deadline: Instant,
        queue: Arc<JobQueue>,
    ) -> Self {
        Self {
            job_id,
            cancel,
            attempt: CancellationToken::new(),
            deadline,
            queue,
        }
    }

    /// Close this attempt. Clones held past the processor's return stop
    /// reporting progress.
    pub(crate) fn finish(&self) {
        self.attempt.cancel();
    }

    /// Id of the job being executed.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Token that fires when the owner cancels or the pool shuts down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the job has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Return `Err(Cancelled)` if the job has been asked to stop.
    pub fn checkpoint(&self) -> Result<(), ProcessingError> {
        if self.is_cancelled() {
            Err(ProcessingError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Instant after which the worker abandons the execution.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Record intermediate progress. Lower values than the current one are ignored,
    /// as is anything reported after the attempt has returned.
    pub fn report_progress(&self, progress: u8) {
        if self.attempt.is_cancelled() {
            tracing::debug!(job_id = %self.job_id, progress, "Ignoring progress from a finished attempt");
            return;
        }
        if let Err(e) = self.queue.report_progress(&self.job_id, progress) {
            tracing::warn!(job_id = %self.job_id, error = %e, "Failed to record progress");
        }
    }
}

/// Dispatches jobs to the processor registered for their kind.
#[derive(Debug, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<JobKind, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor, replacing any previous one for the same kind.
    pub fn register(&mut self, processor: Arc<dyn Processor>) {
        let kind = processor.kind();
        tracing::info!("Registered processor for job type '{}'", kind);
        self.processors.insert(kind, processor);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, processor: Arc<dyn Processor>) -> Self {
        self.register(processor);
        self
    }

    /// Processor for `kind`, if any.
    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn Processor>> {
        self.processors.get(&kind).cloned()
    }

    /// Whether a processor is registered for `kind`.
    pub fn has_processor(&self, kind: JobKind) -> bool {
        self.processors.contains_key(&kind)
    }

    /// Kinds that currently have a processor.
    pub fn registered_kinds(&self) -> Vec<JobKind> {
        let mut kinds: Vec<JobKind> = self.processors.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}
