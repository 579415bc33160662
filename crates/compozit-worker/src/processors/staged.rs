//! Simulated processor that walks through timed progress stages.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing;

use compozit_entity::{Job, JobKind};

use crate::processor::{JobContext, ProcessingError, Processor};

/// One step of simulated work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    /// Progress reported once the stage finishes.
    pub progress: u8,
    /// How long the stage takes.
    pub duration: Duration,
}

impl Stage {
    /// Create a stage.
    pub const fn new(progress: u8, duration: Duration) -> Self {
        Self { progress, duration }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    None,
    /// Fail transiently on the first `n` executions.
    TransientTimes(u32),
    Always,
    Permanent,
    Panic,
}

/// Processor that sleeps through a list of stages, reporting progress after
/// each, and returns a small JSON result.
#[derive(Debug)]
pub struct StagedProcessor {
    kind: JobKind,
    stages: Vec<Stage>,
    failure: FailureMode,
    executions: AtomicU32,
}

impl StagedProcessor {
    /// Processor with explicit stages.
    pub fn new(kind: JobKind, stages: Vec<Stage>) -> Self {
        Self {
            kind,
            stages,
            failure: FailureMode::None,
            executions: AtomicU32::new(0),
        }
    }

    /// Processor that completes immediately.
    pub fn instant(kind: JobKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Default simulated timing for each kind.
    pub fn for_kind(kind: JobKind) -> Self {
        let secs = Duration::from_secs;
        let stages = match kind {
            JobKind::QuickRender => vec![Stage::new(25, secs(1)), Stage::new(90, secs(2))],
            JobKind::DetailedRender => vec![Stage::new(25, secs(2)), Stage::new(90, secs(6))],
            JobKind::Model3d => std::iter::once(Stage::new(10, secs(1)))
                .chain((2..9).map(|step| Stage::new(step * 10, secs(5))))
                .collect(),
            JobKind::Inpainting => vec![Stage::new(30, secs(1)), Stage::new(90, secs(3))],
            JobKind::StyleTransfer => vec![Stage::new(40, secs(1)), Stage::new(90, secs(3))],
            JobKind::Export => vec![Stage::new(50, secs(2))],
        };
        Self::new(kind, stages)
    }

    /// Fail with a retryable error on the first `times` executions.
    pub fn failing_times(mut self, times: u32) -> Self {
        self.failure = FailureMode::TransientTimes(times);
        self
    }

    /// Fail with a retryable error on every execution.
    pub fn always_failing(mut self) -> Self {
        self.failure = FailureMode::Always;
        self
    }

    /// Fail with a non-retryable error on every execution.
    pub fn permanently_failing(mut self) -> Self {
        self.failure = FailureMode::Permanent;
        self
    }

    /// Panic on every execution.
    pub fn panicking(mut self) -> Self {
        self.failure = FailureMode::Panic;
        self
    }

    /// Number of times `execute` has been entered.
    pub fn executions(&self) -> u32 {
        self.executions.load(Ordering::SeqCst)
    }

    fn result_for(&self, job: &Job) -> Value {
        match self.kind {
            JobKind::Export => json!({
                "export_url": format!("/api/exports/{}.pdf", job.id),
                "format": "pdf",
            }),
            JobKind::Model3d => json!({
                "model_url": format!("/api/models/{}.glb", job.id),
                "format": "glb",
            }),
            _ => json!({
                "image_url": format!("/api/renders/{}.png", job.id),
                "type": self.kind.as_str(),
            }),
        }
    }
}

#[async_trait]
impl Processor for StagedProcessor {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, ctx: &JobContext, job: &Job) -> Result<Value, ProcessingError> {
        let attempt = self.executions.fetch_add(1, Ordering::SeqCst) + 1;

        match self.failure {
            FailureMode::Panic => panic!("simulated panic in {} processor", self.kind),
            FailureMode::Permanent => {
                return Err(ProcessingError::permanent("simulated permanent failure"));
            }
            _ => {}
        }

        for stage in &self.stages {
            tokio::select! {
                _ = ctx.cancel_token().cancelled() => return Err(ProcessingError::Cancelled),
                _ = tokio::time::sleep(stage.duration) => {}
            }
            ctx.report_progress(stage.progress);
        }
        ctx.checkpoint()?;

        match self.failure {
            FailureMode::Always => {
                return Err(ProcessingError::transient(format!(
                    "simulated failure on attempt {attempt}"
                )));
            }
            FailureMode::TransientTimes(n) if attempt <= n => {
                return Err(ProcessingError::transient(format!(
                    "simulated failure on attempt {attempt}"
                )));
            }
            _ => {}
        }

        tracing::debug!(job_id = %job.id, kind = %self.kind, "Staged processing finished");
        Ok(self.result_for(job))
    }
}
