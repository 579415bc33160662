//! Asynchronous job execution for Compozit.
//!
//! This crate provides:
//! - A job registry (trait + in-memory striped-lock store)
//! - A bounded dispatch channel that applies backpressure on submission
//! - The [`JobQueue`] facade used by request handlers
//! - A fixed-size worker pool that invokes per-kind processors
//! - A single-task retry scheduler backed by a min-heap delay queue
//! - A built-in staged processor used for simulated work and tests

pub mod dispatch;
pub mod inflight;
pub mod pool;
pub mod processor;
pub mod processors;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod runtime;

pub use pool::WorkerPool;
pub use processor::{JobContext, ProcessingError, Processor, ProcessorRegistry};
pub use queue::{JobFilter, JobQueue, QueueStats};
pub use registry::{JobRegistry, MemoryJobRegistry};
pub use retry::{RetryPolicy, RetryScheduler};
pub use runtime::{JobRuntime, RuntimeStats};
