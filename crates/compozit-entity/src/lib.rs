//! # compozit-entity
//!
//! Plain data types shared by the worker, realtime, and API crates: the job
//! record, its status and kind enumerations, the update/creation inputs,
//! and the lifecycle events published on every accepted change.

pub mod job;

pub use job::{
    Job, JobEvent, JobEventKind, JobEventSink, JobKind, JobStatus, JobUpdate, NewJob,
};
