//! Job domain entities.

pub mod event;
pub mod kind;
pub mod model;
pub mod status;

pub use event::{JobEvent, JobEventKind, JobEventSink};
pub use kind::JobKind;
pub use model::{Job, JobUpdate, NewJob};
pub use status::JobStatus;
