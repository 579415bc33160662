//! Built-in processors.

pub mod staged;

pub use staged::{Stage, StagedProcessor};
