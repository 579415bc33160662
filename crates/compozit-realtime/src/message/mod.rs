//! Wire envelope and builders.

pub mod builder;
pub mod types;
