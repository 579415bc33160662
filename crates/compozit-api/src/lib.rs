//! # compozit-api
//!
//! HTTP API layer for Compozit built on Axum.
//!
//! Provides the job endpoints, the WebSocket upgrade that feeds the
//! notification hub, middleware (CORS, logging), extractors, DTOs, and
//! error mapping.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
