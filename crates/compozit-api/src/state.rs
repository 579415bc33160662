//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use compozit_core::config::AppConfig;
use compozit_realtime::NotificationHub;
use compozit_worker::JobQueue;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Job submission, lookup, and cancellation
    pub queue: Arc<JobQueue>,
    /// WebSocket notification hub
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Arc<AppConfig>, queue: Arc<JobQueue>, hub: Arc<NotificationHub>) -> Self {
        Self { config, queue, hub }
    }
}
