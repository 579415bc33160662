//! Ping/pong heartbeat for WebSocket keepalive.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{self, MissedTickBehavior};
use tracing;

use compozit_core::config::RealtimeConfig;

use super::handle::ConnectionHandle;
use crate::hub::NotificationHub;
use crate::message::types::OutboundFrame;

/// Heartbeat configuration
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// Interval between pings
    pub ping_interval: Duration,
    /// Extra time a pong may take before the connection is considered dead
    pub ping_timeout: Duration,
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            ping_timeout: config.ping_timeout(),
        }
    }
}

/// Run heartbeat loop for a connection.
///
/// Sends a ping every interval. A connection whose last pong is older than
/// `ping_interval + ping_timeout`, or whose ping cannot be queued, is
/// unregistered from the hub. The loop also ends as soon as the connection
/// is closed by any other path.
pub async fn run_heartbeat(
    hub: Arc<NotificationHub>,
    handle: Arc<ConnectionHandle>,
    config: HeartbeatConfig,
) {
    let mut interval = time::interval_at(
        time::Instant::now() + config.ping_interval,
        config.ping_interval,
    );
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = config.ping_interval + config.ping_timeout;

    loop {
        tokio::select! {
            _ = handle.closed() => break,
            _ = interval.tick() => {}
        }

        let elapsed = (Utc::now() - handle.last_pong().await)
            .to_std()
            .unwrap_or_default();
        if elapsed > deadline {
            tracing::warn!(
                conn_id = %handle.id,
                owner_id = %handle.owner_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Heartbeat timeout, closing connection"
            );
            hub.unregister(&handle.id);
            break;
        }

        if !handle.send(OutboundFrame::Ping) {
            tracing::debug!(conn_id = %handle.id, "Ping send failed, closing connection");
            hub.unregister(&handle.id);
            break;
        }
    }

    tracing::debug!(conn_id = %handle.id, "Heartbeat loop ended");
}
