//! Notification hub: connection lifecycle and per-user fan-out.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use compozit_core::config::RealtimeConfig;
use compozit_core::types::UserId;

use crate::connection::handle::{ConnectionHandle, ConnectionId};
use crate::connection::pool::ConnectionPool;
use crate::message::builder;
use crate::message::types::{HubMessage, InboundMessage, OutboundFrame};

/// Tracks live connections and pushes messages to them.
///
/// Writes never happen while a pool lock is held: recipients are copied out
/// first, then each connection's buffer is written without blocking. Any
/// connection that fails a write is unregistered on the spot.
#[derive(Debug)]
pub struct NotificationHub {
    pool: ConnectionPool,
    config: RealtimeConfig,
}

impl NotificationHub {
    /// Creates a new hub.
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            pool: ConnectionPool::new(),
            config,
        }
    }

    /// Hub configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Registers a new connection for `owner_id`.
    ///
    /// Returns the connection handle and the receiver its writer task
    /// drains. If the user is already at `max_connections_per_user`, the
    /// oldest connection is closed to make room.
    pub fn register(
        &self,
        owner_id: UserId,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size.max(1));
        let handle = Arc::new(ConnectionHandle::new(owner_id.clone(), tx));

        let max = self.config.max_connections_per_user.max(1);
        let evicted = self.pool.add_bounded(handle.clone(), max);
        if !evicted.is_empty() {
            warn!(
                owner_id = %owner_id,
                evicted = evicted.len(),
                max,
                "User at max connections, oldest replaced"
            );
        }
        for oldest in &evicted {
            self.retire(oldest);
        }

        info!(
            conn_id = %handle.id,
            owner_id = %owner_id,
            connections = self.pool.connection_count(),
            "WebSocket connection registered"
        );

        let welcome = builder::build_connected(handle.id, &owner_id);
        self.deliver(&handle, &welcome);

        (handle, rx)
    }

    /// Removes a connection and tells its writer to close. Idempotent.
    pub fn unregister(&self, conn_id: &ConnectionId) -> bool {
        match self.pool.remove(conn_id) {
            Some(handle) => {
                self.retire(&handle);
                true
            }
            None => false,
        }
    }

    /// Tells the writer of a connection already removed from the pool to close.
    fn retire(&self, handle: &ConnectionHandle) {
        // best effort; mark_dead wakes the writer even if this fails
        let _ = handle.send(OutboundFrame::Close);
        handle.mark_dead();
        info!(
            conn_id = %handle.id,
            owner_id = %handle.owner_id,
            "WebSocket connection unregistered"
        );
    }

    /// Sends `message` to every connection of `owner_id`.
    ///
    /// Returns the number of connections that accepted it. Zero connections
    /// is not an error.
    pub fn notify(&self, owner_id: &UserId, message: &HubMessage) -> usize {
        let recipients = self.pool.get_user_connections(owner_id);
        if recipients.is_empty() {
            return 0;
        }
        self.fan_out(&recipients, message)
    }

    /// Sends `message` to every connection of every user.
    pub fn broadcast(&self, message: &HubMessage) -> usize {
        let recipients = self.pool.all_connections();
        self.fan_out(&recipients, message)
    }

    /// Handles a text frame from a client.
    pub async fn handle_inbound(&self, conn_id: &ConnectionId, raw: &str) {
        let Some(handle) = self.pool.get(conn_id) else {
            warn!(conn_id = %conn_id, "Message from unknown connection");
            return;
        };

        match serde_json::from_str::<InboundMessage>(raw) {
            Ok(InboundMessage::Pong { .. }) => handle.record_pong().await,
            Err(e) => debug!(conn_id = %conn_id, error = %e, "Ignoring unrecognised client message"),
        }
    }

    /// Records a pong frame for `conn_id`.
    pub async fn record_pong(&self, conn_id: &ConnectionId) {
        if let Some(handle) = self.pool.get(conn_id) {
            handle.record_pong().await;
        }
    }

    /// Returns total number of active connections.
    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    /// Returns number of unique connected users.
    pub fn user_count(&self) -> usize {
        self.pool.user_count()
    }

    /// Whether `owner_id` has at least one live connection.
    pub fn is_user_connected(&self, owner_id: &UserId) -> bool {
        !self.pool.get_user_connections(owner_id).is_empty()
    }

    /// Closes every connection. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let all = self.pool.all_connections();
        for handle in &all {
            self.unregister(&handle.id);
        }
        info!(closed = all.len(), "All WebSocket connections closed");
        all.len()
    }

    fn fan_out(&self, recipients: &[Arc<ConnectionHandle>], message: &HubMessage) -> usize {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to serialize hub message");
                return 0;
            }
        };

        let mut delivered = 0;
        for handle in recipients {
            if handle.send(OutboundFrame::Text(text.clone())) {
                delivered += 1;
            } else {
                warn!(
                    conn_id = %handle.id,
                    owner_id = %handle.owner_id,
                    "Write failed, removing connection"
                );
                self.unregister(&handle.id);
            }
        }
        delivered
    }

    fn deliver(&self, handle: &Arc<ConnectionHandle>, message: &HubMessage) {
        self.fan_out(std::slice::from_ref(handle), message);
    }
}
