//! Individual WebSocket connection handle.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

use compozit_core::types::UserId;

use crate::message::types::OutboundFrame;

/// Unique connection identifier
pub type ConnectionId = Uuid;

/// A handle to a single WebSocket connection.
///
/// Holds the sender channel feeding the connection's writer task plus
/// liveness metadata. Sends never block: a full buffer means the client is
/// not keeping up and the connection is treated as dead.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// User who owns this connection
    pub owner_id: UserId,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<OutboundFrame>,
    last_pong: RwLock<DateTime<Utc>>,
    alive: AtomicBool,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(owner_id: UserId, sender: mpsc::Sender<OutboundFrame>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            connected_at: now,
            sender,
            last_pong: RwLock::new(now),
            alive: AtomicBool::new(true),
            closed: CancellationToken::new(),
        }
    }

    /// Queue a frame for the writer task. Returns `false` and marks the
    /// connection dead if the buffer is full or the writer is gone.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Connection send buffer full, dropping connection");
                self.mark_dead();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark connection as dead and wake its writer task
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.closed.cancel();
    }

    /// Resolves once the connection has been marked dead.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Record a pong response
    pub async fn record_pong(&self) {
        let mut lp = self.last_pong.write().await;
        *lp = Utc::now();
    }

    /// When the last pong arrived (or the connection time, if none has).
    pub async fn last_pong(&self) -> DateTime<Utc> {
        *self.last_pong.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_buffer_marks_dead() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new(UserId::from("u1"), tx);

        assert!(handle.send(OutboundFrame::Ping));
        assert!(!handle.send(OutboundFrame::Ping));
        assert!(!handle.is_alive());
        handle.closed().await;
    }

    #[tokio::test]
    async fn test_closed_receiver_marks_dead() {
        let (tx, rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new(UserId::from("u1"), tx);
        drop(rx);

        assert!(!handle.send(OutboundFrame::Text("{}".into())));
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn test_record_pong_moves_forward() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new(UserId::from("u1"), tx);
        let before = handle.last_pong().await;
        handle.record_pong().await;
        assert!(handle.last_pong().await >= before);
    }
}
