//! Connection pool that tracks all active connections indexed by user ID.

use std::sync::Arc;

use dashmap::DashMap;

use compozit_core::types::UserId;

use super::handle::{ConnectionHandle, ConnectionId};

/// Thread-safe pool of all active WebSocket connections.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    /// User ID → connection handles, oldest first.
    by_user: DashMap<UserId, Vec<Arc<ConnectionHandle>>>,
    /// Connection ID → connection handle for direct lookup.
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionPool {
    /// Creates a new empty connection pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection, evicting the owner's oldest ones so that at most
    /// `max_per_user` remain. Returns the evicted handles.
    ///
    /// The owner's entry stays locked for the whole check-and-insert, so
    /// concurrent registrations for one user cannot exceed the limit.
    pub fn add_bounded(
        &self,
        handle: Arc<ConnectionHandle>,
        max_per_user: usize,
    ) -> Vec<Arc<ConnectionHandle>> {
        let max = max_per_user.max(1);
        let mut connections = self.by_user.entry(handle.owner_id.clone()).or_default();

        let excess = (connections.len() + 1).saturating_sub(max);
        let evicted: Vec<_> = connections.drain(..excess).collect();
        for old in &evicted {
            self.by_id.remove(&old.id);
        }

        self.by_id.insert(handle.id, handle.clone());
        connections.push(handle);
        evicted
    }

    /// Removes a connection from the pool.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.by_id.remove(conn_id)?;

        let now_empty = match self.by_user.get_mut(&handle.owner_id) {
            Some(mut connections) => {
                connections.retain(|c| c.id != *conn_id);
                connections.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.by_user
                .remove_if(&handle.owner_id, |_, connections| connections.is_empty());
        }
        Some(handle)
    }

    /// Snapshot of a user's connections, oldest first.
    pub fn get_user_connections(&self, owner_id: &UserId) -> Vec<Arc<ConnectionHandle>> {
        self.by_user
            .get(owner_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Gets a specific connection by ID.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(conn_id).map(|entry| entry.value().clone())
    }

    /// Returns total number of active connections.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Returns number of unique connected users.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Returns all connection handles.
    pub fn all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.by_id
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
