//! # compozit-realtime
//!
//! Real-time notification engine for Compozit. Provides:
//!
//! - A per-user pool of live WebSocket connections
//! - The [`NotificationHub`] that fans job events out to every connection of
//!   the job's owner and prunes connections that fail a write
//! - The [`JobEventBridge`] that plugs the hub into the job runtime
//! - Ping/pong heartbeat supervision

pub mod bridge;
pub mod connection;
pub mod hub;
pub mod message;

pub use bridge::JobEventBridge;
pub use connection::handle::{ConnectionHandle, ConnectionId};
pub use connection::heartbeat::{HeartbeatConfig, run_heartbeat};
pub use hub::NotificationHub;
pub use message::types::{HubMessage, InboundMessage, MessageType, OutboundFrame};
