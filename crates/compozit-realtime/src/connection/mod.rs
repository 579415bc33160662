//! WebSocket connection tracking.

pub mod handle;
pub mod heartbeat;
pub mod pool;
