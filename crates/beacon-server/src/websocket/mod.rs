//! WebSocket gateway: connections, the hub, dispatch, heartbeat, and the
//! per-client session task.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod hub;
pub mod session;
