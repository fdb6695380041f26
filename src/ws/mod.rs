//! WebSocket layer: connection loop, message types, heartbeat.
//!
//! The endpoint at `/ws` streams channel broadcasts to clients and accepts
//! `subscribe`, `unsubscribe`, `ping` and `get_stats` commands.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod messages;
