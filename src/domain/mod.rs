//! Domain layer: channels, connection identity, and events.
//!
//! Everything here is plain data. Locking and delivery live in
//! [`crate::service::ConnectionManager`].

pub mod channel;
pub mod channel_registry;
pub mod connection_id;
pub mod event;

pub use channel::{Channel, resolve_channels};
pub use channel_registry::ChannelRegistry;
pub use connection_id::ConnectionId;
pub use event::Event;
