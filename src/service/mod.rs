//! Service layer: connection and membership orchestration.
//!
//! [`ConnectionManager`] owns the live connection table and the channel
//! registry, and performs every broadcast fan-out.

pub mod connection_manager;

pub use connection_manager::{ConnectionManager, Outbound};
