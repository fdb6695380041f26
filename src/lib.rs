//! # trading-gateway
//!
//! Real-time event distribution for a trading platform.
//!
//! Clients hold WebSocket connections subscribed to a fixed set of channels
//! (`alerts`, `prices`, `indicators`, `news`, `activity`). Events reach them
//! from two directions: the stream bridge, which keeps upstream SSE streams
//! open and republishes every `data:` line, and the REST publish endpoint
//! used by in-cluster producers.
//!
//! ## Architecture
//!
//! ```text
//! Upstream SSE streams          Clients (WebSocket, HTTP)
//!     │                               │
//!     ├── StreamBridge (bridge/)      ├── WS Handler (ws/)
//!     │                               ├── REST Handlers (api/)
//!     │                               │
//!     └──────► ConnectionManager (service/) ◄──┘
//!                     │
//!                     ├── ChannelRegistry (domain/)
//!                     └── per-connection outbound queues
//! ```

pub mod api;
pub mod app_state;
pub mod bridge;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
