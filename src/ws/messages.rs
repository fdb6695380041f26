//! WebSocket message types: server messages, client commands, stats.
//!
//! Every server → client message is a JSON object with a `type`
//! discriminator. Broadcast events carry their own tag as `type`, so they
//! are modelled as an untagged variant wrapping [`EventEnvelope`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Channel, ConnectionId};
use crate::error::GatewayError;

/// A serialized server message, shared between all recipients of a broadcast.
pub type Frame = Arc<str>;

/// Server → client message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once, right after a connection is accepted.
    Connection {
        /// Always `connected`.
        status: ConnectionStatus,
        /// Identifier assigned to the connection.
        connection_id: ConnectionId,
        /// Channels the connection was actually subscribed to.
        channels: Vec<Channel>,
        /// Requested names that are not known channels.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        ignored: Vec<String>,
        /// Acceptance time.
        timestamp: DateTime<Utc>,
    },
    /// Acknowledgement of a subscribe or unsubscribe command.
    Subscription {
        /// Which membership change this acknowledges.
        action: SubscriptionAction,
        /// Channels whose membership actually changed.
        channels: Vec<Channel>,
        /// Requested names that are not known channels.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        ignored: Vec<String>,
    },
    /// Reply to a client `ping`.
    Pong,
    /// Server-initiated keep-alive.
    Ping {
        /// Send time.
        timestamp: DateTime<Utc>,
    },
    /// Reply to `get_stats`.
    Stats {
        /// Snapshot of the connection manager.
        data: StatsSnapshot,
    },
    /// A command could not be handled. The connection stays open.
    Error {
        /// Human-readable reason.
        message: String,
    },
    /// A broadcast event; serialized with its own tag as `type`.
    #[serde(untagged)]
    Event(EventEnvelope),
}

impl ServerMessage {
    /// Serializes the message into a shareable [`Frame`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Serialization`] if the payload cannot be
    /// encoded as JSON.
    pub fn to_frame(&self) -> Result<Frame, GatewayError> {
        Ok(Arc::from(serde_json::to_string(self)?))
    }

    /// Builds an `error` message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Status carried by the `connection` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// The connection was registered.
    Connected,
}

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionAction {
    /// Channels were added.
    Subscribed,
    /// Channels were removed.
    Unsubscribed,
}

/// A published event as delivered to clients.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Event tag.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Channel the event was published on.
    pub channel: Channel,
    /// Opaque payload.
    pub data: serde_json::Value,
    /// Delivery timestamp, assigned at publish time.
    pub timestamp: DateTime<Utc>,
}

/// Client → server command, discriminated by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Add channels to the connection's memberships.
    Subscribe {
        /// Channel names; unknown names are ignored.
        #[serde(default)]
        channels: Vec<String>,
    },
    /// Remove channels from the connection's memberships.
    Unsubscribe {
        /// Channel names; unknown names are ignored.
        #[serde(default)]
        channels: Vec<String>,
    },
    /// Application-level ping; answered with `pong`.
    Ping,
    /// Request a stats snapshot.
    GetStats,
}

impl ClientCommand {
    /// Action names understood by the server.
    pub const ACTIONS: [&'static str; 4] = ["subscribe", "unsubscribe", "ping", "get_stats"];
}

/// Why an inbound text frame could not be turned into a [`ClientCommand`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Not JSON, or a known action with malformed arguments.
    #[error("invalid message: {0}")]
    Malformed(String),
    /// The object has no string `action` field.
    #[error("missing action")]
    MissingAction,
    /// The `action` is not one the server understands.
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

/// Parses an inbound text frame.
///
/// # Errors
///
/// Returns a [`CommandError`] describing why the frame was rejected. The
/// error text is sent back to the client verbatim.
pub fn parse_command(text: &str) -> Result<ClientCommand, CommandError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| CommandError::Malformed(e.to_string()))?;
    let action = value
        .get("action")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or(CommandError::MissingAction)?;
    if !ClientCommand::ACTIONS.contains(&action.as_str()) {
        return Err(CommandError::UnknownAction(action));
    }
    serde_json::from_value(value).map_err(|e| CommandError::Malformed(e.to_string()))
}

/// Read-only snapshot of the distribution layer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatsSnapshot {
    /// Number of open connections.
    pub total_connections: usize,
    /// Subscriber count per channel, including empty channels.
    #[schema(value_type = Object)]
    pub subscriptions: BTreeMap<Channel, usize>,
    /// Per-connection detail, oldest first.
    pub connections: Vec<ConnectionInfo>,
}

/// Per-connection detail in a [`StatsSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionInfo {
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// Acceptance time.
    pub connected_at: DateTime<Utc>,
    /// Current memberships.
    pub channels: Vec<Channel>,
    /// Last time the client sent anything.
    pub last_ping: DateTime<Utc>,
}
