//! Channel listing and publish DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Channel;

/// One entry of `GET /api/v1/channels`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChannelInfo {
    /// Channel name.
    pub channel: Channel,
    /// Connections currently subscribed.
    pub subscribers: usize,
}

/// Response body for `GET /api/v1/channels`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChannelListResponse {
    /// Every channel of the registry, in declaration order.
    pub channels: Vec<ChannelInfo>,
    /// Open connections.
    pub total_connections: usize,
}

/// Request body for `POST /api/v1/channels/{channel}/events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishRequest {
    /// Event tag, sent to clients as `type` (e.g. `new_article`).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Opaque payload.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

/// Response body for `POST /api/v1/channels/{channel}/events`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    /// Channel the event went to.
    pub channel: Channel,
    /// Event tag.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Connections the event was queued for.
    pub delivered: usize,
    /// When the event was accepted.
    pub published_at: DateTime<Utc>,
}
