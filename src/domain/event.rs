//! Events published into the distribution layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An application event waiting to be broadcast on a channel.
///
/// The payload is free-form JSON; only the tag is interpreted, and only as
/// the outbound `type` field. Channel and delivery timestamp are attached by
/// [`crate::service::ConnectionManager::publish`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    /// Event tag sent to clients as `type` (e.g. `"alert"`, `"new_article"`).
    #[serde(rename = "type")]
    pub tag: String,
    /// Opaque payload.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl Event {
    /// Creates a new event with the given tag and payload.
    #[must_use]
    pub fn new(tag: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            tag: tag.into(),
            data,
        }
    }
}
