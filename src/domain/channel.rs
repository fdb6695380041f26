//! The fixed set of broadcast channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// A named broadcast topic.
///
/// The set is closed: clients can only subscribe to these five channels and
/// nothing creates new ones at runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Signal alerts forwarded from the signal service.
    Alerts,
    /// Live price updates.
    Prices,
    /// Technical indicator updates.
    Indicators,
    /// News articles and sentiment.
    News,
    /// Signal-service activity feed.
    Activity,
}

impl Channel {
    /// Every channel, in registry order.
    pub const ALL: [Self; 5] = [
        Self::Alerts,
        Self::Prices,
        Self::Indicators,
        Self::News,
        Self::Activity,
    ];

    /// Returns the wire name of the channel.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alerts => "alerts",
            Self::Prices => "prices",
            Self::Indicators => "indicators",
            Self::News => "news",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str() == s)
            .ok_or_else(|| GatewayError::UnknownChannel(s.to_string()))
    }
}

/// Splits requested channel names into known channels and unknown names.
///
/// Known channels are deduplicated and keep their first-seen order. Unknown
/// names are returned verbatim so callers can log or echo them.
#[must_use]
pub fn resolve_channels<S: AsRef<str>>(names: &[S]) -> (Vec<Channel>, Vec<String>) {
    let mut known = Vec::with_capacity(names.len());
    let mut unknown = Vec::new();
    for name in names {
        let name = name.as_ref();
        match name.parse::<Channel>() {
            Ok(channel) => {
                if !known.contains(&channel) {
                    known.push(channel);
                }
            }
            Err(_) => unknown.push(name.to_string()),
        }
    }
    (known, unknown)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_channel() {
        for channel in Channel::ALL {
            let Ok(parsed) = channel.as_str().parse::<Channel>() else {
                panic!("{channel} should parse");
            };
            assert_eq!(parsed, channel);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let result = "orders".parse::<Channel>();
        assert!(matches!(result, Err(GatewayError::UnknownChannel(name)) if name == "orders"));
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!("Alerts".parse::<Channel>().is_err());
    }

    #[test]
    fn resolve_splits_and_dedupes() {
        let (known, unknown) = resolve_channels(&["news", "bogus", "alerts", "news"]);
        assert_eq!(known, vec![Channel::News, Channel::Alerts]);
        assert_eq!(unknown, vec!["bogus".to_string()]);
    }

    #[test]
    fn serde_uses_wire_names() {
        let Ok(json) = serde_json::to_string(&Channel::Indicators) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"indicators\"");
    }
}
