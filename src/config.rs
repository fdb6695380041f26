//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every key has a default, so an empty
//! environment yields a working local setup.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::Channel;
use crate::error::GatewayError;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(GatewayError::Config(format!("LOG_FORMAT: unknown format {other}"))),
        }
    }
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:6001`).
    pub listen_addr: SocketAddr,

    /// Base URL of the service exposing the upstream event streams.
    pub signal_service_url: String,

    /// Whether the stream bridge starts at boot.
    pub bridge_enabled: bool,

    /// Seconds to wait before reconnecting a failed upstream stream.
    pub bridge_reconnect_delay_secs: u64,

    /// Seconds between heartbeat pings (0 disables the heartbeat).
    pub heartbeat_interval_secs: u64,

    /// Capacity of each connection's outbound queue.
    pub connection_queue_capacity: usize,

    /// Channels a client joins when it does not request any.
    pub default_channels: Vec<String>,

    /// Log output format.
    pub log_format: LogFormat,

    /// Seconds allowed for background tasks to stop on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 6001)),
            signal_service_url: "http://localhost:6002".to_string(),
            bridge_enabled: true,
            bridge_reconnect_delay_secs: 5,
            heartbeat_interval_secs: 30,
            connection_queue_capacity: 1024,
            default_channels: vec![Channel::Alerts.as_str().to_string()],
            log_format: LogFormat::Text,
            shutdown_timeout_secs: 10,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `LISTEN_ADDR` or `LOG_FORMAT`
    /// is set but cannot be parsed, or a numeric setting is out of range.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`GatewayConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|e| GatewayError::Config(format!("LISTEN_ADDR: {e}")))?,
            None => defaults.listen_addr,
        };

        let signal_service_url = lookup("SIGNAL_SERVICE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.signal_service_url);

        let bridge_enabled = parse_env_bool(&lookup, "BRIDGE_ENABLED", defaults.bridge_enabled);
        let bridge_reconnect_delay_secs = parse_env(
            &lookup,
            "BRIDGE_RECONNECT_DELAY_SECS",
            defaults.bridge_reconnect_delay_secs,
        );
        let heartbeat_interval_secs =
            parse_env(&lookup, "HEARTBEAT_INTERVAL_SECS", defaults.heartbeat_interval_secs);
        let connection_queue_capacity = parse_env(
            &lookup,
            "CONNECTION_QUEUE_CAPACITY",
            defaults.connection_queue_capacity,
        );
        if connection_queue_capacity == 0 {
            return Err(GatewayError::Config(
                "CONNECTION_QUEUE_CAPACITY must be at least 1".to_string(),
            ));
        }

        let default_channels = lookup("DEFAULT_CHANNELS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|names| !names.is_empty())
            .unwrap_or(defaults.default_channels);

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => defaults.log_format,
        };

        let shutdown_timeout_secs =
            parse_env(&lookup, "SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout_secs);

        Ok(Self {
            listen_addr,
            signal_service_url,
            bridge_enabled,
            bridge_reconnect_delay_secs,
            heartbeat_interval_secs,
            connection_queue_capacity,
            default_channels,
            log_format,
            shutdown_timeout_secs,
        })
    }

    /// Backoff between bridge reconnect attempts.
    #[must_use]
    pub const fn bridge_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.bridge_reconnect_delay_secs)
    }

    /// Heartbeat period, or `None` when disabled.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Option<Duration> {
        if self.heartbeat_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.heartbeat_interval_secs))
        }
    }

    /// Grace period for background tasks on shutdown.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_env<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses a variable as a boolean. Accepts `"true"`, `"1"`, `"false"`,
/// `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<GatewayConfig, GatewayError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let Ok(config) = load(&[]) else {
            panic!("defaults must load");
        };
        assert_eq!(config.listen_addr.port(), 6001);
        assert_eq!(config.signal_service_url, "http://localhost:6002");
        assert!(config.bridge_enabled);
        assert_eq!(config.bridge_reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.heartbeat_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.connection_queue_capacity, 1024);
        assert_eq!(config.default_channels, vec!["alerts"]);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn overrides_are_applied() {
        let Ok(config) = load(&[
            ("LISTEN_ADDR", "127.0.0.1:7000"),
            ("SIGNAL_SERVICE_URL", "http://signal:6002/"),
            ("BRIDGE_ENABLED", "FALSE"),
            ("HEARTBEAT_INTERVAL_SECS", "0"),
            ("DEFAULT_CHANNELS", "alerts, prices ,"),
            ("LOG_FORMAT", "json"),
        ]) else {
            panic!("overrides must load");
        };
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:7000");
        assert_eq!(config.signal_service_url, "http://signal:6002");
        assert!(!config.bridge_enabled);
        assert_eq!(config.heartbeat_interval(), None);
        assert_eq!(config.default_channels, vec!["alerts", "prices"]);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let Ok(config) = load(&[("BRIDGE_RECONNECT_DELAY_SECS", "soon")]) else {
            panic!("invalid numbers are not fatal");
        };
        assert_eq!(config.bridge_reconnect_delay_secs, 5);
    }

    #[test]
    fn invalid_listen_addr_is_an_error() {
        let Err(err) = load(&[("LISTEN_ADDR", "not-an-addr")]) else {
            panic!("bad address must fail");
        };
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        assert!(load(&[("CONNECTION_QUEUE_CAPACITY", "0")]).is_err());
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
