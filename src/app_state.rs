//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::bridge::StreamBridge;
use crate::config::GatewayConfig;
use crate::service::ConnectionManager;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live connections and channel memberships.
    pub manager: Arc<ConnectionManager>,
    /// Upstream stream bridge, for health reporting.
    pub bridge: Arc<StreamBridge>,
    /// Loaded configuration.
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Builds the state with a fresh manager and an idle bridge.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let manager = Arc::new(ConnectionManager::new());
        let bridge = Arc::new(StreamBridge::new(
            Arc::clone(&manager),
            config.bridge_reconnect_delay(),
        ));
        Self {
            manager,
            bridge,
            config: Arc::new(config),
        }
    }
}
