//! Axum WebSocket upgrade handler and stats endpoint.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::connection::run_connection;
use super::messages::StatsSnapshot;
use crate::app_state::AppState;

/// `GET /ws?channels=alerts&channels=prices` — Upgrade to WebSocket.
///
/// `channels` may be repeated or comma separated. When absent, the
/// configured default channels are used.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let channels = requested_channels(&params, &state.config.default_channels);
    let manager = Arc::clone(&state.manager);
    let capacity = state.config.connection_queue_capacity;

    ws.on_upgrade(move |socket| run_connection(socket, manager, channels, capacity))
}

/// `GET /ws/stats` — Connection statistics.
#[utoipa::path(
    get,
    path = "/ws/stats",
    tag = "WebSocket",
    summary = "WebSocket statistics",
    description = "Returns open connections, per-channel subscriber counts, and per-connection detail.",
    responses(
        (status = 200, description = "Stats snapshot", body = StatsSnapshot),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.manager.stats().await)
}

/// WebSocket routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws/stats", get(stats_handler))
}

/// Extracts channel names from the connect query string.
fn requested_channels(params: &[(String, String)], defaults: &[String]) -> Vec<String> {
    let requested: Vec<String> = params
        .iter()
        .filter(|(key, _)| key == "channels")
        .flat_map(|(_, value)| value.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if requested.is_empty() {
        defaults.to_vec()
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn repeated_and_comma_separated_are_merged() {
        let params = pairs(&[("channels", "alerts"), ("channels", "prices,news"), ("x", "y")]);
        assert_eq!(
            requested_channels(&params, &[]),
            vec!["alerts", "prices", "news"]
        );
    }

    #[test]
    fn falls_back_to_defaults() {
        let defaults = vec!["alerts".to_string()];
        assert_eq!(requested_channels(&[], &defaults), defaults);
        assert_eq!(requested_channels(&pairs(&[("channels", "")]), &defaults), defaults);
    }
}
