//! trading-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints, the
//! heartbeat task, and the upstream stream bridge.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use trading_gateway::api;
use trading_gateway::app_state::AppState;
use trading_gateway::config::{GatewayConfig, LogFormat};
use trading_gateway::ws::heartbeat::spawn_heartbeat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting trading-gateway");

    // Build application state
    let state = AppState::new(config);
    let config = Arc::clone(&state.config);

    // Background tasks
    let cancel = CancellationToken::new();
    let heartbeat = config.heartbeat_interval().map(|interval| {
        spawn_heartbeat(
            Arc::clone(&state.manager),
            interval,
            cancel.child_token(),
        )
    });

    if config.bridge_enabled {
        state
            .bridge
            .start(&config.signal_service_url)
            .await
            .context("starting stream bridge")?;
    } else {
        tracing::info!("stream bridge disabled");
    }

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let app = api::build_app(state.clone());
    let manager = Arc::clone(&state.manager);
    let shutdown_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
            shutdown_cancel.cancel();
            // Dropping the queues ends every connection loop.
            let closed = manager.close_all().await;
            tracing::info!(closed, "closed websocket connections");
        })
        .await
        .context("serving http")?;

    // Stop background tasks
    cancel.cancel();
    let stop_tasks = async {
        if let Some(heartbeat) = heartbeat {
            match heartbeat.await {
                Ok(sent) => tracing::debug!(sent, "heartbeat stopped"),
                Err(e) => tracing::error!(error = %e, "heartbeat task failed"),
            }
        }
        state.bridge.stop().await;
    };
    if tokio::time::timeout(config.shutdown_timeout(), stop_tasks)
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "background tasks did not stop in time"
        );
    }

    tracing::info!("trading-gateway stopped");
    Ok(())
}
