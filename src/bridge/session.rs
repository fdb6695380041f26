//! One bridge session: a long-lived task that keeps an upstream stream open
//! and republishes each parsed `data:` line onto a fixed channel.
//!
//! ```text
//! Stopped → Connecting → Streaming ─(error / end)→ ReconnectWait ─┐
//!              ▲                                                  │
//!              └──────────────────────────────────────────────────┘
//! ```
//!
//! Stop is a [`CancellationToken`] checked at every suspension point, so a
//! session unwinds within one iteration from any state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use super::sse;
use super::upstream::{LineStream, UpstreamSource};
use crate::domain::{Channel, Event};
use crate::error::GatewayError;
use crate::service::ConnectionManager;

/// Lifecycle state of a bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    /// Not running (never started, or stopped).
    Stopped,
    /// Opening the upstream connection.
    Connecting,
    /// Reading lines from the upstream.
    Streaming,
    /// Waiting out the backoff before reconnecting.
    ReconnectWait,
}

/// Where a session republishes its events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeTarget {
    /// Channel every event is published on.
    pub channel: Channel,
    /// Tag given to every event (sent to clients as `type`).
    pub event_tag: String,
}

impl BridgeTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(channel: Channel, event_tag: impl Into<String>) -> Self {
        Self {
            channel,
            event_tag: event_tag.into(),
        }
    }
}

/// Point-in-time view of a session for health reporting.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BridgeStatus {
    /// Session name.
    pub name: String,
    /// Upstream endpoint.
    pub endpoint: String,
    /// Target channel.
    pub channel: Channel,
    /// Current state.
    pub state: BridgeState,
    /// Backoff between reconnect attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Reconnect waits performed so far.
    pub reconnects: u64,
    /// Events published so far.
    pub published: u64,
    /// Malformed lines dropped so far.
    pub dropped: u64,
}

/// State shared between a session handle and its task.
#[derive(Debug)]
struct Shared {
    name: String,
    endpoint: String,
    target: BridgeTarget,
    reconnect_delay: Duration,
    state: watch::Sender<BridgeState>,
    reconnects: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: BridgeState) {
        self.state.send_replace(state);
        debug!(bridge = %self.name, ?state, "bridge state changed");
    }
}

/// Why a streaming pass ended.
enum StreamEnd {
    Cancelled,
    Closed,
    Failed(GatewayError),
}

/// Handle to a running bridge session.
#[derive(Debug)]
pub struct BridgeSession {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BridgeSession {
    /// Spawns a session reading from `source` and publishing into `manager`.
    #[must_use]
    pub fn spawn<S: UpstreamSource>(
        name: impl Into<String>,
        source: S,
        target: BridgeTarget,
        reconnect_delay: Duration,
        manager: Arc<ConnectionManager>,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(BridgeState::Stopped);
        let shared = Arc::new(Shared {
            name: name.into(),
            endpoint: source.endpoint().to_string(),
            target,
            reconnect_delay,
            state,
            reconnects: AtomicU64::new(0),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        });
        let handle = tokio::spawn(run(source, manager, Arc::clone(&shared), cancel.clone()));
        Self {
            shared,
            cancel,
            handle,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        *self.shared.state.borrow()
    }

    /// Watches state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<BridgeState> {
        self.shared.state.subscribe()
    }

    /// Snapshot for health reporting.
    #[must_use]
    pub fn status(&self) -> BridgeStatus {
        let shared = &self.shared;
        BridgeStatus {
            name: shared.name.clone(),
            endpoint: shared.endpoint.clone(),
            channel: shared.target.channel,
            state: self.state(),
            reconnect_delay_ms: u64::try_from(shared.reconnect_delay.as_millis())
                .unwrap_or(u64::MAX),
            reconnects: shared.reconnects.load(Ordering::Relaxed),
            published: shared.published.load(Ordering::Relaxed),
            dropped: shared.dropped.load(Ordering::Relaxed),
        }
    }

    /// Requests a stop and waits for the task to unwind.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!(bridge = %self.shared.name, error = %e, "bridge task failed");
        }
    }
}

async fn run<S: UpstreamSource>(
    source: S,
    manager: Arc<ConnectionManager>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    info!(bridge = %shared.name, endpoint = %shared.endpoint, "bridge session started");

    loop {
        shared.set_state(BridgeState::Connecting);
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            opened = source.open() => opened,
        };

        match opened {
            Ok(lines) => {
                shared.set_state(BridgeState::Streaming);
                info!(
                    bridge = %shared.name,
                    endpoint = %shared.endpoint,
                    "connected to upstream stream"
                );
                match forward_lines(lines, &manager, &shared, &cancel).await {
                    StreamEnd::Cancelled => break,
                    StreamEnd::Closed => {
                        warn!(bridge = %shared.name, "upstream stream ended");
                    }
                    StreamEnd::Failed(e) => {
                        error!(bridge = %shared.name, error = %e, "upstream stream failed");
                    }
                }
            }
            Err(e) => {
                error!(
                    bridge = %shared.name,
                    endpoint = %shared.endpoint,
                    error = %e,
                    "failed to connect to upstream stream"
                );
            }
        }

        shared.set_state(BridgeState::ReconnectWait);
        shared.reconnects.fetch_add(1, Ordering::Relaxed);
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(shared.reconnect_delay) => {}
        }
    }

    shared.set_state(BridgeState::Stopped);
    info!(bridge = %shared.name, "bridge session stopped");
}

async fn forward_lines(
    mut lines: LineStream,
    manager: &ConnectionManager,
    shared: &Shared,
    cancel: &CancellationToken,
) -> StreamEnd {
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamEnd::Cancelled,
            next = lines.next() => next,
        };
        let line = match next {
            None => return StreamEnd::Closed,
            Some(Err(e)) => return StreamEnd::Failed(e),
            Some(Ok(line)) => line,
        };

        match sse::parse_data_line(&line) {
            Ok(Some(data)) => {
                let event = Event::new(shared.target.event_tag.clone(), data);
                let delivered = manager.publish(shared.target.channel, event).await;
                shared.published.fetch_add(1, Ordering::Relaxed);
                debug!(bridge = %shared.name, delivered, "forwarded upstream event");
            }
            Ok(None) => {}
            Err(e) => {
                shared.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(bridge = %shared.name, error = %e, "dropping malformed upstream line");
            }
        }
    }
}
