//! Stream-to-broadcast bridge.
//!
//! The [`StreamBridge`] supervises one [`BridgeSession`] per upstream
//! stream. Each session keeps its stream open, parses `data:` lines and
//! republishes them through the [`ConnectionManager`]. Sessions fail and
//! reconnect independently.

pub mod session;
pub mod sse;
pub mod upstream;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use session::{BridgeSession, BridgeState, BridgeStatus, BridgeTarget};
pub use upstream::{HttpUpstream, LineStream, UpstreamSource};

use crate::domain::Channel;
use crate::error::GatewayError;
use crate::service::ConnectionManager;

/// A stream the bridge taps by default.
#[derive(Debug, Clone, Copy)]
pub struct StreamSpec {
    /// Session name.
    pub name: &'static str,
    /// Path on the upstream service.
    pub path: &'static str,
    /// Channel events are published on.
    pub channel: Channel,
    /// Tag given to each event.
    pub event_tag: &'static str,
}

/// Streams started by [`StreamBridge::start`].
pub const DEFAULT_STREAMS: [StreamSpec; 2] = [
    StreamSpec {
        name: "alerts",
        path: "/api/alerts/stream",
        channel: Channel::Alerts,
        event_tag: "alert",
    },
    StreamSpec {
        name: "activity",
        path: "/api/activity/stream",
        channel: Channel::Activity,
        event_tag: "activity",
    },
];

/// Supervisor for the bridge sessions.
#[derive(Debug)]
pub struct StreamBridge {
    manager: Arc<ConnectionManager>,
    reconnect_delay: Duration,
    cancel: CancellationToken,
    sessions: Mutex<Vec<BridgeSession>>,
}

impl StreamBridge {
    /// Creates an idle bridge.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, reconnect_delay: Duration) -> Self {
        Self {
            manager,
            reconnect_delay,
            cancel: CancellationToken::new(),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Starts one HTTP session per entry of [`DEFAULT_STREAMS`] against
    /// `base_url`.
    ///
    /// Calling this while sessions are running logs a warning and does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the HTTP client cannot be built.
    pub async fn start(&self, base_url: &str) -> Result<(), GatewayError> {
        let mut sessions = self.sessions.lock().await;
        if !sessions.is_empty() {
            warn!("stream bridge already running");
            return Ok(());
        }

        // No request timeout: streams stay open indefinitely.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Config(format!("http client: {e}")))?;

        let base = base_url.trim_end_matches('/');
        for spec in DEFAULT_STREAMS {
            let source = HttpUpstream::new(client.clone(), format!("{base}{}", spec.path));
            sessions.push(self.session(spec.name, source, spec.channel, spec.event_tag));
        }
        info!(base_url = %base, sessions = sessions.len(), "stream bridge started");
        Ok(())
    }

    fn session<S: UpstreamSource>(
        &self,
        name: &str,
        source: S,
        channel: Channel,
        event_tag: &str,
    ) -> BridgeSession {
        BridgeSession::spawn(
            name,
            source,
            BridgeTarget::new(channel, event_tag),
            self.reconnect_delay,
            Arc::clone(&self.manager),
            self.cancel.child_token(),
        )
    }

    /// Status of every session, in start order.
    pub async fn statuses(&self) -> Vec<BridgeStatus> {
        self.sessions
            .lock()
            .await
            .iter()
            .map(BridgeSession::status)
            .collect()
    }

    /// Stops every session and waits for them to unwind.
    ///
    /// The bridge can be started again afterwards.
    pub async fn stop(&self) {
        let sessions: Vec<BridgeSession> = std::mem::take(&mut *self.sessions.lock().await);
        if sessions.is_empty() {
            return;
        }
        let count = sessions.len();
        for session in sessions {
            session.stop().await;
        }
        info!(sessions = count, "stream bridge stopped");
    }
}
