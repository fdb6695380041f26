//! Server-initiated keep-alive.
//!
//! Every `interval` a `{"type":"ping"}` message is broadcast to all open
//! connections through [`ConnectionManager::publish_all`]. Connections whose
//! queue has gone away are pruned as a side effect.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::messages::ServerMessage;
use crate::service::ConnectionManager;

/// Runs the heartbeat loop until `cancel` fires. Returns the number of
/// heartbeats sent.
///
/// The first ping goes out one full `interval` after start.
pub async fn run_heartbeat(
    manager: Arc<ConnectionManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent: u64 = 0;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let recipients = manager
                    .publish_all(&ServerMessage::Ping { timestamp: Utc::now() })
                    .await;
                sent += 1;
                tracing::debug!(recipients, "heartbeat sent");
            }
        }
    }
    sent
}

/// Spawns [`run_heartbeat`] on the current runtime.
#[must_use]
pub fn spawn_heartbeat(
    manager: Arc<ConnectionManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<u64> {
    tokio::spawn(run_heartbeat(manager, interval, cancel))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::ws::messages::Frame;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    fn next_json(rx: &mut mpsc::Receiver<Frame>) -> Value {
        let Ok(frame) = rx.try_recv() else {
            panic!("expected a queued frame");
        };
        let Ok(value) = serde_json::from_str(&frame) else {
            panic!("frame is not JSON");
        };
        value
    }

    #[tokio::test(start_paused = true)]
    async fn pings_every_connection_each_interval() {
        let manager = Arc::new(ConnectionManager::new());
        let (tx, mut rx) = mpsc::channel(32);
        let _id = manager.accept(tx, &["alerts"]).await;
        let _ack = next_json(&mut rx);

        let cancel = CancellationToken::new();
        let handle = spawn_heartbeat(Arc::clone(&manager), Duration::from_secs(30), cancel.clone());

        let Some(frame) = rx.recv().await else {
            panic!("heartbeat not delivered");
        };
        let Ok(ping) = serde_json::from_str::<Value>(&frame) else {
            panic!("frame is not JSON");
        };
        assert_eq!(ping.get("type"), Some(&json!("ping")));
        assert!(ping.get("timestamp").is_some());

        let Some(_second) = rx.recv().await else {
            panic!("second heartbeat not delivered");
        };

        cancel.cancel();
        let Ok(sent) = handle.await else {
            panic!("heartbeat task panicked");
        };
        assert_eq!(sent, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_sent_before_first_interval() {
        let manager = Arc::new(ConnectionManager::new());
        let (tx, mut rx) = mpsc::channel(32);
        let _id = manager.accept(tx, &[] as &[&str]).await;
        let _ack = next_json(&mut rx);

        let cancel = CancellationToken::new();
        let handle = spawn_heartbeat(Arc::clone(&manager), Duration::from_secs(30), cancel.clone());
        time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        let Ok(sent) = handle.await else {
            panic!("heartbeat task panicked");
        };
        assert_eq!(sent, 0);
    }
}
