//! Connection manager: the single owner of live connections and channel
//! memberships, and the only component that writes to client queues.
//!
//! Each connection is represented by the sending half of a bounded `mpsc`
//! queue drained by that connection's own task. Delivery is a non-blocking
//! `try_send`; a closed or full queue counts as a transport failure and the
//! connection is removed on the spot.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::domain::{Channel, ChannelRegistry, ConnectionId, Event, resolve_channels};
use crate::ws::messages::{
    ConnectionInfo, ConnectionStatus, EventEnvelope, Frame, ServerMessage, StatsSnapshot,
    SubscriptionAction,
};

/// Outbound queue handle for one connection.
pub type Outbound = mpsc::Sender<Frame>;

/// State tracked per open connection.
#[derive(Debug)]
struct ConnectionEntry {
    outbound: Outbound,
    connected_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    channels: BTreeSet<Channel>,
}

/// Connection table and channel registry, always locked together.
#[derive(Debug, Default)]
struct Tables {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    registry: ChannelRegistry,
}

impl Tables {
    /// Removes a connection from both tables. Returns `false` if it was
    /// already gone.
    fn drop_connection(&mut self, id: ConnectionId) -> bool {
        let Some(entry) = self.connections.remove(&id) else {
            return false;
        };
        for channel in entry.channels {
            self.registry.remove(channel, id);
        }
        true
    }
}

/// Registry of live connections and their channel memberships.
///
/// # Concurrency
///
/// Both tables sit behind one [`RwLock`], so every membership change is
/// atomic on the connection side and the channel side at once. Broadcasts
/// take a snapshot of `(id, queue)` pairs under the read lock and deliver
/// after releasing it; removals triggered by failed sends therefore never
/// skip or duplicate a recipient of the broadcast in progress.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    tables: RwLock<Tables>,
}

impl ConnectionManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and subscribes it to the known channels in
    /// `requested`. Unknown names are dropped.
    ///
    /// The `connection` acknowledgement listing the accepted channels is
    /// queued before the connection becomes visible to publishers, so it is
    /// always the first frame the client receives.
    pub async fn accept<S: AsRef<str>>(&self, outbound: Outbound, requested: &[S]) -> ConnectionId {
        let (accepted, ignored) = resolve_channels(requested);
        let id = ConnectionId::new();
        let now = Utc::now();

        if !ignored.is_empty() {
            warn!(connection_id = %id, ?ignored, "ignoring unknown channels on connect");
        }
        let ack = ServerMessage::Connection {
            status: ConnectionStatus::Connected,
            connection_id: id,
            channels: accepted.clone(),
            ignored,
            timestamp: now,
        };
        match ack.to_frame() {
            Ok(frame) => {
                if let Err(e) = outbound.try_send(frame) {
                    warn!(
                        connection_id = %id,
                        error = %e,
                        "failed to queue connection ack; dropping connection"
                    );
                    return id;
                }
            }
            Err(e) => warn!(connection_id = %id, error = %e, "failed to serialize connection ack"),
        }

        {
            let mut tables = self.tables.write().await;
            for channel in &accepted {
                tables.registry.insert(*channel, id);
            }
            tables.connections.insert(
                id,
                ConnectionEntry {
                    outbound,
                    connected_at: now,
                    last_activity: now,
                    channels: accepted.iter().copied().collect(),
                },
            );
        }
        info!(connection_id = %id, channels = ?accepted, "connection established");
        id
    }

    /// Unregisters a connection and removes it from every channel.
    ///
    /// Idempotent: returns `false` if the connection was already gone.
    /// Dropping the stored queue handle lets the connection task observe the
    /// removal and close its transport.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.tables.write().await.drop_connection(id);
        if removed {
            info!(connection_id = %id, "connection removed");
        }
        removed
    }

    /// Delivers one message to one connection.
    ///
    /// Returns `true` if the message was queued. On failure the connection is
    /// removed; nothing is propagated.
    pub async fn send(&self, id: ConnectionId, message: &ServerMessage) -> bool {
        match message.to_frame() {
            Ok(frame) => self.send_frame(id, frame).await,
            Err(e) => {
                warn!(connection_id = %id, error = %e, "failed to serialize message");
                false
            }
        }
    }

    /// Publishes `event` to every connection subscribed to `channel`.
    ///
    /// The channel name and a delivery timestamp are attached here. Returns
    /// the number of connections the event was queued for.
    pub async fn publish(&self, channel: Channel, event: Event) -> usize {
        let message = ServerMessage::Event(EventEnvelope {
            event_type: event.tag,
            channel,
            data: event.data,
            timestamp: Utc::now(),
        });
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%channel, error = %e, "failed to serialize event");
                return 0;
            }
        };

        let targets: Vec<(ConnectionId, Outbound)> = {
            let tables = self.tables.read().await;
            tables
                .registry
                .subscribers(channel)
                .filter_map(|id| {
                    tables
                        .connections
                        .get(&id)
                        .map(|entry| (id, entry.outbound.clone()))
                })
                .collect()
        };

        let delivered = self.deliver(targets, &frame).await;
        debug!(%channel, delivered, "published event");
        delivered
    }

    /// Publishes a message to every open connection regardless of channel.
    pub async fn publish_all(&self, message: &ServerMessage) -> usize {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to serialize broadcast");
                return 0;
            }
        };
        let targets: Vec<(ConnectionId, Outbound)> = {
            let tables = self.tables.read().await;
            tables
                .connections
                .iter()
                .map(|(id, entry)| (*id, entry.outbound.clone()))
                .collect()
        };
        self.deliver(targets, &frame).await
    }

    /// Adds memberships for an open connection and acknowledges the channels
    /// that were newly added. Returns those channels.
    pub async fn subscribe<S: AsRef<str>>(&self, id: ConnectionId, names: &[S]) -> Vec<Channel> {
        self.change_membership(id, names, SubscriptionAction::Subscribed)
            .await
    }

    /// Removes memberships for an open connection and acknowledges the
    /// channels that were actually removed. Returns those channels.
    pub async fn unsubscribe<S: AsRef<str>>(&self, id: ConnectionId, names: &[S]) -> Vec<Channel> {
        self.change_membership(id, names, SubscriptionAction::Unsubscribed)
            .await
    }

    /// Records client activity on a connection.
    pub async fn touch(&self, id: ConnectionId) {
        let mut tables = self.tables.write().await;
        if let Some(entry) = tables.connections.get_mut(&id) {
            entry.last_activity = Utc::now();
        }
    }

    /// Returns a snapshot of connections and channel memberships.
    pub async fn stats(&self) -> StatsSnapshot {
        let tables = self.tables.read().await;
        let mut connections: Vec<ConnectionInfo> = tables
            .connections
            .iter()
            .map(|(id, entry)| ConnectionInfo {
                connection_id: *id,
                connected_at: entry.connected_at,
                channels: entry.channels.iter().copied().collect(),
                last_ping: entry.last_activity,
            })
            .collect();
        connections.sort_by_key(|info| (info.connected_at, info.connection_id));
        StatsSnapshot {
            total_connections: tables.connections.len(),
            subscriptions: tables.registry.counts(),
            connections,
        }
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.tables.read().await.connections.len()
    }

    /// Number of connections subscribed to `channel`.
    pub async fn subscriber_count(&self, channel: Channel) -> usize {
        self.tables.read().await.registry.subscriber_count(channel)
    }

    /// Drops every connection. Used at shutdown so connection tasks unwind.
    pub async fn close_all(&self) -> usize {
        let mut tables = self.tables.write().await;
        let closed = tables.connections.len();
        tables.connections.clear();
        tables.registry = ChannelRegistry::new();
        info!(closed, "closed all connections");
        closed
    }

    /// Applies a membership change and queues its acknowledgement under the
    /// same write lock, so no event on a changed channel can overtake the ack.
    async fn change_membership<S: AsRef<str>>(
        &self,
        id: ConnectionId,
        names: &[S],
        action: SubscriptionAction,
    ) -> Vec<Channel> {
        let (requested, ignored) = resolve_channels(names);
        if !ignored.is_empty() {
            warn!(connection_id = %id, ?ignored, "ignoring unknown channels");
        }

        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let Some(entry) = tables.connections.get_mut(&id) else {
            debug!(connection_id = %id, "membership change for unknown connection");
            return Vec::new();
        };
        let mut changed = Vec::with_capacity(requested.len());
        for channel in requested {
            let updated = match action {
                SubscriptionAction::Subscribed => {
                    tables.registry.insert(channel, id);
                    entry.channels.insert(channel)
                }
                SubscriptionAction::Unsubscribed => {
                    tables.registry.remove(channel, id);
                    entry.channels.remove(&channel)
                }
            };
            if updated {
                changed.push(channel);
            }
        }
        info!(connection_id = %id, ?action, channels = ?changed, "membership changed");

        let ack = ServerMessage::Subscription {
            action,
            channels: changed.clone(),
            ignored,
        };
        let queued = match ack.to_frame() {
            Ok(frame) => entry.outbound.try_send(frame).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = queued {
            warn!(
                connection_id = %id,
                error = %e,
                "failed to queue subscription ack; dropping connection"
            );
            tables.drop_connection(id);
        }
        changed
    }

    async fn send_frame(&self, id: ConnectionId, frame: Frame) -> bool {
        let outbound = {
            let tables = self.tables.read().await;
            tables.connections.get(&id).map(|entry| entry.outbound.clone())
        };
        match outbound {
            Some(outbound) => self.deliver(vec![(id, outbound)], &frame).await == 1,
            None => {
                debug!(connection_id = %id, "send to unknown connection");
                false
            }
        }
    }

    /// Queues `frame` on every target; removes the ones that fail.
    async fn deliver(&self, targets: Vec<(ConnectionId, Outbound)>, frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, outbound) in targets {
            match outbound.try_send(Arc::clone(frame)) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(connection_id = %id, error = %e, "send failed; dropping connection");
                    failed.push(id);
                }
            }
        }
        for id in failed {
            self.remove(id).await;
        }
        delivered
    }
}
