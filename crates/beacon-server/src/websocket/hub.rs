//! Live connection set and subscription index behind one lock.
//!
//! Every mutation (add, remove, subscribe) and every fan-out lookup takes the
//! same `RwLock`, so eviction and subscription are atomic with respect to
//! concurrent publishes. The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use beacon_protocol::{Message, ProtocolError};
use parking_lot::RwLock;
use tracing::debug;

use super::connection::{ClientConnection, ConnectionId};
use crate::subscriptions::SubscriptionIndex;

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    index: SubscriptionIndex<ConnectionId>,
}

/// Outcome of a [`ConnectionHub::publish`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the frame was enqueued for.
    pub delivered: usize,
    /// Subscribers whose queue was full or closed.
    pub dropped: usize,
}

impl PublishReport {
    /// Total subscribers addressed.
    pub fn recipients(&self) -> usize {
        self.delivered + self.dropped
    }
}

/// Owns the live connection set and the subscription index.
#[derive(Default)]
pub struct ConnectionHub {
    state: RwLock<HubState>,
}

impl ConnectionHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let mut state = self.state.write();
        let _ = state.connections.insert(connection.id.clone(), connection);
    }

    /// Evict a connection and drop all of its subscriptions.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        let mut state = self.state.write();
        let removed = state.connections.remove(id);
        let topics = state.index.unsubscribe_all(id);
        if !topics.is_empty() {
            debug!(conn_id = %id, topics = topics.len(), "removed subscriptions");
        }
        removed
    }

    /// Subscribe a live connection to each topic.
    ///
    /// Returns the connection's full topic set, sorted, or `None` if the
    /// connection is no longer registered.
    pub fn subscribe<I, S>(&self, id: &ConnectionId, topics: I) -> Option<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.write();
        if !state.connections.contains_key(id) {
            return None;
        }
        for topic in topics {
            let _ = state.index.subscribe(topic.as_ref(), id);
        }
        Some(sorted(state.index.topics_of(id)))
    }

    /// A connection's topics, sorted.
    pub fn topics_of(&self, id: &ConnectionId) -> Vec<String> {
        sorted(self.state.read().index.topics_of(id))
    }

    /// Ids subscribed to `topic`.
    pub fn subscribers_of(&self, topic: &str) -> Vec<ConnectionId> {
        self.state.read().index.subscribers(topic).cloned().collect()
    }

    /// Number of subscribers for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state.read().index.subscriber_count(topic)
    }

    /// Encode `message` once and enqueue it for every subscriber of `topic`.
    ///
    /// Uses non-blocking sends; a subscriber that closed or is backed up is
    /// counted as dropped.
    pub fn publish(&self, topic: &str, message: &Message) -> Result<PublishReport, ProtocolError> {
        let targets: Vec<Arc<ClientConnection>> = {
            let state = self.state.read();
            state
                .index
                .subscribers(topic)
                .filter_map(|id| state.connections.get(id).cloned())
                .collect()
        };
        if targets.is_empty() {
            return Ok(PublishReport::default());
        }

        let frame = Arc::new(beacon_protocol::encode(message)?);
        let mut report = PublishReport::default();
        for conn in targets {
            if conn.send(frame.clone()) {
                report.delivered += 1;
            } else {
                report.dropped += 1;
                debug!(conn_id = %conn.id, topic, "push dropped");
            }
        }
        Ok(report)
    }

    /// Snapshot of live connections.
    pub fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.state.read().connections.values().cloned().collect()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.state.read().connections.contains_key(id)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.state.read().connections.len()
    }

    /// Topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.state.read().index.topic_count()
    }
}

fn sorted(topics: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = topics.into_iter().collect();
    out.sort_unstable();
    out
}
