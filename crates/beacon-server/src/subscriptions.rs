//! Bidirectional topic ↔ connection index.
//!
//! Two maps are kept in lockstep: `topic → {connection}` and
//! `connection → {topic}`. A connection is in a topic's set exactly when the
//! topic is in the connection's set. Empty sets are removed so neither side
//! holds dangling keys. The index itself is not synchronized; the
//! [`ConnectionHub`](crate::ConnectionHub) owns it behind its lock.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// In-memory subscription index keyed by connection identity `C`.
#[derive(Debug)]
pub struct SubscriptionIndex<C> {
    topics: HashMap<String, HashSet<C>>,
    connections: HashMap<C, HashSet<String>>,
}

impl<C> SubscriptionIndex<C>
where
    C: Eq + Hash + Clone,
{
    /// Empty index.
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
            connections: HashMap::new(),
        }
    }

    /// Subscribe `connection` to `topic`. Returns `false` if it already was.
    pub fn subscribe(&mut self, topic: &str, connection: &C) -> bool {
        let added = self
            .topics
            .entry(topic.to_owned())
            .or_default()
            .insert(connection.clone());
        let _ = self
            .connections
            .entry(connection.clone())
            .or_default()
            .insert(topic.to_owned());
        added
    }

    /// Remove `connection` from every topic and drop its entry.
    ///
    /// Returns the topics it was removed from. A no-op for unknown connections.
    pub fn unsubscribe_all(&mut self, connection: &C) -> HashSet<String> {
        let Some(topics) = self.connections.remove(connection) else {
            return HashSet::new();
        };
        for topic in &topics {
            if let Some(subscribers) = self.topics.get_mut(topic) {
                let _ = subscribers.remove(connection);
                if subscribers.is_empty() {
                    let _ = self.topics.remove(topic);
                }
            }
        }
        topics
    }

    /// Topics `connection` is subscribed to (empty if none).
    pub fn topics_of(&self, connection: &C) -> HashSet<String> {
        self.connections.get(connection).cloned().unwrap_or_default()
    }

    /// Connections subscribed to `topic` (empty if none).
    pub fn subscribers_of(&self, topic: &str) -> HashSet<C> {
        self.topics.get(topic).cloned().unwrap_or_default()
    }

    /// Borrowing iterator over a topic's subscribers.
    pub fn subscribers(&self, topic: &str) -> impl Iterator<Item = &C> {
        self.topics.get(topic).into_iter().flatten()
    }

    /// Number of subscribers for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, HashSet::len)
    }

    /// Topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Connections with at least one subscription.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl<C> Default for SubscriptionIndex<C>
where
    C: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
