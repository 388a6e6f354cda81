//! Notification sources and subscriber fan-out.
//!
//! A [`NotificationSource`] delivers `(properties, body)` pairs to registered
//! [`NotificationHandler`]s. The gateway registers a [`NotificationFanOut`],
//! which extracts a topic with [`Event::from_parts`] and pushes a
//! `notification` command to every subscriber of that topic.

use std::sync::Arc;

use beacon_protocol::{Message, Notification};
use metrics::counter;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::metrics::{
    NOTIFICATION_DELIVERIES_TOTAL, NOTIFICATION_SEND_FAILURES_TOTAL, NOTIFICATIONS_DROPPED_TOTAL,
    NOTIFICATIONS_TOTAL,
};
use crate::websocket::hub::{ConnectionHub, PublishReport};

/// Transport-level metadata attached to an event.
pub type Properties = Map<String, Value>;

/// Callback invoked for each event a source receives.
pub trait NotificationHandler: Send + Sync {
    /// Handle one event. Must not block.
    fn on_message(&self, properties: &Properties, body: &Value);
}

impl<F> NotificationHandler for F
where
    F: Fn(&Properties, &Value) + Send + Sync,
{
    fn on_message(&self, properties: &Properties, body: &Value) {
        self(properties, body);
    }
}

/// Anything that can deliver events to registered handlers.
pub trait NotificationSource: Send + Sync {
    /// Register a handler. It may be invoked any time afterwards.
    fn add_message_handler(&self, handler: Arc<dyn NotificationHandler>);
}

/// A source fed directly by the process, e.g. from `POST /notify`.
#[derive(Default)]
pub struct InProcessSource {
    handlers: RwLock<Vec<Arc<dyn NotificationHandler>>>,
}

impl InProcessSource {
    /// Source with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every registered handler. Returns how many were called.
    pub fn publish(&self, properties: &Properties, body: &Value) -> usize {
        let handlers = self.handlers.read().clone();
        for handler in &handlers {
            handler.on_message(properties, body);
        }
        handlers.len()
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl NotificationSource for InProcessSource {
    fn add_message_handler(&self, handler: Arc<dyn NotificationHandler>) {
        self.handlers.write().push(handler);
    }
}

/// A routable event.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Target topic (service).
    pub topic: String,
    /// Payload forwarded to subscribers.
    pub payload: Value,
}

impl Event {
    /// Extract the topic and payload.
    ///
    /// - `body.topic` is a string: that topic, payload is `body.payload` (or null)
    /// - else `properties.topic` is a string: that topic, payload is the whole body
    /// - else: not routable
    pub fn from_parts(properties: &Properties, body: &Value) -> Option<Self> {
        if let Some(topic) = body.get("topic").and_then(Value::as_str) {
            return Some(Self {
                topic: topic.to_owned(),
                payload: body.get("payload").cloned().unwrap_or(Value::Null),
            });
        }
        let topic = properties.get("topic").and_then(Value::as_str)?;
        Some(Self {
            topic: topic.to_owned(),
            payload: body.clone(),
        })
    }

    /// The push sent to subscribers.
    pub fn into_message(self) -> Message {
        Message::Notification(Notification {
            service: self.topic,
            payload: self.payload,
        })
    }
}

/// Handler that pushes each event to the topic's subscribers.
pub struct NotificationFanOut {
    hub: Arc<ConnectionHub>,
}

impl NotificationFanOut {
    /// Fan out into `hub`.
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        Self { hub }
    }

    /// Push one event. Best effort: closed or backed-up subscribers are skipped.
    #[instrument(skip_all, fields(topic = %event.topic))]
    pub fn deliver(&self, event: Event) -> PublishReport {
        let topic = event.topic.clone();
        match self.hub.publish(&topic, &event.into_message()) {
            Ok(report) => {
                counter!(NOTIFICATION_DELIVERIES_TOTAL).increment(report.delivered as u64);
                if report.dropped > 0 {
                    counter!(NOTIFICATION_SEND_FAILURES_TOTAL).increment(report.dropped as u64);
                    warn!(dropped = report.dropped, "some subscribers missed the push");
                }
                debug!(recipients = report.recipients(), "notification fanned out");
                report
            }
            Err(e) => {
                warn!(error = %e, "failed to encode notification");
                PublishReport::default()
            }
        }
    }

    /// Extract the topic and push. `None` when the event has no topic.
    pub fn route(&self, properties: &Properties, body: &Value) -> Option<PublishReport> {
        counter!(NOTIFICATIONS_TOTAL).increment(1);
        let Some(event) = Event::from_parts(properties, body) else {
            counter!(NOTIFICATIONS_DROPPED_TOTAL).increment(1);
            warn!("notification has no topic, dropping");
            return None;
        };
        Some(self.deliver(event))
    }
}

impl NotificationHandler for NotificationFanOut {
    fn on_message(&self, properties: &Properties, body: &Value) {
        let _ = self.route(properties, body);
    }
}
