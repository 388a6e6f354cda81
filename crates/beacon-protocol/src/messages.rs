//! Message variants carried inside a [`Command`](crate::Command) envelope.
//!
//! Each variant is a plain serde struct that also implements [`MessageBody`],
//! which declares the variant's wire tag and the exact set of property names
//! it accepts. Construction from a JSON object rejects any key outside that
//! set with [`ProtocolError::InvalidMessageProperty`]; nested messages are
//! ordinary struct fields and are constructed recursively by serde.
//!
//! Adding a variant means: define the struct, implement [`MessageBody`], add
//! an arm to [`Message`] and to [`CommandType`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::command::CommandType;
use crate::errors::{ProtocolError, Result};

/// A concrete message shape with a fixed, declared property set.
pub trait MessageBody: Serialize + DeserializeOwned + Into<Message> {
    /// Tag this variant is registered under.
    const TYPE: CommandType;

    /// Declared property names, in wire order.
    const PROPERTIES: &'static [&'static str];

    /// Construct from an already-parsed JSON value.
    ///
    /// The value must be an object whose keys are all declared properties.
    /// Missing optional properties take their defaults.
    fn construct(value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(ProtocolError::MessageDecode {
                message: format!("{} payload must be a JSON object", Self::TYPE),
            });
        };
        if let Some(name) = fields
            .keys()
            .find(|key| !Self::PROPERTIES.contains(&key.as_str()))
        {
            return Err(ProtocolError::InvalidMessageProperty { name: name.clone() });
        }
        serde_json::from_value(Value::Object(fields)).map_err(ProtocolError::decode)
    }

    /// Parse JSON text and construct.
    fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::decode)?;
        Self::construct(value)
    }

    /// Flatten into a JSON object of declared properties.
    fn flatten(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(ProtocolError::Encode(serde::ser::Error::custom(format!(
                "{} flattened to non-object {other}",
                Self::TYPE
            )))),
        }
    }

    /// Flatten and serialize as a JSON object string.
    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Liveness probe sent by a client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    /// Opaque value echoed back in the [`Pong`].
    #[serde(default)]
    pub payload: Value,
}

/// Reply to a [`Ping`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    /// Payload copied from the originating ping.
    #[serde(default)]
    pub payload: Value,
}

/// Client-visible error report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

/// Request to receive notifications for the listed services.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscribe {
    /// Service (topic) names to add.
    #[serde(default)]
    pub services: Vec<String>,
}

/// A connection's full current subscription set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriptions {
    /// Every service the connection is subscribed to. Order is not significant.
    #[serde(default)]
    pub services: Vec<String>,
}

/// Event pushed to subscribers of a service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Service the event was published to.
    pub service: String,
    /// Event payload as received from the notification source.
    #[serde(default)]
    pub payload: Value,
}

impl MessageBody for Ping {
    const TYPE: CommandType = CommandType::Ping;
    const PROPERTIES: &'static [&'static str] = &["payload"];
}

impl MessageBody for Pong {
    const TYPE: CommandType = CommandType::Pong;
    const PROPERTIES: &'static [&'static str] = &["payload"];
}

impl MessageBody for ErrorMessage {
    const TYPE: CommandType = CommandType::Error;
    const PROPERTIES: &'static [&'static str] = &["description"];
}

impl MessageBody for Subscribe {
    const TYPE: CommandType = CommandType::Subscribe;
    const PROPERTIES: &'static [&'static str] = &["services"];
}

impl MessageBody for Subscriptions {
    const TYPE: CommandType = CommandType::Subscriptions;
    const PROPERTIES: &'static [&'static str] = &["services"];
}

impl MessageBody for Notification {
    const TYPE: CommandType = CommandType::Notification;
    const PROPERTIES: &'static [&'static str] = &["service", "payload"];
}

/// Every registered message variant.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// `ping`
    Ping(Ping),
    /// `pong`
    Pong(Pong),
    /// `error`
    Error(ErrorMessage),
    /// `subscribe`
    Subscribe(Subscribe),
    /// `subscriptions`
    Subscriptions(Subscriptions),
    /// `notification`
    Notification(Notification),
}

impl Message {
    /// Build an [`ErrorMessage`] variant.
    pub fn error(description: impl Into<String>) -> Self {
        Self::Error(ErrorMessage {
            description: description.into(),
        })
    }

    /// Tag this message is registered under.
    pub fn command_type(&self) -> CommandType {
        match self {
            Self::Ping(_) => Ping::TYPE,
            Self::Pong(_) => Pong::TYPE,
            Self::Error(_) => ErrorMessage::TYPE,
            Self::Subscribe(_) => Subscribe::TYPE,
            Self::Subscriptions(_) => Subscriptions::TYPE,
            Self::Notification(_) => Notification::TYPE,
        }
    }

    /// Flatten the inner variant into its JSON object form.
    pub fn flatten(&self) -> Result<Map<String, Value>> {
        match self {
            Self::Ping(body) => body.flatten(),
            Self::Pong(body) => body.flatten(),
            Self::Error(body) => body.flatten(),
            Self::Subscribe(body) => body.flatten(),
            Self::Subscriptions(body) => body.flatten(),
            Self::Notification(body) => body.flatten(),
        }
    }
}

impl From<Ping> for Message {
    fn from(body: Ping) -> Self {
        Self::Ping(body)
    }
}

impl From<Pong> for Message {
    fn from(body: Pong) -> Self {
        Self::Pong(body)
    }
}

impl From<ErrorMessage> for Message {
    fn from(body: ErrorMessage) -> Self {
        Self::Error(body)
    }
}

impl From<Subscribe> for Message {
    fn from(body: Subscribe) -> Self {
        Self::Subscribe(body)
    }
}

impl From<Subscriptions> for Message {
    fn from(body: Subscriptions) -> Self {
        Self::Subscriptions(body)
    }
}

impl From<Notification> for Message {
    fn from(body: Notification) -> Self {
        Self::Notification(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    /// A message with a nested sub-message, to exercise recursive construction.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Envelope {
        label: String,
        inner: Subscribe,
    }

    impl From<Envelope> for Message {
        fn from(body: Envelope) -> Self {
            Message::Subscribe(body.inner)
        }
    }

    impl MessageBody for Envelope {
        const TYPE: CommandType = CommandType::Subscribe;
        const PROPERTIES: &'static [&'static str] = &["label", "inner"];
    }

    #[test]
    fn simple_to_json() {
        let msg = ErrorMessage {
            description: "boom".into(),
        };
        let parsed: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, json!({"description": "boom"}));
    }

    #[test]
    fn simple_from_json() {
        let msg = Ping::from_json(r#"{"payload": "derp"}"#).unwrap();
        assert_eq!(msg.payload, json!("derp"));
    }

    #[test]
    fn nested_from_json() {
        let msg =
            Envelope::from_json(r#"{"label": "outer", "inner": {"services": ["a"]}}"#).unwrap();
        assert_eq!(msg.label, "outer");
        assert_eq!(msg.inner.services, vec!["a".to_string()]);
    }

    #[test]
    fn nested_flatten() {
        let msg = Envelope {
            label: "outer".into(),
            inner: Subscribe {
                services: vec!["a".into(), "b".into()],
            },
        };
        let flat = msg.flatten().unwrap();
        assert_eq!(
            Value::Object(flat),
            json!({"label": "outer", "inner": {"services": ["a", "b"]}})
        );
    }

    #[test]
    fn unknown_property_rejected() {
        let err = Ping::construct(json!({"payload": 1, "extra": true})).unwrap_err();
        assert_matches!(err, ProtocolError::InvalidMessageProperty { name } if name == "extra");
    }

    #[test]
    fn missing_optional_property_defaults() {
        let ping = Ping::construct(json!({})).unwrap();
        assert_eq!(ping.payload, Value::Null);
        let sub = Subscribe::construct(json!({})).unwrap();
        assert!(sub.services.is_empty());
    }

    #[test]
    fn missing_required_property_is_decode_error() {
        let err = Notification::construct(json!({"payload": 1})).unwrap_err();
        assert_matches!(err, ProtocolError::MessageDecode { .. });
    }

    #[test]
    fn wrong_property_type_is_decode_error() {
        let err = Subscribe::construct(json!({"services": 5})).unwrap_err();
        assert_matches!(err, ProtocolError::MessageDecode { .. });
    }

    #[test]
    fn non_object_is_decode_error() {
        let err = Ping::construct(json!([1, 2])).unwrap_err();
        assert_matches!(err, ProtocolError::MessageDecode { .. });
    }

    #[test]
    fn malformed_text_is_decode_error() {
        let err = Ping::from_json("{,}").unwrap_err();
        assert_matches!(err, ProtocolError::MessageDecode { .. });
    }

    #[test]
    fn command_type_matches_variant() {
        assert_eq!(Message::Ping(Ping::default()).command_type(), CommandType::Ping);
        assert_eq!(Message::error("x").command_type(), CommandType::Error);
        assert_eq!(
            Message::from(Subscriptions::default()).command_type(),
            CommandType::Subscriptions
        );
    }

    fn assert_declared<M: MessageBody>(body: &M) {
        let flat = body.flatten().unwrap();
        let mut keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        let mut declared = M::PROPERTIES.to_vec();
        keys.sort_unstable();
        declared.sort_unstable();
        assert_eq!(keys, declared, "{} properties drifted from its fields", M::TYPE);
        let _ = M::construct(Value::Object(flat)).unwrap();
    }

    #[test]
    fn flatten_declares_every_property() {
        assert_declared(&Ping {
            payload: json!("derp"),
        });
        assert_declared(&Pong::default());
        assert_declared(&ErrorMessage {
            description: "boom".into(),
        });
        assert_declared(&Subscribe {
            services: vec!["a".into()],
        });
        assert_declared(&Subscriptions::default());
        assert_declared(&Notification {
            service: "compute".into(),
            payload: json!({"id": 7}),
        });
    }

    /// Serializes as a bare number, never an object.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Scalar(u32);

    impl From<Scalar> for Message {
        fn from(_: Scalar) -> Self {
            Message::Ping(Ping::default())
        }
    }

    impl MessageBody for Scalar {
        const TYPE: CommandType = CommandType::Ping;
        const PROPERTIES: &'static [&'static str] = &[];
    }

    #[test]
    fn non_object_flatten_is_encode_error() {
        let err = Scalar(3).flatten().unwrap_err();
        assert_eq!(err.kind(), "encode");
        assert_matches!(err, ProtocolError::Encode(_));
    }
}
