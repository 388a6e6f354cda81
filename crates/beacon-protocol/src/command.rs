//! `Command` envelope and the tag registry.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{ProtocolError, Result};
use crate::messages::{
    ErrorMessage, Message, MessageBody, Notification, Ping, Pong, Subscribe, Subscriptions,
};

/// Wire tag for every registered [`Message`] variant.
///
/// `as_str` and `from_tag` are exhaustive matches over the same set, so each
/// tag maps to exactly one variant and back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandType {
    /// `ping`
    Ping,
    /// `pong`
    Pong,
    /// `error`
    Error,
    /// `subscribe`
    Subscribe,
    /// `subscriptions`
    Subscriptions,
    /// `notification`
    Notification,
}

impl CommandType {
    /// All registered tags.
    pub const ALL: [Self; 6] = [
        Self::Ping,
        Self::Pong,
        Self::Error,
        Self::Subscribe,
        Self::Subscriptions,
        Self::Notification,
    ];

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error => "error",
            Self::Subscribe => "subscribe",
            Self::Subscriptions => "subscriptions",
            Self::Notification => "notification",
        }
    }

    /// Resolve a wire tag, `None` when unregistered.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ping" => Some(Self::Ping),
            "pong" => Some(Self::Pong),
            "error" => Some(Self::Error),
            "subscribe" => Some(Self::Subscribe),
            "subscriptions" => Some(Self::Subscriptions),
            "notification" => Some(Self::Notification),
            _ => None,
        }
    }

    /// Construct this tag's variant from a flattened JSON object.
    pub fn decode_body(self, body: Value) -> Result<Message> {
        Ok(match self {
            Self::Ping => Ping::construct(body)?.into(),
            Self::Pong => Pong::construct(body)?.into(),
            Self::Error => ErrorMessage::construct(body)?.into(),
            Self::Subscribe => Subscribe::construct(body)?.into(),
            Self::Subscriptions => Subscriptions::construct(body)?.into(),
            Self::Notification => Notification::construct(body)?.into(),
        })
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s).ok_or_else(|| ProtocolError::InvalidCommandType {
            cmd_type: s.to_owned(),
        })
    }
}

/// Top-level wire envelope: `{"cmd_type": tag, "payload": body}`.
///
/// Inbound payloads may be an embedded object or a JSON-encoded string;
/// outbound payloads are always the embedded object.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Command {
    /// Tag as it appeared on the wire. Not validated until [`Command::resolve`].
    pub cmd_type: String,
    /// Raw payload.
    pub payload: Value,
}

impl Command {
    /// Declared envelope properties.
    pub const PROPERTIES: &'static [&'static str] = &["cmd_type", "payload"];

    /// Parse a text frame into an envelope.
    ///
    /// Only the envelope shape is checked here; the tag and payload are
    /// validated by [`Command::resolve`].
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::decode)?;
        Self::construct(value)
    }

    /// Parse a binary frame into an envelope.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(ProtocolError::decode)?;
        Self::construct(value)
    }

    fn construct(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::decode("command must be a JSON object"));
        };
        if let Some(name) = fields
            .keys()
            .find(|key| !Self::PROPERTIES.contains(&key.as_str()))
        {
            return Err(ProtocolError::InvalidMessageProperty { name: name.clone() });
        }
        let cmd_type = match fields.remove("cmd_type") {
            Some(Value::String(tag)) => tag,
            Some(_) => return Err(ProtocolError::decode("cmd_type must be a string")),
            None => return Err(ProtocolError::decode("missing cmd_type")),
        };
        let payload = fields.remove("payload").unwrap_or(Value::Null);
        Ok(Self { cmd_type, payload })
    }

    /// Wrap a message for sending.
    pub fn for_message(message: &Message) -> Result<Self> {
        Ok(Self {
            cmd_type: message.command_type().as_str().to_owned(),
            payload: Value::Object(message.flatten()?),
        })
    }

    /// Look up the tag and construct the inner message.
    ///
    /// The tag is checked before the payload is touched, so an unknown tag is
    /// always reported as such even when its payload is garbage.
    pub fn resolve(&self) -> Result<Message> {
        let cmd_type: CommandType = self.cmd_type.parse()?;
        let body = match &self.payload {
            Value::String(text) => serde_json::from_str(text).map_err(ProtocolError::decode)?,
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => self.payload.clone(),
            other => {
                return Err(ProtocolError::decode(format!(
                    "payload must be an object or JSON string, got {other}"
                )));
            }
        };
        cmd_type.decode_body(body)
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Encode a message as a complete `Command` text frame.
pub fn encode(message: &Message) -> Result<String> {
    Command::for_message(message)?.encode()
}
