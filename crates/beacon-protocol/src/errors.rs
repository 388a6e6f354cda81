//! Protocol error type.

use thiserror::Error;

/// Errors raised while constructing, decoding, or encoding messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A field that the target message does not declare.
    #[error("{name} is not a valid property")]
    InvalidMessageProperty {
        /// The offending property name.
        name: String,
    },

    /// Text that could not be parsed into the expected JSON shape.
    #[error("message decode error: {message}")]
    MessageDecode {
        /// Parser detail.
        message: String,
    },

    /// A `cmd_type` tag with no registered message variant.
    #[error("invalid command type: {cmd_type}")]
    InvalidCommandType {
        /// The tag as received.
        cmd_type: String,
    },

    /// Serializing an outbound message failed.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Build a decode error from any displayable parser failure.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::MessageDecode {
            message: err.to_string(),
        }
    }

    /// Short classification string for logging/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidMessageProperty { .. } => "invalid_message_property",
            Self::MessageDecode { .. } => "message_decode",
            Self::InvalidCommandType { .. } => "invalid_command_type",
            Self::Encode(_) => "encode",
        }
    }
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
