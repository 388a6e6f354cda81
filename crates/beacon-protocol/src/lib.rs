//! # beacon-protocol
//!
//! Wire vocabulary for the beacon notification gateway.
//!
//! Every frame exchanged with a client is a [`Command`] envelope:
//!
//! ```text
//! {"cmd_type": "<tag>", "payload": { ...variant fields... }}
//! ```
//!
//! - **Messages**: [`Message`] is a closed set of variants, each backed by a
//!   struct that declares its property names via [`MessageBody`]
//! - **Registry**: [`CommandType`] is the bijection between wire tags and
//!   variants; resolving a tag never consults anything but this enum
//! - **Codec**: [`Command::decode`] / [`Command::resolve`] for inbound frames,
//!   [`encode`] for outbound messages
//! - **Errors**: [`ProtocolError`] distinguishes unparsable JSON, unknown
//!   properties, and unknown command tags

#![deny(unsafe_code)]

pub mod command;
pub mod errors;
pub mod messages;

pub use command::{Command, CommandType, encode};
pub use errors::{ProtocolError, Result};
pub use messages::{
    ErrorMessage, Message, MessageBody, Notification, Ping, Pong, Subscribe, Subscriptions,
};
