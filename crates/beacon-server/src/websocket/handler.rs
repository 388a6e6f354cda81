//! Command handlers and per-frame dispatch.
//!
//! Each inbound frame is decoded, resolved to a [`Message`], and routed by its
//! [`CommandType`] to a registered [`CommandHandler`]. Every failure becomes a
//! client-visible `error` reply; nothing here ends the session.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use beacon_protocol::{Command, CommandType, Message, ProtocolError, Subscriptions};
use metrics::counter;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use super::hub::ConnectionHub;
use crate::errors::HandlerError;
use crate::metrics::{COMMAND_ERRORS_TOTAL, COMMANDS_TOTAL};

/// Reply description for unparsable frames or payloads.
pub const MESSAGE_DECODE_ERROR: &str = "Message decode error";
/// Reply description for an unregistered `cmd_type`.
pub const INVALID_COMMAND_TYPE: &str = "Invalid command type";
/// Reply description for a known tag with no session handler.
pub const UNABLE_TO_HANDLE: &str = "Unable to handle command type";

/// What a handler can see of its session.
#[derive(Clone)]
pub struct SessionContext {
    /// The connection the command arrived on.
    pub connection: Arc<ClientConnection>,
    /// Shared connection set and subscription index.
    pub hub: Arc<ConnectionHub>,
}

/// Handles one client command and produces the reply.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Process `message` and return the message to send back.
    async fn handle(&self, message: Message, ctx: &SessionContext)
    -> Result<Message, HandlerError>;
}

/// `ping` → `pong` with the same payload.
pub struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn handle(
        &self,
        message: Message,
        _ctx: &SessionContext,
    ) -> Result<Message, HandlerError> {
        match message {
            Message::Ping(ping) => Ok(Message::Pong(beacon_protocol::Pong {
                payload: ping.payload,
            })),
            other => Err(HandlerError::Unhandled {
                cmd_type: other.command_type(),
            }),
        }
    }
}

/// `subscribe` → add every listed service, reply with the full set.
pub struct SubscribeHandler;

#[async_trait]
impl CommandHandler for SubscribeHandler {
    async fn handle(&self, message: Message, ctx: &SessionContext) -> Result<Message, HandlerError> {
        let Message::Subscribe(subscribe) = message else {
            return Err(HandlerError::Unhandled {
                cmd_type: message.command_type(),
            });
        };
        let id = &ctx.connection.id;
        let services = ctx
            .hub
            .subscribe(id, &subscribe.services)
            .unwrap_or_else(|| {
                warn!(conn_id = %id, "subscribe on evicted connection");
                Vec::new()
            });
        debug!(conn_id = %id, count = services.len(), "subscriptions updated");
        Ok(Message::Subscriptions(Subscriptions { services }))
    }
}

/// Registry mapping command types to handlers.
pub struct HandlerRegistry {
    handlers: HashMap<CommandType, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the client-facing handlers: `ping` and `subscribe`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(CommandType::Ping, PingHandler);
        registry.register(CommandType::Subscribe, SubscribeHandler);
        registry
    }

    /// Register (or replace) the handler for a command type.
    pub fn register(&mut self, cmd_type: CommandType, handler: impl CommandHandler + 'static) {
        let _ = self.handlers.insert(cmd_type, Arc::new(handler));
    }

    /// Whether a handler is registered for `cmd_type`.
    pub fn has_handler(&self, cmd_type: CommandType) -> bool {
        self.handlers.contains_key(&cmd_type)
    }

    /// Registered command types, sorted.
    pub fn command_types(&self) -> Vec<CommandType> {
        let mut types: Vec<CommandType> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Decode a text frame and produce the reply.
    pub async fn dispatch(&self, frame: &str, ctx: &SessionContext) -> Message {
        let resolved = Command::decode(frame).and_then(|cmd| cmd.resolve());
        self.route(resolved, ctx).await
    }

    /// Decode a binary frame and produce the reply.
    pub async fn dispatch_bytes(&self, frame: &[u8], ctx: &SessionContext) -> Message {
        let resolved = Command::decode_bytes(frame).and_then(|cmd| cmd.resolve());
        self.route(resolved, ctx).await
    }

    async fn route(&self, resolved: Result<Message, ProtocolError>, ctx: &SessionContext) -> Message {
        let message = match resolved {
            Ok(message) => message,
            Err(err) => {
                debug!(conn_id = %ctx.connection.id, error = %err, "rejected frame");
                counter!(COMMAND_ERRORS_TOTAL, "error_type" => err.kind()).increment(1);
                return protocol_error_reply(&err);
            }
        };

        let cmd_type = message.command_type();
        counter!(COMMANDS_TOTAL, "cmd_type" => cmd_type.as_str()).increment(1);

        let Some(handler) = self.handlers.get(&cmd_type) else {
            debug!(conn_id = %ctx.connection.id, %cmd_type, "no handler");
            counter!(COMMAND_ERRORS_TOTAL, "error_type" => "unhandled").increment(1);
            return Message::error(UNABLE_TO_HANDLE);
        };

        match handler.handle(message, ctx).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(conn_id = %ctx.connection.id, %cmd_type, error = %err, "handler rejected command");
                counter!(COMMAND_ERRORS_TOTAL, "error_type" => "unhandled").increment(1);
                Message::error(UNABLE_TO_HANDLE)
            }
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Client-visible reply for a decode failure.
pub fn protocol_error_reply(err: &ProtocolError) -> Message {
    match err {
        ProtocolError::InvalidCommandType { .. } => Message::error(INVALID_COMMAND_TYPE),
        ProtocolError::MessageDecode { .. }
        | ProtocolError::InvalidMessageProperty { .. }
        | ProtocolError::Encode(_) => Message::error(MESSAGE_DECODE_ERROR),
    }
}
