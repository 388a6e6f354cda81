//! # beacon-server
//!
//! Axum WebSocket gateway that bridges a notification source to subscribed
//! clients.
//!
//! - **Sessions** ([`websocket::session`]): one task per socket, a bounded
//!   outbound queue drained by a writer task, heartbeat and idle timeouts
//! - **Dispatch** ([`websocket::handler`]): `cmd_type` → [`CommandHandler`]
//!   map; `ping` and `subscribe` are registered by default
//! - **Subscription index** ([`subscriptions`]): topic ↔ connection maps kept
//!   in lockstep behind the [`ConnectionHub`] lock
//! - **Fan-out** ([`notification`]): `(properties, body)` events from any
//!   [`NotificationSource`] are pushed to the topic's subscribers
//! - **Lifecycle** ([`server`]): start/stop/drain, `/health`, `/metrics`,
//!   `/notify`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod notification;
pub mod server;
pub mod shutdown;
pub mod subscriptions;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{HandlerError, ServerError};
pub use notification::{
    Event, InProcessSource, NotificationFanOut, NotificationHandler, NotificationSource,
    Properties,
};
pub use server::GatewayServer;
pub use subscriptions::SubscriptionIndex;
pub use websocket::connection::{ClientConnection, ConnectionId};
pub use websocket::handler::{CommandHandler, HandlerRegistry, SessionContext};
pub use websocket::hub::{ConnectionHub, PublishReport};
