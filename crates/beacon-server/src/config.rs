//! Server configuration.

use std::time::Duration;

use beacon_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the gateway server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection.
    pub send_queue_capacity: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat timeout in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Close sessions that send no command for this many seconds.
    pub idle_timeout_secs: Option<u64>,
    /// Serve `POST /notify`.
    pub notify_endpoint: bool,
    /// Max seconds `wait_until_stopped` waits for the accept loop.
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-session timing and queue settings.
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            send_queue_capacity: self.send_queue_capacity.max(1),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs.max(1)),
            heartbeat_timeout: Duration::from_secs(self.heartbeat_timeout_secs),
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Drain bound for `wait_until_stopped`.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_message_size: s.max_message_size,
            send_queue_capacity: s.send_queue_capacity,
            heartbeat_interval_secs: s.heartbeat_interval_secs,
            heartbeat_timeout_secs: s.heartbeat_timeout_secs,
            idle_timeout_secs: s.idle_timeout_secs,
            notify_endpoint: s.notify_endpoint,
            shutdown_timeout_secs: s.shutdown_timeout_secs,
        }
    }
}

/// Settings each session task runs with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bounded outbound queue length.
    pub send_queue_capacity: usize,
    /// Interval between server pings and liveness checks.
    pub heartbeat_interval: Duration,
    /// Silence longer than this disconnects the client.
    pub heartbeat_timeout: Duration,
    /// Optional command inactivity limit.
    pub idle_timeout: Option<Duration>,
}
