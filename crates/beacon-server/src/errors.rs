//! Server and handler error types.

use beacon_protocol::CommandType;
use thiserror::Error;

/// Errors from the server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `start` was called while the server was already running.
    #[error("server is already running")]
    AlreadyRunning,

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Other socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The Prometheus recorder could not be installed.
    #[error("metrics recorder: {0}")]
    Metrics(String),
}

/// Errors a [`CommandHandler`](crate::CommandHandler) may return.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler was given a message it does not process.
    #[error("unable to handle command type {cmd_type}")]
    Unhandled {
        /// Tag of the rejected message.
        cmd_type: CommandType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_address() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:9999".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        let text = err.to_string();
        assert!(text.contains("127.0.0.1:9999"));
        assert!(text.contains("in use"));
    }

    #[test]
    fn unhandled_display() {
        let err = HandlerError::Unhandled {
            cmd_type: CommandType::Pong,
        };
        assert_eq!(err.to_string(), "unable to handle command type pong");
    }
}
