//! # beacon-logging
//!
//! Installs the global `tracing` subscriber: an [`EnvFilter`] built from the
//! configured level and per-module overrides (`RUST_LOG` wins when set),
//! feeding a single fmt layer in pretty or JSON form.

#![deny(unsafe_code)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Output format for the fmt layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-oriented.
    #[default]
    Pretty,
    /// One JSON object per event, with target and span list.
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Default level directive. Overridden by `RUST_LOG`.
    pub level: String,
    /// Per-module overrides, e.g. `("beacon_server::websocket", "debug")`.
    pub modules: Vec<(String, String)>,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            modules: Vec::new(),
            format: LogFormat::Pretty,
        }
    }
}

/// Errors from [`init_logging`].
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A level or module directive did not parse.
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),
    /// A global subscriber is already installed.
    #[error("logging already initialized")]
    AlreadyInitialized,
}

/// Render the configured level and module overrides as filter directives.
pub fn directives(config: &LoggingConfig) -> String {
    let mut out = config.level.to_lowercase();
    for (module, level) in &config.modules {
        out.push(',');
        out.push_str(module);
        out.push('=');
        out.push_str(&level.to_lowercase());
    }
    out
}

/// Build the filter. A non-empty `rust_log` replaces the configured directives.
pub fn build_filter(
    config: &LoggingConfig,
    rust_log: Option<&str>,
) -> Result<EnvFilter, LoggingError> {
    let filter = match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(env) => env.to_string(),
        None => directives(config),
    };
    EnvFilter::try_new(&filter).map_err(|e| LoggingError::InvalidFilter(format!("{filter}: {e}")))
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(config, rust_log.as_deref())?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };
    installed.map_err(|_| LoggingError::AlreadyInitialized)
}
