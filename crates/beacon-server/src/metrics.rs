//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Session lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Decoded client commands (counter, labels: `cmd_type`).
pub const COMMANDS_TOTAL: &str = "commands_total";
/// Client commands answered with an error (counter, labels: `error_type`).
pub const COMMAND_ERRORS_TOTAL: &str = "command_errors_total";
/// Events received from notification sources (counter).
pub const NOTIFICATIONS_TOTAL: &str = "notifications_total";
/// Events with no routable topic (counter).
pub const NOTIFICATIONS_DROPPED_TOTAL: &str = "notifications_dropped_total";
/// Pushes enqueued to subscribers (counter).
pub const NOTIFICATION_DELIVERIES_TOTAL: &str = "notification_deliveries_total";
/// Pushes dropped on a full or closed queue (counter).
pub const NOTIFICATION_SEND_FAILURES_TOTAL: &str = "notification_send_failures_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_from_local_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(COMMANDS_TOTAL, "cmd_type" => "ping").increment(2);
        });
        let output = handle.render();
        assert!(output.contains("commands_total"), "{output}");
        assert!(output.contains("cmd_type=\"ping\""), "{output}");
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            COMMANDS_TOTAL,
            COMMAND_ERRORS_TOTAL,
            NOTIFICATIONS_TOTAL,
            NOTIFICATIONS_DROPPED_TOTAL,
            NOTIFICATION_DELIVERIES_TOTAL,
            NOTIFICATION_SEND_FAILURES_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
