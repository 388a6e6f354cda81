//! `/health` endpoint body.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while accepting, `"stopped"` otherwise.
    pub status: String,
    /// Seconds since the server was constructed.
    pub uptime_secs: u64,
    /// Whether the accept loop is running.
    pub running: bool,
    /// Live WebSocket connections.
    pub connections: usize,
    /// Topics with at least one subscriber.
    pub topics: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    running: bool,
    connections: usize,
    topics: usize,
) -> HealthResponse {
    HealthResponse {
        status: if running { "ok" } else { "stopped" }.into(),
        uptime_secs: start_time.elapsed().as_secs(),
        running,
        connections,
        topics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tracks_running() {
        assert_eq!(health_check(Instant::now(), true, 0, 0).status, "ok");
        assert_eq!(health_check(Instant::now(), false, 0, 0).status, "stopped");
    }

    #[test]
    fn counts_pass_through() {
        let resp = health_check(Instant::now(), true, 3, 2);
        assert_eq!(resp.connections, 3);
        assert_eq!(resp.topics, 2);
        assert_eq!(resp.uptime_secs, 0);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_value(health_check(Instant::now(), true, 1, 1)).unwrap();
        assert!(json.get("uptime_secs").is_some());
        assert_eq!(json["running"], true);
    }
}
