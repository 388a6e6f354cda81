//! Graceful shutdown coordination via `CancellationToken`.
//!
//! The coordinator hands out a fresh token on every [`reset`](ShutdownCoordinator::reset)
//! so a stopped server can be started again.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates shutdown of the accept loop.
pub struct ShutdownCoordinator {
    token: Mutex<CancellationToken>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with an uncancelled token.
    pub fn new() -> Self {
        Self {
            token: Mutex::new(CancellationToken::new()),
        }
    }

    /// Clone of the current token.
    pub fn token(&self) -> CancellationToken {
        self.token.lock().clone()
    }

    /// Replace the current token with a fresh one and return it.
    pub fn reset(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        *self.token.lock() = fresh.clone();
        fresh
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.lock().cancel();
    }

    /// Whether the current token is cancelled.
    pub fn is_shutting_down(&self) -> bool {
        self.token.lock().is_cancelled()
    }

    /// Wait up to `timeout` for `handle` to finish, aborting it afterwards.
    ///
    /// Returns `true` when the task finished on its own.
    pub async fn drain(&self, mut handle: JoinHandle<()>, timeout: Duration) -> bool {
        info!(timeout_secs = timeout.as_secs(), "waiting for accept loop to drain");
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "accept loop task failed");
                true
            }
            Err(_) => {
                warn!("shutdown timed out after {timeout:?}, aborting accept loop");
                handle.abort();
                false
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
    }

    #[test]
    fn token_propagation() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        coord.shutdown();
        coord.shutdown();
        assert!(token.is_cancelled());
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn reset_issues_live_token() {
        let coord = ShutdownCoordinator::new();
        let old = coord.token();
        coord.shutdown();
        let fresh = coord.reset();
        assert!(old.is_cancelled());
        assert!(!fresh.is_cancelled());
        assert!(!coord.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_completes_when_task_exits() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let handle = tokio::spawn(async move { token.cancelled().await });
        coord.shutdown();
        assert!(coord.drain(handle, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn drain_times_out_and_aborts() {
        let coord = ShutdownCoordinator::new();
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert!(!coord.drain(handle, Duration::from_millis(20)).await);
    }
}
