//! Graceful Shutdown
//!
//! One cancellation token for the whole process. Each client connection
//! runs under a child of it, so cancelling the root stops the listener and
//! every connection loop; the store is only closed once those have drained
//! or the drain deadline passes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ShutdownController {
    root: CancellationToken,
    open_clients: Arc<AtomicUsize>,
    drained: Arc<Notify>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            open_clients: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(Notify::new()),
        }
    }

    /// Cancel the root token. Later calls are no-ops.
    pub fn shutdown(&self) {
        if self.root.is_cancelled() {
            return;
        }
        tracing::info!("shutting down, {} client connections open", self.open_clients());
        self.root.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        self.root.cancelled().await
    }

    /// Token for one client connection: cancelled on shutdown, or on its own
    /// when the connection is closed from the handler side.
    pub fn client_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn open_clients(&self) -> usize {
        self.open_clients.load(Ordering::SeqCst)
    }

    /// Count a client connection as open until the guard drops.
    pub fn connection_guard(&self) -> ConnectionGuard {
        self.open_clients.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            controller: self.clone(),
        }
    }

    fn client_closed(&self) {
        let prev = self.open_clients.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Wait until no client connection is open, or `timeout` elapses.
    ///
    /// Returns false on timeout.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let drained = self.drained.notified();
        tokio::pin!(drained);
        // Register before checking the count so a close in between is not lost.
        drained.as_mut().enable();

        if self.open_clients() == 0 {
            return true;
        }

        tokio::select! {
            _ = drained => true,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    "drain timeout: {} client connections still open",
                    self.open_clients()
                );
                false
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ConnectionGuard {
    controller: ShutdownController,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.controller.client_closed();
    }
}

/// Wait for SIGINT or SIGTERM, then shut down.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    controller.shutdown();
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_is_idempotent() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutdown());

        controller.shutdown();
        controller.shutdown();
        assert!(controller.is_shutdown());
    }

    #[test]
    fn test_guards_track_open_clients() {
        let controller = ShutdownController::default();

        let first = controller.connection_guard();
        let second = controller.connection_guard();
        assert_eq!(controller.open_clients(), 2);

        drop(first);
        assert_eq!(controller.open_clients(), 1);
        drop(second);
        assert_eq!(controller.open_clients(), 0);
    }

    #[test]
    fn test_client_tokens_follow_shutdown() {
        let controller = ShutdownController::new();
        let a = controller.client_token();
        let b = controller.client_token();

        // Closing one client leaves the others and the root alone.
        a.cancel();
        assert!(!b.is_cancelled());
        assert!(!controller.is_shutdown());

        controller.shutdown();
        assert!(b.is_cancelled());
        assert!(controller.client_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_shutdown() {
        let controller = ShutdownController::new();
        let waiter = controller.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        controller.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(200), task).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_drain_without_clients_is_immediate() {
        let controller = ShutdownController::new();
        controller.shutdown();
        assert!(controller.wait_for_drain(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_drain_waits_for_last_client() {
        let controller = ShutdownController::new();
        let guard = controller.connection_guard();
        controller.shutdown();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_drain_times_out() {
        let controller = ShutdownController::new();
        let _guard = controller.connection_guard();
        controller.shutdown();

        assert!(!controller.wait_for_drain(Duration::from_millis(30)).await);
    }
}
