//! Graceful shutdown coordination.
//!
//! One root [`CancellationToken`]; background tasks get child tokens and
//! register their join handles so shutdown can wait for them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default time background tasks get to finish
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Shutdown controller for background tasks
pub struct ShutdownController {
    cancel_token: CancellationToken,
    initiated: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    timeout: Duration,
}

impl ShutdownController {
    /// Controller with the default drain timeout
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS))
    }

    /// Controller with a custom drain timeout
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            cancel_token: CancellationToken::new(),
            initiated: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            timeout,
        })
    }

    /// Token for a component; cancelled on shutdown
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// Wait for this handle during shutdown
    pub fn track(&self, handle: JoinHandle<()>) {
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.push(handle),
            Err(_) => warn!("Shutdown task list poisoned, task will not be awaited"),
        }
    }

    /// Whether shutdown has started
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Cancel everything and wait for tracked tasks, aborting stragglers
    /// after the timeout. Only the first call does anything.
    pub async fn shutdown(&self) {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Shutdown already initiated");
            return;
        }

        info!("Initiating graceful shutdown...");
        self.cancel_token.cancel();

        let tasks = self
            .tasks
            .lock()
            .map(|mut tasks| std::mem::take(&mut *tasks))
            .unwrap_or_default();

        for mut handle in tasks {
            match tokio::time::timeout(self.timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Background task ended abnormally"),
                Err(_) => {
                    warn!(timeout_secs = self.timeout.as_secs(), "Background task did not stop, aborting");
                    handle.abort();
                }
            }
        }
        info!("Graceful shutdown complete");
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_cancels_and_drains() {
        let controller = ShutdownController::new();
        let token = controller.token();
        assert!(!controller.is_shutting_down());

        let task_token = token.clone();
        controller.track(tokio::spawn(async move {
            task_token.cancelled().await;
        }));

        controller.shutdown().await;
        assert!(token.is_cancelled());
        assert!(controller.is_shutting_down());
    }

    #[tokio::test]
    async fn test_double_shutdown_is_noop() {
        let controller = ShutdownController::new();
        controller.shutdown().await;
        controller.shutdown().await;
        assert!(controller.is_shutting_down());
    }

    #[tokio::test]
    async fn test_stuck_task_is_aborted() {
        let controller = ShutdownController::with_timeout(Duration::from_millis(20));
        controller.track(tokio::spawn(std::future::pending::<()>()));
        tokio::time::timeout(Duration::from_secs(1), controller.shutdown())
            .await
            .unwrap();
    }
}
