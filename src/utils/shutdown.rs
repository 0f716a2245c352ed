use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// How long in-flight uploads get to finish once a shutdown signal arrives.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracks in-flight proxy requests so a shutdown can let uploads drain.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    in_flight: Arc<AtomicUsize>,
    shutdown_in_progress: Arc<AtomicBool>,
}

/// Decrements the in-flight counter when dropped, including on client disconnect.
pub struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(AtomicUsize::new(0)),
            shutdown_in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn begin_request(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            in_flight: self.in_flight.clone(),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_shutdown_in_progress(&self) -> bool {
        self.shutdown_in_progress.load(Ordering::SeqCst)
    }

    /// Stops admitting requests and waits up to `timeout` for in-flight ones.
    pub async fn drain(&self, timeout: Duration) {
        info!("Draining in-flight uploads before shutdown");
        self.shutdown_in_progress.store(true, Ordering::SeqCst);

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let active = self.in_flight_count();
            if active == 0 {
                info!("All in-flight requests completed");
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "Drain timeout reached with {} requests still in flight; \
                     their chunk sessions stay open",
                    active
                );
                break;
            }
            info!("Waiting for {} in-flight requests...", active);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_tracks_in_flight_requests() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.in_flight_count(), 0);

        let first = coordinator.begin_request();
        let second = coordinator.begin_request();
        assert_eq!(coordinator.in_flight_count(), 2);

        drop(first);
        assert_eq!(coordinator.in_flight_count(), 1);
        drop(second);
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_drain_with_nothing_in_flight() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutdown_in_progress());

        coordinator.drain(Duration::from_millis(100)).await;
        assert!(coordinator.is_shutdown_in_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_after_timeout() {
        let coordinator = ShutdownCoordinator::new();
        let _guard = coordinator.begin_request();

        let start = tokio::time::Instant::now();
        coordinator.drain(Duration::from_secs(2)).await;

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(coordinator.in_flight_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_returns_when_requests_finish() {
        let coordinator = ShutdownCoordinator::new();
        let guard = coordinator.begin_request();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            drop(guard);
        });

        let start = tokio::time::Instant::now();
        coordinator.drain(Duration::from_secs(30)).await;
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
