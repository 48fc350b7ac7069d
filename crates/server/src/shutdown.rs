//! Graceful shutdown coordination
//!
//! The sequence on SIGTERM/Ctrl-C: stop accepting new calls, wait up to a
//! bounded drain timeout for in-flight calls to finish naturally, then let
//! process exit cancel whatever remains. Call pipelines clean their own
//! resources on cancellation, so nothing here needs to reach into them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Default)]
pub struct ShutdownCoordinator {
    shutting_down: AtomicBool,
    active_calls: AtomicUsize,
    drained: Notify,
}

impl ShutdownCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn active_calls(&self) -> usize {
        self.active_calls.load(Ordering::SeqCst)
    }

    /// Register a starting call. Returns `None` once shutdown has begun;
    /// the caller must reject the connection.
    pub fn begin_call(self: &Arc<Self>) -> Option<CallGuard> {
        if self.is_shutting_down() {
            return None;
        }
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        Some(CallGuard {
            coordinator: self.clone(),
        })
    }

    /// Stop accepting new calls and wait up to `drain_timeout` for
    /// in-flight calls to finish.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let remaining = self.active_calls();
        if remaining == 0 {
            tracing::info!("Shutdown: no calls in flight");
            return;
        }

        tracing::info!(in_flight = remaining, "Shutdown: draining in-flight calls");
        let drained = async {
            while self.active_calls() > 0 {
                self.drained.notified().await;
            }
        };
        if tokio::time::timeout(drain_timeout, drained).await.is_err() {
            tracing::warn!(
                in_flight = self.active_calls(),
                "Drain timeout exceeded; remaining calls will be cancelled on exit"
            );
        } else {
            tracing::info!("Shutdown: all calls drained");
        }
    }
}

/// RAII registration of one in-flight call
pub struct CallGuard {
    coordinator: Arc<ShutdownCoordinator>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.coordinator.active_calls.fetch_sub(1, Ordering::SeqCst);
        self.coordinator.drained.notify_waiters();
    }
}
