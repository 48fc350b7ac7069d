//! Supervised per-call background tasks
//!
//! Fire-and-forget work (confirmation dispatch with retry) is spawned
//! through a tracker owned by the call, so teardown can cancel and join
//! everything within a bounded grace period instead of leaking tasks past
//! call cleanup.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct TaskTracker {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a tracked background task
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.lock().push(tokio::spawn(future));
    }

    /// Number of tasks ever spawned and not yet reaped
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Wait up to `grace` for each task, then cancel what remains
    pub async fn shutdown(&self, grace: Duration) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock();
            guard.drain(..).collect()
        };

        for mut handle in handles {
            if handle.is_finished() {
                let _ = handle.await;
                continue;
            }
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                tracing::debug!("Cancelling background task past grace period");
                handle.abort();
                let _ = handle.await;
            }
        }
    }
}
