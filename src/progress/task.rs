//! Background tasks with cooperative cancellation

use crate::progress::ProgressTracker;
use crate::{Result, ShioriError};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle of a spawned long-running operation
///
/// Dropping the handle does not stop the operation; call
/// [`BackgroundTask::cancel`] to request a stop.
#[derive(Debug)]
pub struct BackgroundTask<T> {
    key: String,
    token: CancellationToken,
    handle: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Spawns `f` on the runtime, handing it the task's cancellation token
    pub fn spawn<F, Fut>(key: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(f(token.clone()));
        Self {
            key: key.into(),
            token,
            handle,
        }
    }

    /// Progress key this task reports under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Requests cancellation; the operation stops at its next checkpoint
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the operation and returns its result
    pub async fn join(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ShioriError::Cancelled),
            Err(e) => Err(ShioriError::Task(e.to_string())),
        }
    }
}

impl ProgressTracker {
    /// Runs a singleton operation in the background under a progress key
    ///
    /// The task is registered with `total` units before `f` starts; `f`
    /// advances it through the tracker it receives. On success the task is
    /// marked complete. The entry is left in place for pollers to read.
    pub fn spawn_tracked<T, F, Fut>(
        self: &Arc<Self>,
        key: &str,
        total: u64,
        f: F,
    ) -> BackgroundTask<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<ProgressTracker>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.init_task(key, total);
        let tracker = Arc::clone(self);
        let owned_key = key.to_string();

        BackgroundTask::spawn(key, move |token| {
            let work = f(Arc::clone(&tracker), token);
            async move {
                let result = work.await;
                if result.is_ok() {
                    tracker.set_completed(&owned_key, total);
                }
                result
            }
        })
    }
}
