//! Keyed, cancellable delayed tasks.
//!
//! One tokio task per key. Scheduling a key that is already pending replaces
//! the earlier task. [`DelayedTasks::shutdown`] cancels everything at once and
//! refuses later schedules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

struct PendingTask {
    id: u64,
    handle: AbortHandle,
}

type TaskTable = Arc<Mutex<HashMap<String, PendingTask>>>;

/// Owner of all delayed state mutations for one consumer.
pub struct DelayedTasks {
    tasks: TaskTable,
    cancel: CancellationToken,
    next_id: AtomicU64,
}

impl DelayedTasks {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            cancel: CancellationToken::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `task` after `delay`, replacing any task pending under `key`.
    ///
    /// Returns false when the scheduler is shut down or no tokio runtime is
    /// available; the task is dropped in that case.
    pub fn schedule<F>(&self, key: impl Into<String>, delay: Duration, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let key = key.into();
        if self.cancel.is_cancelled() {
            return false;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(key = %key, "No async runtime, delayed task dropped");
                return false;
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.cancel.clone();
        let table = Arc::downgrade(&self.tasks);
        let task_key = key.clone();

        // Hold the table lock across spawn so the task cannot deregister
        // before it has been registered.
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if cancel.is_cancelled() {
                return;
            }
            if let Some(table) = table.upgrade() {
                let mut tasks = table.lock().unwrap_or_else(PoisonError::into_inner);
                if tasks.get(&task_key).map(|t| t.id) == Some(id) {
                    tasks.remove(&task_key);
                }
            }
            task();
        });

        if let Some(previous) = tasks.insert(
            key,
            PendingTask {
                id,
                handle: handle.abort_handle(),
            },
        ) {
            previous.handle.abort();
        }
        true
    }

    /// Cancel the task pending under `key`, if any.
    pub fn cancel(&self, key: &str) -> bool {
        let removed = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        match removed {
            Some(task) => {
                task.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, key: &str) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Number of tasks that have not fired yet.
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Cancel every pending task and reject future ones.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let drained: Vec<PendingTask> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, task)| task)
            .collect();
        for task in drained {
            task.handle.abort();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for DelayedTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DelayedTasks {
    fn drop(&mut self) {
        self.shutdown();
    }
}
