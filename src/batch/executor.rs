//! Bounded Executor
//!
//! Fixed-parallelism task execution for batch items. Submission never
//! blocks: each task is spawned immediately and waits for a semaphore permit
//! before it starts, so at most `parallelism` tasks run at once and the rest
//! queue behind them. A panic inside one task is captured at the join point
//! and never reaches its siblings.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::error::{BatchError, BatchResult};

/// Submitted task awaiting the join point
#[derive(Debug)]
pub struct TaskHandle {
    pub name: String,
    pub submitted_at: Instant,
    pub handle: JoinHandle<()>,
}

/// Outcome counts reported by `wait`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub completed: usize,
    pub panicked: usize,
}

impl ExecutionSummary {
    pub fn total(&self) -> usize {
        self.completed + self.panicked
    }
}

/// Decrements the running counter even if the task unwinds
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed-size pool of concurrent task slots
pub struct BoundedExecutor {
    parallelism: usize,
    semaphore: Arc<Semaphore>,
    tasks: Mutex<Vec<TaskHandle>>,
    running: Arc<AtomicUsize>,
    submitted: AtomicUsize,
}

impl BoundedExecutor {
    /// Create an executor running at most `parallelism` tasks at once
    pub fn new(parallelism: usize) -> BatchResult<Self> {
        if parallelism == 0 {
            return Err(BatchError::configuration("parallelism must be at least 1"));
        }
        Ok(Self {
            parallelism,
            semaphore: Arc::new(Semaphore::new(parallelism)),
            tasks: Mutex::new(Vec::new()),
            running: Arc::new(AtomicUsize::new(0)),
            submitted: AtomicUsize::new(0),
        })
    }

    /// Queue a task and return immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn execute<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let semaphore = Arc::clone(&self.semaphore);
        let running = Arc::clone(&self.running);

        let handle = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            running.fetch_add(1, Ordering::SeqCst);
            let _running = RunningGuard(running);
            task.await;
        });

        self.submitted.fetch_add(1, Ordering::SeqCst);
        debug!("Queued task '{}'", name);
        self.tasks.lock().push(TaskHandle {
            name,
            submitted_at: Instant::now(),
            handle,
        });
    }

    /// Wait until every task submitted so far has finished
    pub async fn wait(&self) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();

        loop {
            let handles: Vec<TaskHandle> = std::mem::take(&mut *self.tasks.lock());
            if handles.is_empty() {
                break;
            }

            for task in handles {
                match task.handle.await {
                    Ok(()) => {
                        debug!("Task '{}' finished after {:?}", task.name, task.submitted_at.elapsed());
                        summary.completed += 1;
                    }
                    Err(join_err) if join_err.is_panic() => {
                        let reason = panic_message(join_err.into_panic().as_ref());
                        error!("Task '{}' panicked: {}", task.name, reason);
                        summary.panicked += 1;
                    }
                    Err(join_err) => {
                        error!("Task '{}' did not complete: {}", task.name, join_err);
                        summary.panicked += 1;
                    }
                }
            }
        }

        summary
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Tasks currently holding a slot
    pub fn active_task_count(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Tasks submitted over the executor's lifetime
    pub fn submitted_count(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

/// Human-readable text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
