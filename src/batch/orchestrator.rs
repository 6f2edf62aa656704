//! Batch Orchestrator
//!
//! Drives one sweep: lists the catalog, submits every image inside the
//! configured window to the bounded executor, waits for the executor to
//! drain and produces the sorted summary.
//!
//! ```text
//! NotStarted ──► Running ──► Draining ──► Completed
//!                (listing +   (listing     (wait returned,
//!                 scanning)    finished)    summary built)
//! ```

use std::sync::Arc;

use log::{debug, info, warn};

use super::catalog::{CatalogCursor, CatalogSource, WorkItem};
use super::context::BatchContext;
use super::error::{BatchError, BatchResult};
use super::executor::{BoundedExecutor, ExecutionSummary};
use super::metrics::BatchSummary;
use super::runner::TaskRunner;

/// Lifecycle of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BatchState {
    NotStarted,
    Running,
    Draining,
    Completed,
}

pub struct BatchOrchestrator {
    context: Arc<BatchContext>,
    catalog: Arc<dyn CatalogSource>,
    state: BatchState,
}

impl BatchOrchestrator {
    pub fn new(context: Arc<BatchContext>, catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            context,
            catalog,
            state: BatchState::NotStarted,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn context(&self) -> &Arc<BatchContext> {
        &self.context
    }

    fn transition(&mut self, next: BatchState) {
        debug_assert!(next > self.state, "batch state cannot go from {:?} to {:?}", self.state, next);
        debug!("Batch state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the batch to completion
    ///
    /// A catalog failure aborts the listing; work already submitted is still
    /// drained before the error is returned.
    pub async fn run(&mut self) -> BatchResult<BatchSummary> {
        if self.state != BatchState::NotStarted {
            return Err(BatchError::configuration("a batch can only be run once"));
        }

        let executor = BoundedExecutor::new(self.context.config.parallelism)?;
        self.transition(BatchState::Running);
        info!(
            "Starting batch: start-at {}, count {}, parallelism {}, providers {}",
            self.context.config.start_at,
            self.context.config.count,
            executor.parallelism(),
            self.context.config.providers.join(",")
        );

        let listing = self.dispatch(&executor).await;

        self.transition(BatchState::Draining);
        let execution = executor.wait().await;
        self.transition(BatchState::Completed);

        let summary = self.context.metrics.summary(self.context.elapsed());
        log_execution(&execution, &summary);

        match listing {
            Ok(dispatched) => {
                info!("Batch completed: {} images dispatched", dispatched);
                Ok(summary)
            }
            Err(e) => {
                warn!("Batch aborted after {} images: {}", summary.processed(), e);
                Err(e)
            }
        }
    }

    async fn dispatch(&self, executor: &BoundedExecutor) -> BatchResult<usize> {
        let config = &self.context.config;
        if config.count == 0 {
            info!("Nothing to do: count is 0");
            return Ok(0);
        }

        let mut cursor = CatalogCursor::new(Arc::clone(&self.catalog));
        let mut dispatched = 0;

        // Checked before pulling so a full window never triggers another page fetch
        while !config.past_window(cursor.items_emitted()) {
            let Some(item) = cursor.next().await? else {
                break;
            };
            if config.before_window(item.index) {
                continue;
            }

            let item = WorkItem {
                index: item.index,
                identifier: config.reference(&item.identifier),
            };
            let runner = TaskRunner::new(Arc::clone(&self.context));
            executor.execute(item.identifier.clone(), async move {
                runner.run(item).await;
            });
            dispatched += 1;
        }

        debug!(
            "Listing finished after {} pages, {} items",
            cursor.pages_fetched(),
            cursor.items_emitted()
        );
        Ok(dispatched)
    }
}

fn log_execution(execution: &ExecutionSummary, summary: &BatchSummary) {
    info!(
        "{} reported, {} clean, {} failed; {} files scanned",
        summary.reported, summary.clean, summary.failed, summary.total_files
    );
    if execution.panicked > 0 {
        warn!("{} tasks escaped containment and were stopped by the executor", execution.panicked);
    }
}
