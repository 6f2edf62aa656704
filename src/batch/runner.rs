//! Task Runner
//!
//! End-to-end processing of one image: acquire, count, scan, filter, report,
//! record, clean up. Every failure and panic stops at this boundary and is
//! turned into a `TaskOutcome::Failed`; nothing propagates to the executor.

use std::panic::{resume_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use log::{debug, error, info, warn};

use super::catalog::WorkItem;
use super::context::BatchContext;
use super::error::{BatchError, BatchResult};
use super::executor::panic_message;
use super::scanner::SourceGuard;

/// How one image ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Unknowns survived filtering and were written
    Reported { rows: usize, path: PathBuf },
    /// Nothing left after filtering; no report file
    Clean,
    Failed { reason: String },
}

pub struct TaskRunner {
    context: Arc<BatchContext>,
}

impl TaskRunner {
    pub fn new(context: Arc<BatchContext>) -> Self {
        Self { context }
    }

    /// Process `item`; never fails and never panics outward
    pub async fn run(&self, item: WorkItem) -> TaskOutcome {
        println!("Scanning: {} {}", item.index, item.identifier);
        let started = Instant::now();

        let outcome = match AssertUnwindSafe(self.process(&item)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => TaskOutcome::Failed { reason: e.to_string() },
            Err(payload) => TaskOutcome::Failed {
                reason: format!("panic: {}", panic_message(payload.as_ref())),
            },
        };

        let metrics = &self.context.metrics;
        match &outcome {
            TaskOutcome::Reported { rows, path } => {
                metrics.mark_reported();
                info!("{}: {} unknowns written to {}", item.identifier, rows, path.display());
            }
            TaskOutcome::Clean => {
                metrics.mark_clean();
                debug!("{}: nothing to report", item.identifier);
            }
            TaskOutcome::Failed { reason } => {
                metrics.mark_failed();
                println!("ERROR: {}: {}", item.identifier, reason);
                error!("Scan of {} (index {}) failed: {}", item.identifier, item.index, reason);
            }
        }

        if !matches!(outcome, TaskOutcome::Failed { .. }) {
            let elapsed = started.elapsed();
            metrics.record_duration(&item.identifier, elapsed);
            println!("completed {} '{}' in {:?}", item.index, item.identifier, elapsed);
        }

        self.cleanup(&item.identifier).await;
        outcome
    }

    async fn process(&self, item: &WorkItem) -> BatchResult<TaskOutcome> {
        let context = &self.context;

        let source = context
            .scanner
            .acquire(&item.identifier, &context.config.providers)
            .await?;
        let mut source = SourceGuard::new(source);

        let files = source.source().file_count().await?;
        context.metrics.add_files(files as u64);
        debug!("{}: {} files", item.identifier, files);

        let result = source.source().scan().await?;
        if let Err(e) = source.close() {
            warn!("Failed to release source for {}: {}", item.identifier, e);
        }

        let rows = context.filter.report_rows(result.unknowns);
        let row_count = rows.len();
        let writer = context.reports.clone();
        let identifier = item.identifier.clone();

        let written = match tokio::task::spawn_blocking(move || writer.write(&identifier, &rows)).await {
            Ok(written) => written.map_err(|e| BatchError::report(&item.identifier, e))?,
            Err(join_err) if join_err.is_panic() => resume_unwind(join_err.into_panic()),
            Err(join_err) => return Err(BatchError::Other(anyhow::anyhow!("report task aborted: {join_err}"))),
        };

        Ok(match written {
            Some(path) => TaskOutcome::Reported { rows: row_count, path },
            None => TaskOutcome::Clean,
        })
    }

    async fn cleanup(&self, identifier: &str) {
        let Some(cleanup) = &self.context.cleanup else {
            return;
        };
        match AssertUnwindSafe(cleanup.cleanup(identifier)).catch_unwind().await {
            Ok(Ok(())) => debug!("Cleaned up {}", identifier),
            Ok(Err(e)) => warn!("{}", e),
            Err(payload) => warn!("Cleanup of {} panicked: {}", identifier, panic_message(payload.as_ref())),
        }
    }
}
