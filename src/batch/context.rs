//! Per-batch shared context
//!
//! Everything a task runner needs, constructed once per batch and shared by
//! `Arc`. The metrics inside are the only state mutated across tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use super::cleanup::Cleanup;
use super::config::BatchConfig;
use super::error::{BatchError, BatchResult};
use super::filter::ErrorFilter;
use super::metrics::BatchMetrics;
use super::report::ReportWriter;
use super::scanner::ImageScanner;

pub struct BatchContext {
    pub config: BatchConfig,
    pub metrics: BatchMetrics,
    pub filter: ErrorFilter,
    pub reports: ReportWriter,
    pub scanner: Arc<dyn ImageScanner>,
    pub cleanup: Option<Arc<dyn Cleanup>>,
    started_at: Instant,
}

impl BatchContext {
    /// Validate the configuration and prepare the results directory
    pub fn new(
        config: BatchConfig,
        scanner: Arc<dyn ImageScanner>,
        cleanup: Option<Arc<dyn Cleanup>>,
    ) -> BatchResult<Self> {
        config.validate()?;

        let reports = ReportWriter::new(&config.results_dir, config.layout);
        reports.ensure_dir().map_err(|e| {
            BatchError::configuration(format!(
                "cannot create results directory {}: {e}",
                config.results_dir.display()
            ))
        })?;
        debug!("Reports will be written to {}", reports.dir().display());

        let filter = ErrorFilter::new(config.deny.iter().cloned());
        let cleanup = if config.cleanup_enabled() { cleanup } else { None };

        Ok(Self {
            config,
            metrics: BatchMetrics::new(),
            filter,
            reports,
            scanner,
            cleanup,
            started_at: Instant::now(),
        })
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
