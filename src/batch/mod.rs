//! Batch Sweep Module
//!
//! Bounded-parallel scanning of a paginated image catalog. The catalog
//! cursor feeds the executor, each image runs in an isolated task runner,
//! and the shared metrics are summarised once the executor has drained.

pub mod catalog;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod filter;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod scanner;

pub use catalog::{CatalogCursor, CatalogSource, HttpCatalog, Page, WorkItem};
pub use cleanup::{Cleanup, DockerImageCleanup};
pub use config::BatchConfig;
pub use context::BatchContext;
pub use error::{BatchError, BatchResult};
pub use executor::{BoundedExecutor, ExecutionSummary};
pub use filter::{ErrorFilter, ReportRow};
pub use metrics::{BatchMetrics, BatchSummary};
pub use orchestrator::{BatchOrchestrator, BatchState};
pub use report::{ReportLayout, ReportWriter};
pub use runner::{TaskOutcome, TaskRunner};
pub use scanner::{CommandScanner, FileCoordinate, ImageScanner, ScanResult, ScanSource, SourceGuard};
