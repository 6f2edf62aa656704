//! Batch execution

use std::sync::Arc;

use anyhow::Result;
use log::{debug, info};

use crate::batch::{
    BatchConfig, BatchContext, BatchOrchestrator, BatchSummary, CatalogSource, Cleanup, CommandScanner,
    DockerImageCleanup, HttpCatalog, ImageScanner,
};

/// Wire the production collaborators together and run one sweep
pub async fn run_batch(config: BatchConfig) -> Result<BatchSummary> {
    let catalog: Arc<dyn CatalogSource> = Arc::new(HttpCatalog::with_page_size(&config.catalog_url, config.page_size)?);
    let scanner: Arc<dyn ImageScanner> = Arc::new(CommandScanner::new(
        config.scanner_command.clone(),
        config.scanner_args.clone(),
    ));
    let cleanup: Arc<dyn Cleanup> = Arc::new(DockerImageCleanup::default());

    run_with(config, catalog, scanner, Some(cleanup)).await
}

/// Run one sweep against explicit collaborators and print its summary
pub async fn run_with(
    config: BatchConfig,
    catalog: Arc<dyn CatalogSource>,
    scanner: Arc<dyn ImageScanner>,
    cleanup: Option<Arc<dyn Cleanup>>,
) -> Result<BatchSummary> {
    let context = Arc::new(BatchContext::new(config, scanner, cleanup)?);
    info!("Writing reports to {}", context.reports.dir().display());

    let mut orchestrator = BatchOrchestrator::new(context, catalog);
    let summary = orchestrator.run().await?;
    debug!("Batch finished in state {:?}", orchestrator.state());

    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &BatchSummary) {
    for line in summary.lines() {
        println!("{}", line);
    }
    if summary.failed > 0 {
        info!("{} of {} images failed", summary.failed, summary.processed());
    }
}
