//! Batch Configuration
//!
//! Static parameters of one sweep: which slice of the catalog to process,
//! how many images to scan at once, how to acquire them and where reports
//! go. Built from defaults, the configuration file and CLI overrides, then
//! validated once before the batch starts.
//!
//! ```rust,no_run
//! use imgsweep::batch::BatchConfig;
//!
//! let config = BatchConfig::builder()
//!     .with_parallelism(8)
//!     .with_window(100, 50)
//!     .with_providers(vec!["docker".to_string()])
//!     .build()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::catalog::{DEFAULT_CATALOG_URL, DEFAULT_PAGE_SIZE};
use super::error::{BatchError, BatchResult};
use super::report::ReportLayout;
use super::scanner::{default_scanner_args, DEFAULT_SCANNER_COMMAND};

/// Provider whose pulled images are evicted after scanning
pub const DOCKER_PROVIDER: &str = "docker";

/// Sweep parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Skip this many discovered images
    pub start_at: usize,
    /// Process at most this many images after `start_at`
    pub count: usize,
    /// Number of images scanned concurrently
    pub parallelism: usize,
    /// Source acquisition strategies, in order of preference
    pub providers: Vec<String>,
    /// Tag appended to untagged catalog names (empty for none)
    pub tag: String,
    pub results_dir: PathBuf,
    pub catalog_url: String,
    pub page_size: usize,
    pub scanner_command: String,
    pub scanner_args: Vec<String>,
    /// Extra noise patterns on top of the built-in deny list
    pub deny: Vec<String>,
    #[serde(skip)]
    pub layout: ReportLayout,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            start_at: 0,
            count: 1000,
            parallelism: 4,
            providers: vec!["registry".to_string()],
            tag: "latest".to_string(),
            results_dir: PathBuf::from("results"),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            scanner_command: DEFAULT_SCANNER_COMMAND.to_string(),
            scanner_args: default_scanner_args(),
            deny: Vec::new(),
            layout: ReportLayout::Full,
        }
    }
}

impl BatchConfig {
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::default()
    }

    pub fn validate(&self) -> BatchResult<()> {
        if self.parallelism == 0 {
            return Err(BatchError::configuration("parallelism must be at least 1"));
        }
        if self.providers.is_empty() || self.providers.iter().any(|p| p.trim().is_empty()) {
            return Err(BatchError::configuration("at least one non-empty provider is required"));
        }
        if self.page_size == 0 {
            return Err(BatchError::configuration("page-size must be at least 1"));
        }
        if self.scanner_command.trim().is_empty() {
            return Err(BatchError::configuration("scanner command must not be empty"));
        }
        if self.catalog_url.trim().is_empty() {
            return Err(BatchError::configuration("catalog-url must not be empty"));
        }
        Ok(())
    }

    /// Image reference for a catalog name
    pub fn reference(&self, name: &str) -> String {
        let last_segment = name.rsplit('/').next().unwrap_or(name);
        if self.tag.is_empty() || last_segment.contains(':') || name.contains('@') {
            name.to_string()
        } else {
            format!("{}:{}", name, self.tag)
        }
    }

    /// Whether the catalog index falls before the processing window
    pub fn before_window(&self, index: usize) -> bool {
        index < self.start_at
    }

    /// Whether the catalog index lies beyond the processing window
    pub fn past_window(&self, index: usize) -> bool {
        index >= self.start_at.saturating_add(self.count)
    }

    pub fn cleanup_enabled(&self) -> bool {
        self.providers.first().map(String::as_str) == Some(DOCKER_PROVIDER)
    }
}

/// Fluent construction of a validated `BatchConfig`
#[derive(Debug, Default)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.config.parallelism = parallelism;
        self
    }

    pub fn with_window(mut self, start_at: usize, count: usize) -> Self {
        self.config.start_at = start_at;
        self.config.count = count;
        self
    }

    pub fn with_providers(mut self, providers: Vec<String>) -> Self {
        self.config.providers = providers;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.tag = tag.into();
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.results_dir = dir.into();
        self
    }

    pub fn with_layout(mut self, layout: ReportLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn with_deny(mut self, deny: Vec<String>) -> Self {
        self.config.deny = deny;
        self
    }

    pub fn build(self) -> BatchResult<BatchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
