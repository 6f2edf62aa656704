//! Batch Error Types
//!
//! Errors raised while sweeping the catalog. Only `Catalog` and
//! `Configuration` ever escape the orchestrator; everything else is
//! contained at the task boundary.

use thiserror::Error;

/// Errors that can occur during a batch sweep
#[derive(Debug, Error)]
pub enum BatchError {
    /// Catalog listing could not be fetched or decoded
    #[error("Catalog error: {0}\n\nThe image catalog could not be listed completely, so the batch was aborted.")]
    Catalog(String),

    /// Scan source could not be acquired for an image
    #[error("Failed to acquire source for {identifier}: {reason}")]
    Acquire { identifier: String, reason: String },

    /// External scan failed for an image
    #[error("Scan failed for {identifier}: {reason}")]
    Scan { identifier: String, reason: String },

    /// Report file could not be written
    #[error("Report error for {identifier}: {source}")]
    Report {
        identifier: String,
        #[source]
        source: std::io::Error,
    },

    /// Post-scan cleanup failed (never escalated)
    #[error("Cleanup failed for {identifier}: {reason}")]
    Cleanup { identifier: String, reason: String },

    /// Configuration error
    #[error("Configuration problem: {0}\n\nCheck your configuration file or command line arguments. Run 'imgsweep --help' for usage information.")]
    Configuration(String),

    /// Wrapped errors from other sources
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BatchError {
    /// Create a catalog error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a catalog error for a specific page URL
    pub fn catalog_page(url: &str, msg: impl std::fmt::Display) -> Self {
        Self::Catalog(format!("{msg} (page: {url})"))
    }

    pub fn acquire(identifier: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Acquire { identifier: identifier.into(), reason: reason.to_string() }
    }

    pub fn scan(identifier: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Scan { identifier: identifier.into(), reason: reason.to_string() }
    }

    pub fn report(identifier: impl Into<String>, source: std::io::Error) -> Self {
        Self::Report { identifier: identifier.into(), source }
    }

    pub fn cleanup(identifier: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Cleanup { identifier: identifier.into(), reason: reason.to_string() }
    }

    /// Create a configuration error with helpful suggestions
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether this error must abort the whole batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Catalog(_) | Self::Configuration(_))
    }
}

/// Result type for batch operations
pub type BatchResult<T> = Result<T, BatchError>;

impl From<reqwest::Error> for BatchError {
    fn from(error: reqwest::Error) -> Self {
        let url = error.url().map(|u| u.to_string()).unwrap_or_default();
        if error.is_timeout() {
            Self::Catalog(format!("Request timed out: {url}\n\nCheck your network connection and try again."))
        } else if error.is_connect() {
            Self::Catalog(format!("Connection failed: {url}\n\nThis usually indicates a network or service issue."))
        } else if error.is_decode() {
            Self::Catalog(format!("Malformed catalog page: {error}"))
        } else {
            Self::Catalog(error.to_string())
        }
    }
}
