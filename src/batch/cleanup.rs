//! Post-scan cleanup of locally materialized images

use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use super::error::{BatchError, BatchResult};

/// Removes whatever a scan left behind for an identifier
#[async_trait]
pub trait Cleanup: Send + Sync {
    async fn cleanup(&self, identifier: &str) -> BatchResult<()>;
}

/// Evicts pulled images from the local docker daemon
#[derive(Debug, Clone)]
pub struct DockerImageCleanup {
    program: String,
}

impl Default for DockerImageCleanup {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerImageCleanup {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    async fn run(&self, identifier: &str, args: &[&str]) -> BatchResult<String> {
        debug!("Running: {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| BatchError::cleanup(identifier, format!("failed to run {}: {e}", self.program)))?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if !output.status.success() {
            return Err(BatchError::cleanup(
                identifier,
                format!("{} {} exited with {}: {}", self.program, args.join(" "), output.status, combined.trim()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Cleanup for DockerImageCleanup {
    async fn cleanup(&self, identifier: &str) -> BatchResult<()> {
        let filter = format!("reference={identifier}");
        let listing = self.run(identifier, &["image", "list", "-aq", "-f", &filter]).await?;

        let mut image_ids: Vec<&str> = listing.split_whitespace().collect();
        image_ids.sort_unstable();
        image_ids.dedup();
        if image_ids.is_empty() {
            debug!("No local image to remove for {}", identifier);
            return Ok(());
        }

        let mut args = vec!["rmi", "-f"];
        args.extend(image_ids);
        self.run(identifier, &args).await?;
        Ok(())
    }
}
