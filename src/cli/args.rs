use clap::{ArgAction, Parser};
use anyhow::Result;
use std::path::PathBuf;
use log::debug;

use crate::batch::config::BatchConfig;
use crate::batch::report::ReportLayout;

/// Container Image Catalog Sweeper
#[derive(Parser, Debug)]
#[command(name = "imgsweep")]
#[command(about = "Scan every image in a paginated container catalog in parallel and report the files the cataloger could not classify")]
#[command(version)]
pub struct Args {
    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION")]
    pub config_name: Option<String>,

    // ============ BATCH WINDOW ============

    /// Skip the first N images discovered in the catalog
    #[arg(short = 's', long = "start-at", value_name = "N")]
    pub start_at: Option<usize>,

    /// Process at most N images after --start-at
    #[arg(short = 'n', long = "count", value_name = "N")]
    pub count: Option<usize>,

    /// Number of images scanned concurrently
    #[arg(short = 'j', long = "parallelism", value_name = "N")]
    pub parallelism: Option<usize>,

    // ============ SOURCES AND OUTPUT ============

    /// Image source provider (repeatable, comma-separated values accepted)
    #[arg(short = 'p', long = "provider", value_name = "PROVIDER", action = ArgAction::Append)]
    pub providers: Vec<String>,

    /// Tag appended to untagged catalog names (empty string for none)
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Directory receiving the per-image CSV reports
    #[arg(short = 'o', long = "results-dir", value_name = "DIR")]
    pub results_dir: Option<PathBuf>,

    /// Report layout: full or compact
    #[arg(long, value_name = "LAYOUT")]
    pub layout: Option<String>,

    /// Catalog listing URL (without page size)
    #[arg(long, value_name = "URL")]
    pub catalog_url: Option<String>,

    /// Cataloger executable
    #[arg(long, value_name = "PROGRAM")]
    pub scanner: Option<String>,
}

impl Args {
    /// Split comma-separated provider values
    pub fn apply_enhanced_parsing(mut self) -> Self {
        self.providers = self
            .providers
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from)
            .collect();
        self
    }

    /// Apply command line overrides on top of file configuration
    pub fn apply_to(&self, config: &mut BatchConfig) -> Result<()> {
        if let Some(start_at) = self.start_at {
            config.start_at = start_at;
        }
        if let Some(count) = self.count {
            config.count = count;
        }
        if let Some(parallelism) = self.parallelism {
            config.parallelism = parallelism;
        }
        if !self.providers.is_empty() {
            config.providers = self.providers.clone();
        }
        if let Some(tag) = &self.tag {
            config.tag = tag.clone();
        }
        if let Some(dir) = &self.results_dir {
            config.results_dir = dir.clone();
        }
        if let Some(layout) = &self.layout {
            config.layout = layout.parse::<ReportLayout>().map_err(|e| anyhow::anyhow!(e))?;
        }
        if let Some(url) = &self.catalog_url {
            config.catalog_url = url.clone();
        }
        if let Some(scanner) = &self.scanner {
            config.scanner_command = scanner.clone();
        }
        Ok(())
    }
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let args = Args::parse().apply_enhanced_parsing();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();

    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    match args.log_format.to_lowercase().as_str() {
        "text" | "json" => {}
        _ => {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}'. Valid options: text, json",
                args.log_format
            ))
        }
    }

    if let Some(ref level) = args.log_file_level {
        match level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log file level '{}'. Valid levels: error, warn, info, debug, trace",
                    level
                ))
            }
        }
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!("--log-file-level requires --log-file to be specified"));
    }

    if args.parallelism == Some(0) {
        return Err(anyhow::anyhow!("--parallelism must be at least 1"));
    }

    Ok(())
}
