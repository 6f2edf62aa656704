//! Application initialization and configuration

use anyhow::{Context, Result};
use log::{debug, error};
use crate::batch::BatchConfig;
use crate::{cli, config, logging};

pub fn load_configuration(args: &cli::Args) -> Result<config::ConfigManager> {
    let mut manager = if let Some(config_file) = &args.config_file {
        debug!("Loading configuration from explicit file: {}", config_file.display());
        config::ConfigManager::load_from_file(config_file.clone())?
    } else {
        config::ConfigManager::load()?
    };

    if let Some(section_name) = &args.config_name {
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

/// File configuration with command line overrides, validated
pub fn build_batch_config(args: &cli::Args, config: &config::ConfigManager) -> Result<BatchConfig> {
    let mut batch = config
        .get_batch_config()
        .context("Invalid batch configuration")?;
    args.apply_to(&mut batch)?;
    batch.validate()?;

    debug!(
        "Effective batch configuration: {}",
        serde_json::to_string(&batch).unwrap_or_else(|_| format!("{:?}", batch))
    );
    Ok(batch)
}

pub fn configure_logging(args: &cli::Args, config: &config::ConfigManager) -> Result<logging::LogConfig> {
    use log::LevelFilter;
    use std::str::FromStr;

    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        match config.get_log_level("base", "console-level") {
            Ok(Some(level)) => level,
            Ok(None) => LevelFilter::Info,
            Err(e) => {
                debug!("Invalid console-level in config, using default: {}", e);
                LevelFilter::Info
            }
        }
    };

    let format = if !args.log_format.is_empty() && args.log_format != "text" {
        logging::LogFormat::from_str(&args.log_format).map_err(|e| anyhow::anyhow!(e))?
    } else {
        match config.get_value("base", "log-format") {
            Some(format_str) => logging::LogFormat::from_str(format_str).unwrap_or(logging::LogFormat::Text),
            None => logging::LogFormat::Text,
        }
    };

    let log_file_path = args.log_file.clone().or_else(|| config.get_path("base", "log-file"));

    let file_log_level = match &args.log_file_level {
        Some(level_str) => Some(logging::parse_log_level(level_str)?),
        None => match config.get_log_level("base", "file-log-level") {
            Ok(level) => level,
            Err(e) => {
                debug!("Invalid file-log-level in config, using None: {}", e);
                None
            }
        },
    };

    let (destination, file_level) = match (log_file_path, file_log_level) {
        (Some(file_path), Some(level)) => (logging::LogDestination::Both(file_path), Some(level)),
        (Some(file_path), None) => (logging::LogDestination::Both(file_path), Some(console_level)),
        (None, None) => (logging::LogDestination::Console, None),
        (None, Some(_)) => {
            error!("Log file level specified without log file");
            return Err(anyhow::anyhow!("Log file level specified without log file"));
        }
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn args(argv: &[&str]) -> cli::Args {
        cli::Args::try_parse_from(std::iter::once("imgsweep").chain(argv.iter().copied())).unwrap()
    }

    fn manager(section: &str, pairs: &[(&str, &str)]) -> config::ConfigManager {
        let mut configuration = config::Configuration::new();
        let values: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        configuration.insert(section.to_string(), values);
        config::ConfigManager::from_config(configuration)
    }

    #[test]
    fn test_cli_overrides_file_configuration() {
        let manager = manager("batch", &[("parallelism", "8"), ("count", "20")]);
        let batch = build_batch_config(&args(&["-j", "2"]), &manager).unwrap();
        assert_eq!(batch.parallelism, 2);
        assert_eq!(batch.count, 20);
    }

    #[test]
    fn test_invalid_effective_configuration_rejected() {
        let manager = manager("batch", &[("parallelism", "0")]);
        assert!(build_batch_config(&args(&[]), &manager).is_err());
    }

    #[test]
    fn test_logging_levels() {
        use log::LevelFilter;
        let empty = manager("base", &[]);

        assert_eq!(configure_logging(&args(&[]), &empty).unwrap().console_level, LevelFilter::Info);
        assert_eq!(configure_logging(&args(&["-v"]), &empty).unwrap().console_level, LevelFilter::Debug);
        assert_eq!(configure_logging(&args(&["--debug"]), &empty).unwrap().console_level, LevelFilter::Trace);

        let quiet_file = manager("base", &[("console-level", "warn")]);
        assert_eq!(configure_logging(&args(&[]), &quiet_file).unwrap().console_level, LevelFilter::Warn);
    }

    #[test]
    fn test_log_file_destination() {
        let empty = manager("base", &[]);
        let log_config = configure_logging(&args(&["--log-file", "sweep.log"]), &empty).unwrap();
        assert_eq!(
            log_config.destination,
            logging::LogDestination::Both(std::path::PathBuf::from("sweep.log"))
        );
        assert_eq!(log_config.file_level, Some(log::LevelFilter::Info));
    }
}
