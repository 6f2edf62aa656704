use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tempfile::tempdir;

use imgsweep::app::{build_batch_config, configure_logging, load_configuration};
use imgsweep::batch::ReportLayout;
use imgsweep::cli::Args;
use imgsweep::config::ConfigManager;

const CONFIG: &str = r#"
console-level = "warn"

[batch]
start-at = 100
count = 50
parallelism = 8
providers = ["docker", "registry"]
tag = "stable"
results-dir = "/var/tmp/sweep"

[scanner]
command = "/opt/syft/bin/syft"
args = "scan,{image},-o,json"

[filter]
deny = ["unsupported archive"]

[report]
layout = "compact"

[ci]
parallelism = 16
count = 5
"#;

fn args(argv: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("imgsweep").chain(argv.iter().copied())).unwrap()
}

#[test]
fn test_config_file_integration() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("imgsweep.toml");
    fs::write(&config_path, CONFIG).expect("Failed to write config file");

    let manager = ConfigManager::load_from_file(config_path.clone()).unwrap();
    assert_eq!(manager.config_file_path(), Some(&config_path));

    let batch = manager.get_batch_config().unwrap();
    assert_eq!(batch.start_at, 100);
    assert_eq!(batch.count, 50);
    assert_eq!(batch.parallelism, 8);
    assert_eq!(batch.providers, vec!["docker", "registry"]);
    assert!(batch.cleanup_enabled());
    assert_eq!(batch.reference("library/nginx"), "library/nginx:stable");
    assert_eq!(batch.results_dir, PathBuf::from("/var/tmp/sweep"));
    assert_eq!(batch.scanner_command, "/opt/syft/bin/syft");
    assert_eq!(batch.scanner_args, vec!["scan", "{image}", "-o", "json"]);
    assert_eq!(batch.deny, vec!["unsupported archive"]);
    assert_eq!(batch.layout, ReportLayout::Compact);
}

#[test]
fn test_config_section_selection() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("imgsweep.toml");
    fs::write(&config_path, CONFIG).expect("Failed to write config file");
    let path = config_path.to_str().unwrap();

    let cli = args(&["--config-file", path, "--config-name", "ci"]);
    let manager = load_configuration(&cli).unwrap();
    let batch = build_batch_config(&cli, &manager).unwrap();
    assert_eq!(batch.parallelism, 16);
    assert_eq!(batch.count, 5);
    assert_eq!(batch.start_at, 100);

    // Command line beats both the selected section and the file
    let cli = args(&["--config-file", path, "--config-name", "ci", "-j", "2", "-p", "registry"]);
    let manager = load_configuration(&cli).unwrap();
    let batch = build_batch_config(&cli, &manager).unwrap();
    assert_eq!(batch.parallelism, 2);
    assert_eq!(batch.providers, vec!["registry"]);
    assert!(!batch.cleanup_enabled());
}

#[test]
fn test_base_keys_drive_logging() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("imgsweep.toml");
    fs::write(&config_path, CONFIG).expect("Failed to write config file");

    let cli = args(&["--config-file", config_path.to_str().unwrap()]);
    let manager = load_configuration(&cli).unwrap();
    let log_config = configure_logging(&cli, &manager).unwrap();
    assert_eq!(log_config.console_level, log::LevelFilter::Warn);
}

#[test]
fn test_invalid_values_rejected() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("imgsweep.toml");
    fs::write(&config_path, "[batch]\nparallelism = \"many\"\n").unwrap();

    let manager = ConfigManager::load_from_file(config_path).unwrap();
    assert!(manager.get_batch_config().is_err());
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let missing = temp_dir.path().join("absent.toml");
    assert!(ConfigManager::load_from_file(missing).is_err());
}
