//! Layered configuration loading from YAML files and command-line overrides.

use clap::Parser;
use serial_test::serial;
use std::io::Write;
use swift_exporter::{
    cli::Cli,
    config::{Config, ConfigError, Module},
    swift::SwiftVersion,
};
use tempfile::NamedTempFile;

fn yaml(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_no_config_file_uses_defaults() {
    let config = Config::load(&Cli::default()).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_yaml_overrides_defaults() {
    let file = yaml(
        r#"
ReadReconFile: false
RunSMARTCTL: [false]
GrabNICMTU: []
SwiftLogFile: /tmp/swift.log
ObjectServerPort: 6200
ShardingMinVersion: "2.18"
CollectionIntervals:
  OneMinute: 30
SwiftServices:
  - ssswift-proxy
"#,
    );
    let config = Config::from_file(file.path()).unwrap();

    assert!(!config.is_enabled(Module::ReadReconFile));
    assert!(!config.is_enabled(Module::RunSMARTCTL));
    assert!(config.is_enabled(Module::GrabNICMTU));
    assert!(config.is_enabled(Module::SwiftDiskUsage));
    assert_eq!(config.swift_log_file.to_str(), Some("/tmp/swift.log"));
    assert_eq!(config.object_server_port, 6200);
    assert_eq!(config.sharding_min_version, SwiftVersion::new(2, 18));
    assert_eq!(config.collection_intervals.one_minute, 30);
    assert_eq!(config.collection_intervals.six_hours, 21600);
    assert_eq!(config.swift_services, vec!["ssswift-proxy".to_string()]);
}

#[test]
fn test_cli_flags_override_the_file() {
    let file = yaml("ListenAddress: 127.0.0.1:9000\nLogLevel: warn\n");
    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        listen_address: Some("127.0.0.1:9100".parse().unwrap()),
        log_level: None,
    };
    let config = Config::load(&cli).unwrap();
    assert_eq!(config.listen_address.port(), 9100);
    assert_eq!(config.log_level, "warn");
}

#[test]
fn test_missing_file_is_an_error() {
    let result = Config::load(&Cli::for_config(std::path::Path::new("/nonexistent/exporter.yml")));
    assert!(matches!(result, Err(ConfigError::MissingFile(_))));
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let file = yaml("ReadReconFile: [not, a, bool\n");
    assert!(matches!(Config::from_file(file.path()), Err(ConfigError::Extract(_))));
}

#[test]
fn test_zero_interval_is_rejected() {
    let file = yaml("CollectionIntervals:\n  FiveMinutes: 0\n");
    assert!(matches!(Config::from_file(file.path()), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_missing_prerequisites_disable_their_modules() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["account.recon", "container.recon"] {
        std::fs::write(dir.path().join(name), "{}").unwrap();
    }
    std::fs::write(dir.path().join("all.log"), "").unwrap();
    let mut config = Config {
        account_recon_file: dir.path().join("account.recon"),
        container_recon_file: dir.path().join("container.recon"),
        object_recon_file: dir.path().join("object.recon"),
        replication_progress_file: dir.path().join("progress.json"),
        swift_log_file: dir.path().join("all.log"),
        ..Config::default()
    };

    let disabled = config.disable_missing_prerequisites();
    assert_eq!(disabled, vec![Module::ReadReconFile, Module::GrabSwiftPartition]);
    assert!(!config.is_enabled(Module::ReadReconFile));
    assert!(config.is_enabled(Module::SwiftLogSize));
    assert!(config.is_enabled(Module::SwiftDiskUsage));
}

#[test]
#[serial]
fn test_environment_variables_feed_the_cli() {
    std::env::set_var("SWIFT_EXPORTER_LOG_LEVEL", "debug");
    std::env::set_var("SWIFT_EXPORTER_LISTEN_ADDRESS", "127.0.0.1:9200");
    let cli = Cli::try_parse_from(["swift_exporter"]);
    std::env::remove_var("SWIFT_EXPORTER_LOG_LEVEL");
    std::env::remove_var("SWIFT_EXPORTER_LISTEN_ADDRESS");

    let config = Config::load(&cli.unwrap()).unwrap();
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.listen_address.port(), 9200);
}

#[test]
#[serial]
fn test_flag_beats_environment_variable() {
    std::env::set_var("SWIFT_EXPORTER_LOG_LEVEL", "debug");
    let cli = Cli::try_parse_from(["swift_exporter", "--log-level", "error"]);
    std::env::remove_var("SWIFT_EXPORTER_LOG_LEVEL");

    assert_eq!(Config::load(&cli.unwrap()).unwrap().log_level, "error");
}
