//! Behavior of the compiled binary at the command line.

use assert_cmd::Command;
use predicates::prelude::*;

fn exporter() -> Command {
    Command::cargo_bin("swift_exporter").unwrap()
}

#[test]
fn test_help_exits_zero() {
    exporter()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--listen-address"))
        .stdout(predicate::str::contains("[CONFIG]"));
}

#[test]
fn test_version_exits_zero() {
    exporter()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_config_file_exits_non_zero() {
    exporter()
        .arg("/nonexistent/swift_exporter.yml")
        .assert()
        .failure();
}

#[test]
fn test_invalid_config_exits_non_zero() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "CollectorTimeoutSeconds: 0\n").unwrap();
    exporter().arg(file.path()).assert().failure();
}

#[test]
fn test_more_than_one_positional_argument_is_rejected() {
    exporter().args(["a.yml", "b.yml"]).assert().failure();
}
