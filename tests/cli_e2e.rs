//! End-to-end CLI tests for the citesync binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Test that the binary is a no-op without search terms and exits with code 0.
#[test]
fn test_binary_invocation_without_terms_returns_zero() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("citesync").unwrap();
    cmd.current_dir(temp.path()).assert().success();
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("citesync").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Search scholarly indexes"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("citesync").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("citesync"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("citesync").unwrap();
    cmd.arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that terms shorter than three characters are dropped, leaving a no-op.
#[test]
fn test_binary_short_terms_are_skipped() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("citesync").unwrap();
    cmd.current_dir(temp.path()).arg("ml").assert().success();
}

/// Test that missing credentials produce a clear startup error.
#[test]
fn test_binary_missing_credentials_fails_loudly() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("citesync").unwrap();
    cmd.current_dir(temp.path())
        .arg("deep learning")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required configuration"));
}

/// Test that an explicitly named but absent config file is an error.
#[test]
fn test_binary_explicit_missing_config_fails() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("citesync").unwrap();
    cmd.current_dir(temp.path())
        .args(["--config", "does-not-exist.toml", "deep learning"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.toml"));
}

/// Test that a malformed config file is rejected at startup.
#[test]
fn test_binary_malformed_config_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("citesync.toml"), "this is { not toml").unwrap();

    let mut cmd = Command::cargo_bin("citesync").unwrap();
    cmd.current_dir(temp.path())
        .arg("deep learning")
        .assert()
        .failure()
        .stderr(predicate::str::contains("citesync.toml"));
}
