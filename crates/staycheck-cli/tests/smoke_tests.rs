//! Smoke tests for the staycheck binary
//!
//! None of these start a browser: they cover argument parsing, the pure
//! `dates` command and configuration failures that abort before any
//! session is requested.

#![allow(deprecated)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn staycheck() -> Command {
    let mut cmd = Command::cargo_bin("staycheck").expect("Failed to find staycheck binary");
    for var in [
        "STAYCHECK_BROWSER",
        "STAYCHECK_HEADLESS",
        "STAYCHECK_REMOTE_URL",
        "STAYCHECK_BASE_URL",
        "STAYCHECK_IMPLICIT_WAIT",
        "STAYCHECK_PAGE_LOAD_TIMEOUT",
        "BROWSER",
        "HEADLESS",
        "REMOTE_URL",
        "BASE_URL",
        "IMPLICIT_WAIT",
        "PAGE_LOAD_TIMEOUT",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_version_flag() {
    staycheck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("staycheck"));
}

#[test]
fn test_help_lists_scenarios() {
    staycheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("availability"))
        .stdout(predicate::str::contains("booking-validation"))
        .stdout(predicate::str::contains("--remote-url"));
}

#[test]
fn test_no_args_fails() {
    staycheck().assert().failure();
}

#[test]
fn test_dates_with_pinned_today() {
    staycheck()
        .args(["dates", "--today", "2026-01-30", "--offset", "5", "--nights", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2026-02-04"))
        .stdout(predicate::str::contains("06/02/2026"))
        .stdout(predicate::str::contains("nights     2"));
}

#[test]
fn test_dates_json() {
    let output = staycheck()
        .args(["dates", "--today", "2028-02-28", "--offset", "1", "--nights", "1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["check_in_iso"], "2028-02-29");
    assert_eq!(report["check_out_localized"], "01/03/2028");
}

#[test]
fn test_dates_rejects_zero_nights() {
    staycheck()
        .args(["dates", "--nights", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_dates_rejects_malformed_today() {
    staycheck()
        .args(["dates", "--today", "30/01/2026"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--today"));
}

#[test]
fn test_missing_config_file_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");
    staycheck()
        .arg("availability")
        .arg("--config")
        .arg(&missing)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_invalid_config_value_aborts() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "browser: chrome\nimplicitWait: soon").unwrap();
    staycheck()
        .arg("contact")
        .arg("--config")
        .arg(file.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("implicitWait"));
}

#[test]
fn test_unknown_browser_flag_rejected() {
    staycheck()
        .args(["book", "--browser", "opera"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("opera"));
}
