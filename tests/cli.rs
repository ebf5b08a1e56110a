//! CLI surface tests.
//!
//! Exercise argument and configuration validation only; nothing here may
//! depend on 7-Zip, NSIS, or wine being installed.

use assert_cmd::Command;
use predicates::prelude::*;

fn setupforge() -> Command {
    Command::cargo_bin("setupforge").expect("binary builds")
}

#[test]
fn missing_config_file_fails_with_context() {
    let dir = tempfile::tempdir().unwrap();
    setupforge()
        .arg("--config")
        .arg(dir.path().join("does-not-exist.json"))
        .args(["--payload", "x64=payload"])
        .arg("--output-dir")
        .arg(dir.path().join("dist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading config"));
}

#[test]
fn malformed_payload_spec_is_rejected() {
    setupforge()
        .args(["--config", "tests/fixtures/valid.json"])
        .args(["--payload", "x64"])
        .args(["--output-dir", "dist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected arch=dir"));
}

#[test]
fn unknown_architecture_is_rejected() {
    setupforge()
        .args(["--config", "tests/fixtures/valid.json"])
        .args(["--payload", "mips=payload"])
        .args(["--output-dir", "dist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown architecture"));
}

#[test]
fn conflicting_mode_options_fail_before_any_build_work() {
    setupforge()
        .args(["--config", "tests/fixtures/conflicting.json"])
        .args(["--payload", "x64=payload"])
        .args(["--output-dir", "dist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("allowElevation"));
}

#[test]
fn payload_flag_is_required() {
    setupforge()
        .args(["--config", "tests/fixtures/valid.json"])
        .args(["--output-dir", "dist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--payload"));
}
