//! CLI integration tests for the `sqlstorm` binary.
//!
//! Everything here exercises the paths that run before a server connection
//! is attempted; workload scenarios against a live server live in
//! `live_server.rs` behind `#[ignore]`.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn sqlstorm() -> Command {
    Command::cargo_bin("sqlstorm").unwrap()
}

#[test]
fn help_lists_registry_options() {
    sqlstorm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--initial-records-in-table"))
        .stdout(predicate::str::contains("--no-ddl"))
        .stdout(predicate::str::contains("--compare-result"))
        .stdout(predicate::str::contains("--grammar-file"));
}

#[test]
fn version_flag() {
    sqlstorm()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sqlstorm"));
}

#[test]
fn unknown_option_fails() {
    sqlstorm()
        .arg("--definitely-not-an-option")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}

#[test]
fn missing_prob_file_fails() {
    sqlstorm()
        .args(["--option-prob-file", "/nonexistent/probs.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("option-probability file"));
}

#[test]
fn unknown_option_in_prob_file_fails() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "NOT_A_REAL_OPTION=5").unwrap();
    sqlstorm()
        .args(["--option-prob-file", &file.path().display().to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown option"));
}

#[test]
fn malformed_server_option_fails() {
    sqlstorm()
        .args(["--server-option", "missing-equals"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed --server-option"));
}

#[test]
fn missing_config_file_fails() {
    sqlstorm()
        .args(["--config-file", "/nonexistent/sqlstorm.ini"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("resolving endpoints"));
}

#[test]
fn bad_port_fails() {
    sqlstorm()
        .args(["--port", "not-a-port"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("port"));
}

#[test]
fn config_without_runnable_sections_fails() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[standby]\nrun = false\naddress = nowhere.example\n").unwrap();
    sqlstorm()
        .args(["--config-file", &file.path().display().to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no endpoint"));
}
