//! End-to-end scenarios against a live server.
//!
//! These tests are `#[ignore]`d: they need a MySQL-family server reachable
//! through `SQLSTORM_TEST_SOCKET` (or 127.0.0.1:3306) with credentials in
//! `SQLSTORM_TEST_USER` / `SQLSTORM_TEST_PASSWORD`. Run them with
//! `cargo test -- --ignored`.

use assert_cmd::Command;
use std::fs;
use tempfile::TempDir;

fn sqlstorm(logdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sqlstorm").unwrap();
    cmd.args([
        "--logdir",
        &logdir.path().display().to_string(),
        "--database",
        "sqlstorm_test",
        "--user",
        &std::env::var("SQLSTORM_TEST_USER").unwrap_or_else(|_| "root".into()),
        "--password",
        &std::env::var("SQLSTORM_TEST_PASSWORD").unwrap_or_default(),
    ]);
    if let Ok(socket) = std::env::var("SQLSTORM_TEST_SOCKET") {
        cmd.args(["--socket", &socket]);
    }
    cmd
}

#[test]
#[ignore = "needs a live server"]
fn fresh_prepare_writes_checkpoint() {
    let logdir = TempDir::new().unwrap();
    sqlstorm(&logdir)
        .args([
            "--prepare",
            "--step",
            "1",
            "--tables",
            "2",
            "--initial-records-in-table",
            "4",
            "--columns",
            "3",
            "--indexes",
            "1",
            "--no-partition",
            "--no-fk",
            "--no-temporary",
        ])
        .assert()
        .success();

    let checkpoint = fs::read_to_string(logdir.path().join("step_1.dll")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&checkpoint).unwrap();
    assert_eq!(doc["version"], 2);
    assert_eq!(doc["tables"].as_array().unwrap().len(), 2);
}

#[test]
#[ignore = "needs a live server"]
fn resume_preserves_the_catalog() {
    let logdir = TempDir::new().unwrap();
    sqlstorm(&logdir)
        .args(["--prepare", "--step", "1", "--tables", "2", "--no-partition", "--no-fk", "--no-temporary"])
        .assert()
        .success();
    let first = fs::read_to_string(logdir.path().join("step_1.dll")).unwrap();

    sqlstorm(&logdir)
        .args(["--step", "2", "--seconds", "0", "--no-temporary"])
        .assert()
        .success();
    let second = fs::read_to_string(logdir.path().join("step_2.dll")).unwrap();

    let a: serde_json::Value = serde_json::from_str(&first).unwrap();
    let b: serde_json::Value = serde_json::from_str(&second).unwrap();
    assert_eq!(a, b);
}

#[test]
#[ignore = "needs a live server"]
fn partition_lifecycle_keeps_invariants() {
    let logdir = TempDir::new().unwrap();
    sqlstorm(&logdir)
        .args([
            "--step",
            "1",
            "--tables",
            "1",
            "--only-partition",
            "--partition-supported",
            "range",
            "--max-partitions",
            "8",
            "--seconds",
            "5",
            "--only-cl-sql",
            "--add-drop-partition",
            "10",
            "--truncate",
            "10",
        ])
        .assert()
        .success();

    let checkpoint = fs::read_to_string(logdir.path().join("step_1.dll")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&checkpoint).unwrap();
    for table in doc["tables"].as_array().unwrap() {
        let ranges = table["ranges"].as_array().unwrap();
        let mut last = i64::MIN;
        for range in ranges {
            let upper = range["upper"].as_i64().unwrap();
            assert!(upper > last, "range bounds must strictly increase");
            last = upper;
        }
    }
}

#[test]
#[ignore = "needs a live server and a two-engine setup"]
fn comparator_smoke() {
    let logdir = TempDir::new().unwrap();
    let grammar = logdir.path().join("grammar.sql");
    fs::write(&grammar, "SELECT T1_INT_1 FROM T1\n").unwrap();
    sqlstorm(&logdir)
        .args([
            "--step",
            "1",
            "--seconds",
            "10",
            "--compare-result",
            "--grammar-file",
            &grammar.display().to_string(),
            "--only-cl-sql",
            "--grammar-sql",
            "10",
        ])
        .assert()
        .success();
}
