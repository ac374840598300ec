//! End-to-end tests for the nc-core binary.
//!
//! Every invocation passes `--config` explicitly so the host's XDG config
//! and `NC_CONFIG` never leak into the results.

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn nc_core() -> Command {
    let mut cmd = cargo_bin_cmd!("nc-core");
    cmd.env_remove("NC_CONFIG")
        .env_remove("RUST_LOG")
        .env("NC_LOG", "off");
    cmd
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn default_config(dir: &Path) -> PathBuf {
    write(dir, "analysis.json", "{}")
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn stderr_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stderr).expect("stderr should be JSON")
}

// ============================================================================
// Help and arguments
// ============================================================================

#[test]
fn help_lists_subcommands() {
    nc_core()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("feynman"))
        .stdout(predicate::str::contains("rossi"));
}

#[test]
fn unknown_subcommand_is_an_argument_error() {
    nc_core()
        .arg("nonexistent-command")
        .assert()
        .code(10)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn bad_model_name_is_an_argument_error() {
    nc_core()
        .args(["feynman", "events.txt", "--model", "gauss"])
        .assert()
        .code(10);
}

// ============================================================================
// Analyses
// ============================================================================

#[test]
fn feynman_report_on_sparse_stream_records_rejected_fit() {
    let dir = TempDir::new().unwrap();
    let config = default_config(dir.path());
    let events = write(dir.path(), "events.csv", "time,detector\n0,1\n1,1\n2,1\n10,1\n11,1\n");

    let output = nc_core()
        .arg("--config")
        .arg(&config)
        .arg("--compact")
        .arg("feynman")
        .arg(&events)
        .args(["--gate-width", "1,5", "--empty-gates", "skip"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json = stdout_json(&output);
    assert_eq!(json["schema_version"], "1.0.0");
    assert_eq!(json["command"], "feynman");
    assert_eq!(json["outcome"], "OK_FIT_REJECTED");
    assert!(json["run_id"].as_str().unwrap().starts_with("run-"));
    assert_eq!(json["config"]["source"]["source"], "CLI argument");
    assert_eq!(json["config"]["effective"]["feynman"]["empty_gates"], "skip");

    let report = &json["report"];
    assert_eq!(report["events"], 5);
    let points = report["sweep"]["points"].as_array().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[1]["gatewidth"], 5.0);
    assert_eq!(
        points[1]["histogram"]["frequency"],
        serde_json::json!([0, 0, 1, 1])
    );
    assert_eq!(report["fit"]["status"], "rejected");
    assert_eq!(report["fit"]["category"], "fit");
}

#[test]
fn rossi_report_contains_histogram_and_rejection() {
    let dir = TempDir::new().unwrap();
    let config = write(
        dir.path(),
        "analysis.json",
        r#"{"rossi": {"reset_time": 5.0, "number_bins": 5, "fit_range": [0.0, 2.0]}}"#,
    );
    let events = write(dir.path(), "events.txt", "0 1\n1 1\n2 1\n10 1\n11 1\n");

    let output = nc_core()
        .arg("--config")
        .arg(&config)
        .arg("rossi")
        .arg(&events)
        .args(["--binning", "type-iii"])
        .output()
        .unwrap();
    // two bins in the fit range cannot support a fit
    assert_eq!(output.status.code(), Some(1));

    let json = stdout_json(&output);
    assert_eq!(json["command"], "rossi");
    assert_eq!(json["report"]["fit"]["status"], "rejected");
    assert_eq!(json["config"]["effective"]["rossi"]["binning"], "type_iii");
    assert_eq!(
        json["report"]["histogram"]["frequency"],
        serde_json::json!([0.0, 3.0, 0.0, 0.0, 0.0])
    );
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn missing_event_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let config = default_config(dir.path());
    let output = nc_core()
        .arg("--config")
        .arg(&config)
        .args(["rossi", "/nonexistent/events.txt"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(21));
    assert!(output.stdout.is_empty());
    let json = stderr_json(&output);
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"]["code"], 60);
    assert_eq!(json["exit_code"], "ERR_IO");
}

#[test]
fn empty_event_file_is_an_input_error() {
    let dir = TempDir::new().unwrap();
    let config = default_config(dir.path());
    let events = write(dir.path(), "events.txt", "# nothing recorded\n");
    let output = nc_core()
        .arg("--config")
        .arg(&config)
        .arg("feynman")
        .arg(&events)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(12));
    assert_eq!(stderr_json(&output)["error"]["code"], 10);
}

#[test]
fn invalid_override_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let config = default_config(dir.path());
    let events = write(dir.path(), "events.txt", "0 1\n1 2\n");
    let output = nc_core()
        .arg("--config")
        .arg(&config)
        .arg("rossi")
        .arg(&events)
        .arg("--reset-time=-5")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(11));
    assert_eq!(stderr_json(&output)["error"]["category"], "config");
}

#[test]
fn malformed_config_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let config = write(dir.path(), "analysis.json", "{ not json");
    nc_core()
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .code(11)
        .stderr(predicate::str::contains("ERR_CONFIG"));
}

// ============================================================================
// Config commands
// ============================================================================

#[test]
fn config_show_prints_effective_values() {
    let dir = TempDir::new().unwrap();
    let config = write(
        dir.path(),
        "analysis.json",
        r#"{"rossi": {"reset_time": 250.0, "model": "exp_two"}}"#,
    );
    let output = nc_core()
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["config"]["rossi"]["reset_time"], 250.0);
    assert_eq!(json["config"]["rossi"]["model"], "exp_two");
    assert_eq!(json["source"]["sha256"].as_str().unwrap().len(), 64);
}

#[test]
fn config_validate_reports_semantic_errors() {
    let dir = TempDir::new().unwrap();
    let bad = write(dir.path(), "bad.json", r#"{"rossi": {"number_bins": 0}}"#);
    nc_core()
        .args(["config", "validate"])
        .arg(&bad)
        .assert()
        .code(11);

    let good = default_config(dir.path());
    nc_core()
        .args(["config", "validate"])
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\""));
}
