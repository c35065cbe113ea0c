//! CLI integration tests against the demo catalog.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn demo_catalog() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos/catalog.yaml")
        .canonicalize()
        .expect("demo catalog exists")
}

/// Run the tributary binary from `dir` against the demo catalog
fn run_tributary_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tributary"))
        .arg("--catalog")
        .arg(demo_catalog())
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute tributary binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn test_build_text_lists_relationships() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_tributary_in_dir(temp_dir.path(), &["build", "orders_raw"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("orders_raw -> etl_nightly"), "{text}");
    assert!(text.contains("revenue_daily"), "{text}");
}

#[test]
fn test_build_json_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_tributary_in_dir(
        temp_dir.path(),
        &["--format", "json", "build", "orders_raw", "--depth", "1"],
    );

    let snapshot = json(&output);
    assert_eq!(snapshot["seed"], "orders_raw");
    assert_eq!(snapshot["metadata"]["depth_reached"], 1);
    let assets = snapshot["assets"].as_array().unwrap();
    assert!(assets.iter().any(|a| a["id"] == "etl_nightly"));
    assert!(!assets.iter().any(|a| a["id"] == "revenue_daily"));
}

#[test]
fn test_node_limit_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_tributary_in_dir(
        temp_dir.path(),
        &["--format", "json", "build", "orders_raw", "--max-nodes", "2"],
    );

    let snapshot = json(&output);
    assert_eq!(snapshot["metadata"]["truncated"], true);
    assert_eq!(snapshot["assets"].as_array().unwrap().len(), 2);
}

#[test]
fn test_paths_json_is_ranked() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_tributary_in_dir(
        temp_dir.path(),
        &["--format", "json", "paths", "orders_raw", "--depth", "6", "-k", "3"],
    );

    let report = json(&output);
    let paths = report["paths"].as_array().unwrap();
    assert_eq!(paths.len(), 3);
    let scores: Vec<f64> = paths.iter().map(|p| p["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn test_anomalies_finds_spike() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_tributary_in_dir(
        temp_dir.path(),
        &["--format", "json", "anomalies", "orders_clean", "-m", "row_count"],
    );

    let anomalies = json(&output);
    let anomalies = anomalies.as_array().unwrap();
    assert!(!anomalies.is_empty());
    assert!(anomalies.iter().any(|a| a["observed_value"] == 31000.0));
}

#[test]
fn test_forecast_projects_requested_periods() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_tributary_in_dir(
        temp_dir.path(),
        &["--format", "json", "forecast", "revenue_daily", "-m", "revenue", "-p", "5"],
    );

    let forecast = json(&output);
    assert_eq!(forecast["points"].as_array().unwrap().len(), 5);
    assert_eq!(forecast["model"], "double");
}

#[test]
fn test_insights_text_output() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_tributary_in_dir(
        temp_dir.path(),
        &["insights", "orders_raw", "--depth", "6", "--limit", "5"],
    );

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(!stdout(&output).trim().is_empty());
}

#[test]
fn test_unknown_seed_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_tributary_in_dir(temp_dir.path(), &["build", "no_such_table"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no_such_table"), "{stderr}");
}

#[test]
fn test_missing_catalog_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_tributary"))
        .args(["--catalog", "absent.yaml", "build", "orders_raw"])
        .current_dir(temp_dir.path())
        .output()
        .expect("Failed to execute tributary binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load catalog"), "{stderr}");
}

#[test]
fn test_local_config_file_is_used() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("tributary.yaml"),
        "build:\n  max-depth: 1\n",
    )
    .unwrap();

    let output = run_tributary_in_dir(temp_dir.path(), &["--format", "json", "build", "orders_raw"]);

    let snapshot = json(&output);
    assert_eq!(snapshot["metadata"]["depth_reached"], 1);
}
