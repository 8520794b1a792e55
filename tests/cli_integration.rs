//! CLI Integration Tests
//!
//! End-to-end tests for CLI commands using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Get the fleetdeck binary with no ambient configuration
fn fleetdeck_cmd() -> Command {
    let mut cmd = Command::cargo_bin("fleetdeck").unwrap();
    cmd.env_remove("FLEETDECK_URL")
        .env_remove("FLEETDECK_LOG_LEVEL")
        .env_remove("FLEETDECK_LOG_FORMAT")
        .env_remove("RUST_LOG");
    cmd
}

/// Run a command off the async runtime and collect its assertion.
async fn run(mut cmd: Command) -> assert_cmd::assert::Assert {
    tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .unwrap()
}

#[test]
fn test_version_output() {
    fleetdeck_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetdeck"));
}

#[test]
fn test_help_shows_all_commands() {
    fleetdeck_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("logs"))
        .stdout(predicate::str::contains("gateway"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_gateway_help_lists_filters() {
    fleetdeck_cmd()
        .args(["gateway", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--status"))
        .stdout(predicate::str::contains("--type"))
        .stdout(predicate::str::contains("--follow"));
}

#[test]
fn test_config_init_creates_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("fleetdeck.toml");

    fleetdeck_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .assert()
        .success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[control_plane]"));
    assert!(content.contains("keepalive_interval_ms = 25000"));
}

#[test]
fn test_config_init_no_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("fleetdeck.toml");
    std::fs::write(&config_path, "existing content").unwrap();

    fleetdeck_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert_eq!(content, "existing content");
}

#[test]
fn test_config_init_force_overwrites() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("fleetdeck.toml");
    std::fs::write(&config_path, "old content").unwrap();

    fleetdeck_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap(), "--force"])
        .assert()
        .success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[retention]"));
}

#[test]
fn test_config_init_with_url() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("fleetdeck.toml");

    fleetdeck_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .args(["--url", "https://cp.internal:9443"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://cp.internal:9443"));

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("url = \"https://cp.internal:9443\""));

    fleetdeck_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap(), "--force"])
        .args(["--url", "gopher://cp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("control_plane.url"));
}

#[test]
fn test_invalid_command() {
    fleetdeck_cmd()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_completions_bash() {
    fleetdeck_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetdeck"));
}

#[test]
fn test_invalid_url_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    fleetdeck_cmd()
        .args(["gateway", "-c"])
        .arg(temp_dir.path().join("absent.toml"))
        .args(["--url", "ftp://cp.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("fleetdeck.toml");
    std::fs::write(&config_path, "[stream]\nkeepalive_interval_ms = \"soon\"").unwrap();

    fleetdeck_cmd()
        .args(["logs", "h1", "i1", "-c", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_gateway_prints_stats_and_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/gateway/stats"))
        .and(query_param("status", "error"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_requests": 3, "success_count": 0, "error_count": 3, "missed_count": 0
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/gateway/requests"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requests": [{"request_id": "req-42", "status": "error", "status_code": 502}]
        })))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut cmd = fleetdeck_cmd();
    cmd.args(["gateway", "--status", "error", "--limit", "5", "--json", "-c"])
        .arg(temp_dir.path().join("absent.toml"))
        .args(["--url", &server.uri()]);

    let assert = run(cmd).await.success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(value["stats"]["error_count"], 3);
    assert_eq!(value["requests"][0]["request_id"], "req-42");
    assert_eq!(value["requests"][0]["status_code"], 502);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_logs_prints_tail_in_sequence_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/hosts/h1/instances/i1/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"seq": 3, "line": "third"},
            {"seq": 1, "line": "first"},
            {"seq": 2, "line": "second"}
        ])))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut cmd = fleetdeck_cmd();
    cmd.args(["logs", "h1", "i1", "-n", "2", "-c"])
        .arg(temp_dir.path().join("absent.toml"))
        .args(["--url", &server.uri()]);

    run(cmd)
        .await
        .success()
        .stdout(predicate::eq("second\nthird\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_logs_reports_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/hosts/h1/instances/missing/logs"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut cmd = fleetdeck_cmd();
    cmd.args(["logs", "h1", "missing", "-c"])
        .arg(temp_dir.path().join("absent.toml"))
        .args(["--url", &server.uri()]);

    run(cmd)
        .await
        .failure()
        .stderr(predicate::str::contains("404"));
}
