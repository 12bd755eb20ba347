//! Integration tests for the status and sync commands.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test: status prints one row per broker, with failures degraded to ERROR.
#[tokio::test]
async fn test_status_table_mixed_results() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/brokers/ZERODHA/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "CONNECTED", "connected": true
        })))
        .mount(&server)
        .await;
    // Remaining brokers unmounted: they 404 and must degrade, not crash.

    Command::cargo_bin("foliosync")
        .unwrap()
        .env("FOLIOSYNC_HOME", temp.path())
        .env("FOLIOSYNC_BASE_URL", server.uri())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Zerodha"))
        .stdout(predicate::str::contains("CONNECTED"))
        .stdout(predicate::str::contains("Upstox"))
        .stdout(predicate::str::contains("ERROR"));
}

/// Test: sync triggers a refresh and prints the settled summary.
#[tokio::test]
async fn test_sync_prints_summary() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path()).unwrap();
    // Shrink the settling delay so the test doesn't sit idle.
    fs::write(temp.path().join("config.toml"), "settle_secs = 0\n").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/portfolio/refresh"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/portfolio/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "invested": 100000, "current": 112500
        })))
        .mount(&server)
        .await;

    Command::cargo_bin("foliosync")
        .unwrap()
        .env("FOLIOSYNC_HOME", temp.path())
        .env("FOLIOSYNC_BASE_URL", server.uri())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("112500"));
}

/// Test: a failed refresh surfaces the backend message and exits non-zero.
#[tokio::test]
async fn test_sync_failure_reports_error() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("config.toml"), "settle_secs = 0\n").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/portfolio/refresh"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "reconciler down" })),
        )
        .mount(&server)
        .await;

    Command::cargo_bin("foliosync")
        .unwrap()
        .env("FOLIOSYNC_HOME", temp.path())
        .env("FOLIOSYNC_BASE_URL", server.uri())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("reconciler down"));
}
