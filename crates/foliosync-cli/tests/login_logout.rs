//! Integration tests for login/totp/logout commands against a mock backend.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test: logout without any session prints a friendly message.
#[test]
fn test_logout_when_not_logged_in() {
    let temp = tempdir().unwrap();

    Command::cargo_bin("foliosync")
        .unwrap()
        .env("FOLIOSYNC_HOME", temp.path())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"));
}

/// Test: a login that demands TOTP writes the restricted token to the
/// session file and tells the user what to run next.
#[tokio::test]
async fn test_login_totp_required_persists_stepup_token() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "t1", "purpose": "totp-login-required"
        })))
        .mount(&server)
        .await;

    Command::cargo_bin("foliosync")
        .unwrap()
        .env("FOLIOSYNC_HOME", temp.path())
        .env("FOLIOSYNC_BASE_URL", server.uri())
        .args(["login", "--username", "asha", "--password", "secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("totp verify"));

    let session = fs::read_to_string(temp.path().join("session.json")).unwrap();
    assert!(session.contains("totp-login-required"));
    assert!(session.contains("t1"));
}

/// Test: verifying a mandatory TOTP clears the session file and points the
/// user back to login.
#[tokio::test]
async fn test_totp_verify_clears_session_file() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    let session_path = temp.path().join("session.json");
    fs::write(
        &session_path,
        json!({ "value": "t1", "purpose": "totp-login-required" }).to_string(),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/totp/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    Command::cargo_bin("foliosync")
        .unwrap()
        .env("FOLIOSYNC_HOME", temp.path())
        .env("FOLIOSYNC_BASE_URL", server.uri())
        .args(["totp", "verify", "123456"])
        .assert()
        .success()
        .stdout(predicate::str::contains("foliosync login"));

    assert!(!session_path.exists(), "session.json should be cleared");
}

/// Test: a rejected code surfaces the backend message on stderr.
#[tokio::test]
async fn test_totp_verify_rejected_shows_backend_message() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    fs::write(
        temp.path().join("session.json"),
        json!({ "value": "t1", "purpose": "totp-login-required" }).to_string(),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/totp/verify"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "error": { "message": "Invalid TOTP code" } })),
        )
        .mount(&server)
        .await;

    Command::cargo_bin("foliosync")
        .unwrap()
        .env("FOLIOSYNC_HOME", temp.path())
        .env("FOLIOSYNC_BASE_URL", server.uri())
        .args(["totp", "verify", "000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid TOTP code"));
}

/// Test: whoami with no session reports unauthenticated.
#[tokio::test]
async fn test_whoami_unauthenticated() {
    let temp = tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Command::cargo_bin("foliosync")
        .unwrap()
        .env("FOLIOSYNC_HOME", temp.path())
        .env("FOLIOSYNC_BASE_URL", server.uri())
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not authenticated"));
}
