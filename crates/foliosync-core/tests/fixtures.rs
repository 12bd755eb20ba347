//! Shared helpers for core integration tests.
//!
//! Builds a client + token store pair against a wiremock server, with the
//! session file isolated in a temp home.

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use wiremock::MockServer;

use foliosync_core::auth::token::TokenStore;
use foliosync_core::client::ApiClient;

pub struct TestStack {
    pub home: TempDir,
    pub tokens: Arc<TokenStore>,
    pub client: Arc<ApiClient>,
}

/// Creates a stack pointed at the mock server with an empty token store.
pub fn stack(server: &MockServer) -> TestStack {
    let home = TempDir::new().expect("create temp home");
    let tokens = Arc::new(TokenStore::new(home.path().join("session.json")));
    let client =
        Arc::new(ApiClient::new(server.uri(), Arc::clone(&tokens)).expect("build client"));
    TestStack {
        home,
        tokens,
        client,
    }
}
