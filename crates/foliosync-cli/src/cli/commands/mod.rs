//! Command handlers.

pub mod auth;
pub mod config;
pub mod status;
pub mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};
use foliosync_core::auth::token::TokenStore;
use foliosync_core::client::ApiClient;
use foliosync_core::config::{Config, paths};

/// The wired-up core components every networked command needs.
pub struct Stack {
    pub config: Config,
    pub client: Arc<ApiClient>,
    pub tokens: Arc<TokenStore>,
}

/// Loads config, re-hydrates the token store, and builds the API client.
pub fn build_stack() -> Result<Stack> {
    let config = Config::load().context("Failed to load configuration")?;
    let base_url = config.effective_base_url()?;
    let tokens = Arc::new(
        TokenStore::load(paths::session_path()).context("Failed to load session state")?,
    );
    let client = Arc::new(ApiClient::new(base_url, Arc::clone(&tokens))?);
    Ok(Stack {
        config,
        client,
        tokens,
    })
}
