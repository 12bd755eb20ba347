//! Configuration management for FolioSync.
//!
//! Loads configuration from ${FOLIOSYNC_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the portfolio backend (no trailing slash).
    pub base_url: String,

    /// Seconds to wait after a portfolio refresh is acknowledged before
    /// treating it as settled. The backend acks before reconciliation
    /// finishes, so reads issued too early can return stale data.
    pub settle_secs: u64,

    /// Broker status polling cadence in seconds.
    pub poll_secs: u64,
}

impl Config {
    const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";
    const DEFAULT_SETTLE_SECS: u64 = 2;
    const DEFAULT_POLL_SECS: u64 = 60;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes a commented default config file at `path`.
    ///
    /// Fails if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config already exists at {}", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Resolves the effective base URL with precedence: env > config.
    pub fn effective_base_url(&self) -> Result<String> {
        resolve_base_url(&self.base_url)
    }

    /// Returns the refresh settling delay as a `Duration`.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    /// Returns the broker status polling interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            settle_secs: Self::DEFAULT_SETTLE_SECS,
            poll_secs: Self::DEFAULT_POLL_SECS,
        }
    }
}

/// Resolves the backend base URL with precedence: env > config.
///
/// Trailing slashes are trimmed so request paths can always start with `/`.
pub fn resolve_base_url(config_base_url: &str) -> Result<String> {
    if let Ok(env_url) = std::env::var("FOLIOSYNC_BASE_URL") {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    let trimmed = config_base_url.trim();
    validate_url(trimmed)?;
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Validates that a URL is well-formed.
fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid backend base URL: {url}"))?;
    Ok(())
}

fn default_config_template() -> &'static str {
    r#"# FolioSync configuration

# Base URL of the portfolio backend (no trailing slash).
# Can be overridden with the FOLIOSYNC_BASE_URL environment variable.
base_url = "http://127.0.0.1:8000/api/v1"

# Seconds to wait after a portfolio refresh is acknowledged before
# invalidating cached views. The backend acks before reconciliation
# finishes.
settle_secs = 2

# Broker status polling cadence in seconds.
poll_secs = 60
"#
}

pub mod paths {
    //! Path resolution for FolioSync configuration and session data.
    //!
    //! FOLIOSYNC_HOME resolution order:
    //! 1. FOLIOSYNC_HOME environment variable (if set)
    //! 2. ~/.config/foliosync (default)

    use std::path::PathBuf;

    /// Returns the FolioSync home directory.
    ///
    /// Checks FOLIOSYNC_HOME env var first, falls back to ~/.config/foliosync
    pub fn foliosync_home() -> PathBuf {
        if let Ok(home) = std::env::var("FOLIOSYNC_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("foliosync"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        foliosync_home().join("config.toml")
    }

    /// Returns the path to the session-scoped token file.
    pub fn session_path() -> PathBuf {
        foliosync_home().join("session.json")
    }
}
