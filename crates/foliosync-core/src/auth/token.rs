//! Session token storage.
//!
//! Holds the current bearer token in memory and mirrors restricted-purpose
//! (step-up) tokens to `<home>/session.json` with restricted permissions
//! (0600), so an interrupted TOTP flow survives a process restart. Completed
//! sessions are never written to disk; their durability comes from the
//! backend-held refresh cookie. Tokens are never logged in full.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Purpose tag the backend assigns to a token at issuance.
///
/// The client never inspects token contents; the purpose is the only
/// metadata it tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPurpose {
    /// Fully authorized session.
    #[serde(rename = "normal-session")]
    LoginComplete,
    /// Restricted token, only valid for TOTP enrollment.
    #[serde(rename = "totp-setup-required")]
    TotpSetup,
    /// Restricted token, only valid for TOTP verification.
    #[serde(rename = "totp-login-required")]
    TotpLogin,
}

impl TokenPurpose {
    /// Returns true for step-up tokens that cannot authorize general access.
    pub fn is_restricted(self) -> bool {
        !matches!(self, TokenPurpose::LoginComplete)
    }
}

/// An opaque bearer credential plus its backend-assigned purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub value: String,
    pub purpose: TokenPurpose,
}

impl SessionToken {
    pub fn new(value: impl Into<String>, purpose: TokenPurpose) -> Self {
        Self {
            value: value.into(),
            purpose,
        }
    }
}

/// Returns a masked version of a token for display (first 8 chars + ...).
///
/// Tokens are opaque and may contain multi-byte characters, so the prefix
/// is taken per char, never by byte offset.
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 12 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}...")
}

struct Inner {
    token: Option<SessionToken>,
    /// Bumped on every set/clear so in-flight requests can tell whether the
    /// token they failed with has already been replaced.
    generation: u64,
}

/// Single mutable slot holding the current session token.
///
/// Reads are synchronous (std mutex, no suspension) so the HTTP client can
/// consult it on every outbound call. There is exactly one slot: setting a
/// restricted step-up token replaces any full-session token and vice versa,
/// which is what keeps the two from coexisting.
pub struct TokenStore {
    inner: Mutex<Inner>,
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store backed by `path`, re-hydrating a pending step-up
    /// token from disk when present.
    pub fn load(path: PathBuf) -> Result<Self> {
        let token = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read session file {}", path.display()))?;
            let token: SessionToken = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse session file {}", path.display()))?;
            debug!("re-hydrated pending step-up token from session file");
            Some(token)
        } else {
            None
        };

        Ok(Self {
            inner: Mutex::new(Inner {
                token,
                generation: 0,
            }),
            path,
        })
    }

    /// Creates an in-memory store whose session file lives under `path`
    /// but without reading anything from disk.
    pub fn new(path: PathBuf) -> Self {
        Self {
            inner: Mutex::new(Inner {
                token: None,
                generation: 0,
            }),
            path,
        }
    }

    /// Returns a copy of the current token, if any.
    pub fn get(&self) -> Option<SessionToken> {
        self.inner.lock().expect("token store poisoned").token.clone()
    }

    /// Returns the current store generation.
    pub fn generation(&self) -> u64 {
        self.inner.lock().expect("token store poisoned").generation
    }

    /// Replaces the current token.
    ///
    /// Restricted tokens are mirrored to the session file; a full-session
    /// token removes any persisted step-up token. File I/O failures are
    /// logged, never fatal: the in-memory slot is always updated.
    pub fn set(&self, token: SessionToken) {
        let restricted = token.purpose.is_restricted();
        let persisted = token.clone();
        {
            let mut inner = self.inner.lock().expect("token store poisoned");
            inner.token = Some(token);
            inner.generation += 1;
        }

        let result = if restricted {
            self.write_session_file(&persisted)
        } else {
            self.remove_session_file()
        };
        if let Err(e) = result {
            warn!(error = %format!("{e:#}"), "session file update failed");
        }
    }

    /// Clears the token slot and removes any persisted step-up token.
    pub fn clear(&self) {
        {
            let mut inner = self.inner.lock().expect("token store poisoned");
            inner.token = None;
            inner.generation += 1;
        }
        if let Err(e) = self.remove_session_file() {
            warn!(error = %format!("{e:#}"), "session file removal failed");
        }
    }

    fn write_session_file(&self, token: &SessionToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(token).context("Failed to serialize session token")?;

        // Write with restricted permissions
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        Ok(())
    }

    fn remove_session_file(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}
