//! Session manager: the process-wide auth state with an explicit lifecycle.
//!
//! Consumers construct one `SessionManager`, call `init()` once, and observe
//! `AuthState` through a watch channel. `loading` stays true until the
//! initial identity check settles, so route protection can hold off on
//! redirecting until the state is known (no flash-of-redirect).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::token::{SessionToken, TokenPurpose, TokenStore};
use crate::client::{ApiClient, ApiError, ApiResult};

/// The authenticated user's identity and display attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Observable auth state.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub user: Option<UserIdentity>,
    /// True until the initial identity check completes.
    pub loading: bool,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// What a login attempt resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Full session established.
    Authenticated(UserIdentity),
    /// The backend issued a restricted token; TOTP step-up must complete
    /// (and the user must log in again) before a session exists.
    StepUpRequired(TokenPurpose),
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    purpose: TokenPurpose,
}

/// Owns the auth state and the side-effecting login/logout operations.
pub struct SessionManager {
    client: Arc<ApiClient>,
    tokens: Arc<TokenStore>,
    state_tx: watch::Sender<AuthState>,
}

impl SessionManager {
    pub fn new(client: Arc<ApiClient>, tokens: Arc<TokenStore>) -> Self {
        let (state_tx, _) = watch::channel(AuthState {
            user: None,
            loading: true,
        });
        Self {
            client,
            tokens,
            state_tx,
        }
    }

    /// Subscribes to auth state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Returns a snapshot of the current auth state.
    pub fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// Runs the initial identity check and settles `loading`.
    ///
    /// With no local token, the identity call 401s and the interceptor
    /// attempts a cookie-backed refresh; that is exactly how a completed
    /// session survives a restart. A pending step-up token cannot authorize
    /// general access, so the check is skipped and the state settles
    /// unauthenticated.
    pub async fn init(&self) {
        if self
            .tokens
            .get()
            .is_some_and(|t| t.purpose.is_restricted())
        {
            debug!("step-up in progress, skipping identity check");
            self.settle(None);
            return;
        }

        match self.client.get::<UserIdentity>("/auth/me").await {
            Ok(user) => {
                debug!(user = %user.username, "session restored");
                self.settle(Some(user));
            }
            Err(e) => {
                debug!(error = %e, "no existing session");
                self.settle(None);
            }
        }
    }

    /// Exchanges credentials for a token.
    ///
    /// A `normal-session` purpose completes authentication immediately; a
    /// TOTP purpose parks the restricted token in the store (where it also
    /// persists to the session file) and reports that step-up is required.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<LoginOutcome> {
        let payload = json!({ "username": username, "password": password });
        let response: LoginResponse = self
            .client
            .post("/auth/login", &payload)
            .await
            .map_err(ApiError::into_auth_invalid)?;

        match response.purpose {
            TokenPurpose::LoginComplete => {
                self.tokens
                    .set(SessionToken::new(response.token, TokenPurpose::LoginComplete));
                let user: UserIdentity = match self.client.get("/auth/me").await {
                    Ok(user) => user,
                    Err(e) => {
                        // The token landed but the identity is unknown; roll
                        // the session back so the store and the observable
                        // state agree, and settle loading for watchers.
                        warn!(error = %e, "identity fetch after login failed");
                        self.tokens.clear();
                        self.settle(None);
                        return Err(e);
                    }
                };
                info!(user = %user.username, "login complete");
                self.settle(Some(user.clone()));
                Ok(LoginOutcome::Authenticated(user))
            }
            purpose => {
                // Restricted token: the user is NOT authenticated yet.
                self.tokens.set(SessionToken::new(response.token, purpose));
                info!("login requires TOTP step-up");
                self.settle(None);
                Ok(LoginOutcome::StepUpRequired(purpose))
            }
        }
    }

    /// Ends the session locally and best-effort on the backend.
    pub async fn logout(&self) {
        if let Err(e) = self.client.post_unit("/auth/logout", &json!({})).await {
            debug!(error = %e, "backend logout failed, clearing locally anyway");
        }
        self.tokens.clear();
        self.settle(None);
        info!("logged out");
    }

    fn settle(&self, user: Option<UserIdentity>) {
        self.state_tx.send_modify(|state| {
            state.user = user;
            state.loading = false;
        });
    }
}
