//! Step-up (TOTP) flow controller.
//!
//! A restricted-purpose token in the store means the backend demanded a
//! second factor before granting a session. While the flow is pending, that
//! token authorizes only the TOTP endpoints. Completing a mandatory flow
//! clears the restricted token entirely; the backend issues a full-session
//! token only after the user logs in again.

use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::token::TokenStore;
use crate::client::{ApiClient, ApiError, ApiResult};

/// Where the step-up flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUpPhase {
    /// No step-up in progress.
    Normal,
    /// A restricted token exists; TOTP must be completed before login works.
    PendingMandatory,
    /// Mandatory flow finished; the user must re-authenticate.
    Completed,
}

/// What completing a verification means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUpOutcome {
    /// Mandatory flow: temp token cleared, send the user back to login.
    ReloginRequired,
    /// Voluntary enablement from settings: session untouched.
    Enabled,
}

/// TOTP enrollment material returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct TotpSetup {
    pub secret: String,
    pub otpauth_url: String,
}

/// Drives TOTP enrollment and verification on top of the token store.
pub struct StepUpController {
    client: Arc<ApiClient>,
    tokens: Arc<TokenStore>,
    phase: Mutex<StepUpPhase>,
}

impl StepUpController {
    /// Creates a controller, detecting a pending mandatory flow from the
    /// token store (which re-hydrates restricted tokens from disk).
    pub fn new(client: Arc<ApiClient>, tokens: Arc<TokenStore>) -> Self {
        let pending = tokens.get().is_some_and(|t| t.purpose.is_restricted());
        let phase = if pending {
            StepUpPhase::PendingMandatory
        } else {
            StepUpPhase::Normal
        };
        Self {
            client,
            tokens,
            phase: Mutex::new(phase),
        }
    }

    pub fn phase(&self) -> StepUpPhase {
        *self.phase.lock().expect("step-up phase poisoned")
    }

    /// Requests enrollment material (secret + otpauth URL).
    ///
    /// Requires the current token — restricted while mandatory, full while
    /// enabling voluntarily — to be in the store.
    pub async fn begin_enrollment(&self) -> ApiResult<TotpSetup> {
        self.client
            .post("/auth/totp/setup", &json!({}))
            .await
            .map_err(ApiError::into_auth_invalid)
    }

    /// Submits a TOTP code.
    ///
    /// Mandatory flow: success clears the restricted token (it cannot be
    /// upgraded client-side) and the caller must route back to login.
    /// Voluntary flow: the existing session is left alone.
    pub async fn verify(&self, code: &str) -> ApiResult<StepUpOutcome> {
        self.client
            .post_unit("/auth/totp/verify", &json!({ "code": code }))
            .await
            .map_err(ApiError::into_auth_invalid)?;

        let mandatory = self.phase() == StepUpPhase::PendingMandatory;
        if mandatory {
            self.tokens.clear();
            *self.phase.lock().expect("step-up phase poisoned") = StepUpPhase::Completed;
            info!("mandatory TOTP verified, re-login required");
            Ok(StepUpOutcome::ReloginRequired)
        } else {
            info!("TOTP enabled for current session");
            Ok(StepUpOutcome::Enabled)
        }
    }
}
