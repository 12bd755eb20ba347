//! Session lifecycle: token storage, auth state, and step-up (TOTP) flow.

pub mod session;
pub mod stepup;
pub mod token;

pub use session::{AuthState, LoginOutcome, SessionManager, UserIdentity};
pub use stepup::{StepUpController, StepUpOutcome, StepUpPhase, TotpSetup};
pub use token::{SessionToken, TokenPurpose, TokenStore, mask_token};
