//! Login, logout, whoami, and TOTP command handlers.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use foliosync_core::auth::session::{LoginOutcome, SessionManager};
use foliosync_core::auth::stepup::{StepUpController, StepUpOutcome};
use foliosync_core::auth::token::{TokenPurpose, mask_token};

use super::build_stack;

pub async fn login(username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password()?,
    };

    let stack = build_stack()?;
    let session = SessionManager::new(Arc::clone(&stack.client), Arc::clone(&stack.tokens));

    let outcome = session
        .login(username, &password)
        .await
        .context("Login failed")?;

    match outcome {
        LoginOutcome::Authenticated(user) => {
            println!("Logged in as {}", user.username);
        }
        LoginOutcome::StepUpRequired(TokenPurpose::TotpSetup) => {
            println!("Two-factor enrollment is required before a session can start.");
            println!("Run `foliosync totp setup`, add the secret to your authenticator,");
            println!("then `foliosync totp verify <code>`.");
        }
        LoginOutcome::StepUpRequired(_) => {
            println!("Two-factor verification is required before a session can start.");
            println!("Run `foliosync totp verify <code>` with a code from your authenticator.");
        }
    }
    Ok(())
}

pub async fn totp_setup() -> Result<()> {
    let stack = build_stack()?;
    let controller = StepUpController::new(Arc::clone(&stack.client), Arc::clone(&stack.tokens));

    let setup = controller
        .begin_enrollment()
        .await
        .context("TOTP enrollment failed")?;

    println!("Secret:      {}", setup.secret);
    println!("Otpauth URL: {}", setup.otpauth_url);
    println!("Add this to your authenticator, then run `foliosync totp verify <code>`.");
    Ok(())
}

pub async fn totp_verify(code: &str) -> Result<()> {
    let stack = build_stack()?;
    let controller = StepUpController::new(Arc::clone(&stack.client), Arc::clone(&stack.tokens));

    let outcome = controller
        .verify(code)
        .await
        .context("TOTP verification failed")?;

    match outcome {
        StepUpOutcome::ReloginRequired => {
            println!("Verified. The temporary token was cleared; run `foliosync login` to start a session.");
        }
        StepUpOutcome::Enabled => {
            println!("Two-factor authentication enabled.");
        }
    }
    Ok(())
}

pub async fn logout() -> Result<()> {
    let stack = build_stack()?;
    if stack.tokens.get().is_none() {
        println!("Not logged in.");
        return Ok(());
    }

    let session = SessionManager::new(Arc::clone(&stack.client), Arc::clone(&stack.tokens));
    session.logout().await;
    println!("Logged out.");
    Ok(())
}

pub async fn whoami() -> Result<()> {
    let stack = build_stack()?;
    let session = SessionManager::new(Arc::clone(&stack.client), Arc::clone(&stack.tokens));
    session.init().await;

    let state = session.state();
    match state.user {
        Some(user) => {
            println!("{} ({})", user.username, user.id);
            if let Some(token) = stack.tokens.get() {
                println!("Token: {}", mask_token(&token.value));
            }
        }
        None => println!("Not authenticated."),
    }
    Ok(())
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    std::io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
