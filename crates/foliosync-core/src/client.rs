//! HTTP client with the one-shot refresh interceptor.
//!
//! Every outbound call is decorated with the current bearer token. On a 401
//! the client refreshes the session once (the refresh credential rides on
//! the cookie jar, managed by the backend) and replays the original request
//! exactly once. Concurrent 401s collapse into a single in-flight refresh.

use std::fmt;
use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::token::{SessionToken, TokenPurpose, TokenStore};

/// Categories of API errors for consistent handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Session expired and could not be refreshed.
    AuthExpired,
    /// Credentials or TOTP code rejected by the backend.
    AuthInvalid,
    /// Other HTTP status error (4xx, 5xx).
    HttpStatus,
    /// Transport-level failure (connect, timeout, TLS).
    Network,
    /// Failed to parse a response body.
    Parse,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::AuthExpired => write!(f, "auth_expired"),
            ApiErrorKind::AuthInvalid => write!(f, "auth_invalid"),
            ApiErrorKind::HttpStatus => write!(f, "http_status"),
            ApiErrorKind::Network => write!(f, "network"),
            ApiErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// Structured error from the backend with kind and details.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Error category
    pub kind: ApiErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, lifting a human-readable message out of
    /// the backend payload when one is present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let kind = if status == 401 {
            ApiErrorKind::AuthExpired
        } else {
            ApiErrorKind::HttpStatus
        };
        match extract_backend_message(body) {
            Some(msg) => Self {
                kind,
                message: msg,
                details: Some(body.to_string()),
            },
            None => Self {
                kind,
                message: format!("HTTP {status}"),
                details: (!body.is_empty()).then(|| body.to_string()),
            },
        }
    }

    /// Creates a transport error.
    pub fn network(err: &reqwest::Error) -> Self {
        Self::new(ApiErrorKind::Network, format!("request failed: {err}"))
    }

    /// Creates a parse error.
    pub fn parse(err: &reqwest::Error) -> Self {
        Self::new(ApiErrorKind::Parse, format!("invalid response body: {err}"))
    }

    /// Reclassifies an auth-shaped rejection as invalid credentials.
    ///
    /// Used by login/TOTP callers, where a 4xx means "the user got it
    /// wrong", not "the session expired".
    pub fn into_auth_invalid(mut self) -> Self {
        if matches!(self.kind, ApiErrorKind::AuthExpired | ApiErrorKind::HttpStatus) {
            self.kind = ApiErrorKind::AuthInvalid;
        }
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for backend operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Pulls `error.message` (or top-level `message`) out of an error payload.
fn extract_backend_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    if let Some(error_obj) = json.get("error")
        && let Some(msg) = error_obj.get("message").and_then(|v| v.as_str())
    {
        return Some(msg.to_string());
    }
    json.get("message")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

/// One originating request plus its retry state.
///
/// The retried flag lives here, not on any shared state, so the
/// refresh-and-replay cycle can run at most once per originating request.
struct PendingRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    retried: bool,
}

/// Backend client shared by every component.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenStore>,
    /// Serializes refresh attempts so concurrent 401s produce one refresh
    /// call (single-flight).
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ApiClient {
    /// Creates a client against `base_url` (no trailing slash).
    ///
    /// The cookie store is enabled so the backend-managed refresh credential
    /// is carried implicitly; the client never reads or stores it.
    pub fn new(base_url: impl Into<String>, tokens: Arc<TokenStore>) -> anyhow::Result<Self> {
        use anyhow::Context as _;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            tokens,
            refresh_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Issues a GET and decodes the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send(Method::GET, path, None).await?;
        response.json().await.map_err(|e| ApiError::parse(&e))
    }

    /// Issues a POST with a JSON body and decodes the JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ApiResult<T> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::new(ApiErrorKind::Parse, format!("invalid request body: {e}")))?;
        let response = self.send(Method::POST, path, Some(body)).await?;
        response.json().await.map_err(|e| ApiError::parse(&e))
    }

    /// Issues a POST and discards the response body (202-style acks and
    /// endpoints that return nothing usable).
    pub async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> ApiResult<()> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::new(ApiErrorKind::Parse, format!("invalid request body: {e}")))?;
        self.send(Method::POST, path, Some(body)).await?;
        Ok(())
    }

    /// Sends one request through the refresh interceptor.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<reqwest::Response> {
        let mut pending = PendingRequest {
            method,
            path: path.to_string(),
            body,
            retried: false,
        };

        // Generation at send time; if it has moved by the time we see a 401,
        // someone else already rotated the token and no refresh is needed.
        let sent_generation = self.tokens.generation();
        let response = self.execute(&pending).await?;
        if response.status() != StatusCode::UNAUTHORIZED || pending.retried {
            return check_status(response).await;
        }

        pending.retried = true;
        let original_body = response.text().await.unwrap_or_default();
        if self.refresh_session(sent_generation).await.is_err() {
            // Refresh failed: surface the original rejection, message intact.
            return Err(ApiError::http_status(StatusCode::UNAUTHORIZED.as_u16(), &original_body));
        }
        debug!(path = %pending.path, "replaying request after session refresh");
        let replayed = self.execute(&pending).await?;
        // A second 401 here propagates as AuthExpired; retried is already
        // set, so no further refresh is possible.
        check_status(replayed).await
    }

    /// Executes a request once with the current bearer token attached.
    async fn execute(&self, pending: &PendingRequest) -> ApiResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, pending.path);
        let mut builder = self.http.request(pending.method.clone(), &url);
        if let Some(token) = self.tokens.get() {
            builder = builder.bearer_auth(&token.value);
        }
        if let Some(body) = &pending.body {
            builder = builder.json(body);
        }
        builder.send().await.map_err(|e| ApiError::network(&e))
    }

    /// Refreshes the session token, collapsing concurrent attempts.
    ///
    /// The refresh call goes straight through the plain HTTP client so it
    /// can never re-enter the interceptor.
    async fn refresh_session(&self, failed_generation: u64) -> ApiResult<()> {
        let _flight = self.refresh_gate.lock().await;
        if self.tokens.generation() != failed_generation {
            debug!("session already refreshed by a concurrent request");
            return Ok(());
        }

        let url = format!("{}/auth/refresh", self.base_url);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| ApiError::network(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "session refresh rejected");
            let mut err = ApiError::http_status(status.as_u16(), &body);
            err.kind = ApiErrorKind::AuthExpired;
            return Err(err);
        }

        let payload: RefreshResponse = response.json().await.map_err(|e| ApiError::parse(&e))?;
        self.tokens
            .set(SessionToken::new(payload.token, TokenPurpose::LoginComplete));
        debug!("session token refreshed");
        Ok(())
    }
}

/// Maps non-success statuses to errors, consuming the body for messages.
async fn check_status(response: reqwest::Response) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::http_status(status.as_u16(), &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: backend messages are lifted out of both error payload shapes.
    #[test]
    fn test_extract_backend_message() {
        assert_eq!(
            extract_backend_message(r#"{"error":{"message":"bad credentials"}}"#).as_deref(),
            Some("bad credentials")
        );
        assert_eq!(
            extract_backend_message(r#"{"message":"broker offline"}"#).as_deref(),
            Some("broker offline")
        );
        assert_eq!(extract_backend_message("not json"), None);
        assert_eq!(extract_backend_message(r#"{"detail":"nope"}"#), None);
    }

    /// Test: 401 maps to AuthExpired, other statuses to HttpStatus.
    #[test]
    fn test_http_status_kinds() {
        let expired = ApiError::http_status(401, "");
        assert_eq!(expired.kind, ApiErrorKind::AuthExpired);

        let server = ApiError::http_status(500, r#"{"message":"boom"}"#);
        assert_eq!(server.kind, ApiErrorKind::HttpStatus);
        assert_eq!(server.message, "boom");
        assert!(server.details.is_some());
    }

    /// Test: into_auth_invalid reclassifies rejections but not transport errors.
    #[test]
    fn test_into_auth_invalid() {
        let rejected = ApiError::http_status(401, "").into_auth_invalid();
        assert_eq!(rejected.kind, ApiErrorKind::AuthInvalid);

        let network = ApiError::new(ApiErrorKind::Network, "timed out").into_auth_invalid();
        assert_eq!(network.kind, ApiErrorKind::Network);
    }
}
