//! Backend recognition adapter — the remote `/api/recognize` endpoint.
//!
//! [`HttpBackend`] issues one guarded `POST` per call.  The response body is
//! decoded as JSON regardless of status: error responses may carry a
//! server-supplied `message` field which takes precedence over the generic
//! `Request failed (<status>)` line, and an undecodable error body simply
//! falls back to the generic line instead of raising a parse error.
//!
//! The `Authorization: Bearer …` header is attached **only** when a
//! non-empty token is supplied, so unauthenticated deployments and local
//! development backends need no special casing.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::recognition::error::RecognizeError;
use crate::recognition::guard::with_deadline;
use crate::recognition::types::{Engine, Recognition, RecognitionRequest, RuntimeMeta};

/// Path suffix of the recognition endpoint.
const RECOGNIZE_PATH: &str = "/api/recognize";

// ---------------------------------------------------------------------------
// BackendRecognizer trait
// ---------------------------------------------------------------------------

/// Object-safe seam for the remote recognition service.
///
/// The production implementation is [`HttpBackend`]; dispatch tests use
/// scripted doubles behind the same trait.
#[async_trait]
pub trait BackendRecognizer: Send + Sync {
    async fn recognize(&self, request: &RecognitionRequest)
        -> Result<Recognition, RecognizeError>;
}

// Compile-time assertion: Box<dyn BackendRecognizer> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn BackendRecognizer>) {}
};

// ---------------------------------------------------------------------------
// URL building
// ---------------------------------------------------------------------------

/// Join a caller-supplied base URL with an endpoint path.
///
/// Trailing slashes on the base are trimmed and a missing leading slash on
/// the path is added.  A base already ending in `/api` is collapsed with a
/// path starting `/api/`, so a configured base like `https://host/api`
/// still yields `…/api/recognize` rather than `…/api/api/recognize`.
pub fn build_api_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if base.is_empty() {
        return path;
    }
    if base.ends_with("/api") && path.starts_with("/api/") {
        return format!("{base}{}", &path[4..]);
    }
    format!("{base}{path}")
}

// ---------------------------------------------------------------------------
// HttpBackend
// ---------------------------------------------------------------------------

/// Production backend adapter over `reqwest`.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    auth_token: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Build an adapter for `base_url` with an optional bearer token.
    pub fn new(base_url: &str, auth_token: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: build_api_url(base_url, RECOGNIZE_PATH),
            auth_token: auth_token.trim().to_string(),
            timeout,
        }
    }

    /// The fully-resolved recognition endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Build the error for a non-success response.
///
/// The server's own `message` field wins; an absent, empty or undecodable
/// body falls back to the generic status line.  The numeric status is the
/// error code either way.
fn status_error(status: u16, body: &Value) -> RecognizeError {
    let server_message = body["message"].as_str().map(str::trim).unwrap_or("");
    let message = if server_message.is_empty() {
        format!("Request failed ({status})")
    } else {
        server_message.to_string()
    };
    RecognizeError::Http { status, message }
}

#[async_trait]
impl BackendRecognizer for HttpBackend {
    /// One guarded `POST` of `request` to the recognition endpoint.
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<Recognition, RecognizeError> {
        let mut req = self.client.post(&self.endpoint).json(request);
        if !self.auth_token.is_empty() {
            req = req.bearer_auth(&self.auth_token);
        }

        let data = with_deadline("backend recognition", self.timeout, async {
            let response = req.send().await?;
            let status = response.status();

            // Decode regardless of status; error bodies may carry a
            // `message` field and success bodies are the result itself.
            let body: Value = response.json().await.unwrap_or(Value::Null);

            if !status.is_success() {
                return Err(status_error(status.as_u16(), &body));
            }
            Ok(body)
        })
        .await?;

        Ok(Recognition {
            data,
            runtime: RuntimeMeta::for_engine(Engine::Backend),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
