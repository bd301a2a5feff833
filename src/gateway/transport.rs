//! JSON-RPC over HTTP transport.
//!
//! Handles low-level communication with the gateway:
//! - Building JSON-RPC 2.0 envelopes with per-instance request ids
//! - POSTing them with Basic auth
//! - Decoding responses framed as plain JSON or as `data: ` event lines

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client as HttpClient;
use serde_json::Value;

use super::errors::GatewayError;
use super::types::{JsonRpcRequest, RpcOutcome};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Total request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// TCP connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The gateway may answer with either framing; we accept both.
const ACCEPT_VALUE: &str = "application/json, text/event-stream";

/// Cap on response text copied into error messages.
const ERROR_BODY_LIMIT: usize = 2000;

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Identity + secret pair used for Basic auth.
#[derive(Clone)]
pub struct Credentials {
    identity: String,
    secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// `Basic base64(identity:secret)`.
    pub fn authorization_header(&self) -> String {
        let token = BASE64.encode(format!("{}:{}", self.identity, self.secret));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ─── Transport ───────────────────────────────────────────────────────────────

/// Request/response exchange with the gateway.
///
/// `send` returns the JSON-RPC `result` payload, or the error the gateway
/// reported. Implemented by [`HttpTransport`]; tests substitute a scripted stub.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, method: &str, params: Value) -> Result<Value, GatewayError>;
}

/// JSON-RPC transport over HTTP POST.
pub struct HttpTransport {
    http: HttpClient,
    endpoint: String,
    /// Precomputed `Authorization` header value.
    authorization: String,
    request_timeout: Duration,
    /// Monotonic request id counter, local to this instance.
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Create a transport with the default timeouts.
    pub fn new(endpoint: impl Into<String>, credentials: &Credentials) -> Result<Self, GatewayError> {
        Self::with_timeouts(
            endpoint,
            credentials,
            DEFAULT_REQUEST_TIMEOUT,
            DEFAULT_CONNECT_TIMEOUT,
        )
    }

    pub fn with_timeouts(
        endpoint: impl Into<String>,
        credentials: &Credentials,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint).map_err(|e| GatewayError::Config {
            reason: format!("invalid gateway endpoint '{endpoint}': {e}"),
        })?;

        let http = HttpClient::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Transport {
                endpoint: endpoint.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            endpoint,
            authorization: credentials.authorization_header(),
            request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Number of requests issued so far.
    pub fn requests_sent(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn classify_error(&self, error: reqwest::Error, method: &str) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout {
                method: method.to_string(),
                timeout_secs: self.request_timeout.as_secs(),
            }
        } else {
            GatewayError::Transport {
                endpoint: self.endpoint.clone(),
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id, method, params);

        let body = serde_json::to_vec(&request).map_err(|e| GatewayError::Transport {
            endpoint: self.endpoint.clone(),
            reason: format!("failed to serialize request: {e}"),
        })?;

        let start = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_VALUE)
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify_error(e, method))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(
                id,
                method,
                status = status.as_u16(),
                "gateway returned non-success status"
            );
            return Err(GatewayError::HttpStatus {
                status: status.as_u16(),
                body: truncate(&body_text, ERROR_BODY_LIMIT),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.classify_error(e, method))?;

        tracing::debug!(
            id,
            method,
            bytes = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "gateway response received"
        );

        decode_response(&text).inspect_err(|e| {
            tracing::warn!(id, method, error = %e, "gateway request failed");
        })
    }
}

// ─── Response Decoding ───────────────────────────────────────────────────────

/// Recover the JSON-RPC response object from a body in either framing.
///
/// A single leading `data: ` prefix is stripped from the trimmed body. If any
/// line then starts with `data: `, the last such line is the response;
/// otherwise the whole trimmed body is.
pub fn decode_body(body: &str) -> Result<Value, GatewayError> {
    let mut content = body.trim();
    if let Some(rest) = content.strip_prefix("data: ") {
        content = rest.trim();
    }

    let candidate = content
        .lines()
        .filter_map(sse_data)
        .filter(|data| *data != "[DONE]")
        .last()
        .unwrap_or(content);

    if candidate.is_empty() {
        return Err(GatewayError::MalformedResponse {
            reason: "empty response body".into(),
        });
    }

    let value: Value =
        serde_json::from_str(candidate).map_err(|e| GatewayError::MalformedResponse {
            reason: format!("{e} (body: {})", truncate(candidate, 200)),
        })?;

    if !value.is_object() {
        return Err(GatewayError::MalformedResponse {
            reason: format!("expected a JSON object (body: {})", truncate(candidate, 200)),
        });
    }

    Ok(value)
}

/// Decode a body and unwrap the JSON-RPC outcome into the `result` payload.
pub fn decode_response(body: &str) -> Result<Value, GatewayError> {
    RpcOutcome::from_response(decode_body(body)?)?.into_result()
}

fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))
        .map(str::trim)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...(truncated)", &text[..idx]),
        None => text.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
