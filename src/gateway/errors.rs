//! Gateway client error types.

use thiserror::Error;

/// Errors that can occur while talking to the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The HTTP exchange failed before a response arrived (DNS, TCP, TLS, body read).
    #[error("transport error for {endpoint}: {reason}")]
    Transport {
        endpoint: String,
        reason: String,
    },

    /// The gateway did not answer within the configured request timeout.
    #[error("'{method}' timed out after {timeout_secs}s")]
    Timeout {
        method: String,
        timeout_secs: u64,
    },

    /// Non-2xx HTTP response from the gateway.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: u16,
        body: String,
    },

    /// No JSON object could be recovered from the response body, or a
    /// decoded payload did not have the expected shape.
    #[error("malformed gateway response: {reason}")]
    MalformedResponse {
        reason: String,
    },

    /// The decoded JSON-RPC response carried an `error` object.
    #[error("gateway error: {message}")]
    RemoteProtocol {
        code: Option<i64>,
        message: String,
    },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    Config {
        reason: String,
    },
}

impl GatewayError {
    /// Whether this error came from the HTTP layer rather than from the
    /// content of a response.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport { .. }
                | GatewayError::Timeout { .. }
                | GatewayError::HttpStatus { .. }
        )
    }

    /// The remote `message`, if the gateway itself reported the failure.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            GatewayError::RemoteProtocol { message, .. } => Some(message),
            _ => None,
        }
    }
}
