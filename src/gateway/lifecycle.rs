//! Session lifecycle management.
//!
//! A gateway connection must complete one `initialize` handshake before any
//! tool call. The state lives on the client instance and is never persisted,
//! so every process run performs its own handshake.

use super::errors::GatewayError;
use super::transport::RpcTransport;
use super::types::{ClientInfo, InitializeParams, InitializeResult, ServerInfo};

/// Handshake state of a client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    /// A handshake is in flight. If its future is dropped the state stays
    /// here, and the next call starts a fresh handshake.
    Initializing,
    Ready,
}

/// Tracks the handshake for one logical gateway connection.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    client_info: ClientInfo,
    server_info: Option<ServerInfo>,
}

impl Session {
    pub fn new(client_info: ClientInfo) -> Self {
        Self {
            state: SessionState::Uninitialized,
            client_info,
            server_info: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Server identity reported during the handshake, if any.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Run the `initialize` handshake unless it already succeeded.
    ///
    /// On failure the session returns to `Uninitialized` and the transport
    /// error is handed back as-is. There is no retry here; the next call
    /// simply tries again.
    pub async fn ensure_ready<T>(&mut self, transport: &T) -> Result<(), GatewayError>
    where
        T: RpcTransport + ?Sized,
    {
        if self.state == SessionState::Ready {
            return Ok(());
        }

        let params = InitializeParams::new(self.client_info.clone()).into_value();
        self.state = SessionState::Initializing;

        match transport.send("initialize", params).await {
            Ok(result) => {
                // The handshake succeeded even if the payload is unusual.
                let init: InitializeResult = serde_json::from_value(result).unwrap_or_default();
                tracing::info!(
                    server = init
                        .server_info
                        .as_ref()
                        .and_then(|s| s.name.as_deref())
                        .unwrap_or("unknown"),
                    protocol = init.protocol_version.as_deref().unwrap_or("unspecified"),
                    "gateway session initialized"
                );
                self.server_info = init.server_info;
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "gateway initialize failed");
                self.state = SessionState::Uninitialized;
                Err(e)
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
