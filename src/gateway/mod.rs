//! Gateway client for the JSON-RPC data gateway.
//!
//! Talks to a remote gateway that exposes catalog metadata and SQL querying
//! as named tools over JSON-RPC 2.0 on HTTP POST.
//!
//! Architecture:
//! - `transport`: one POST per request, Basic auth, SSE-or-JSON body decoding
//! - `lifecycle`: the once-per-client `initialize` handshake
//! - `client`: typed tool calls (`getCatalogs`, `queryData`, ...)
//! - `extract`: turning loosely typed tool output into text or records
//! - `config`: YAML config with env-var interpolation
//! - `errors`: error types for the above

pub mod client;
pub mod config;
pub mod errors;
pub mod extract;
pub mod lifecycle;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::GatewayClient;
pub use config::{load_gateway_config, parse_gateway_config, GatewayConfig};
pub use errors::GatewayError;
pub use extract::{extract_records, extract_records_with, extract_text, RecordPolicy};
pub use lifecycle::SessionState;
pub use transport::{Credentials, HttpTransport, RpcTransport};
pub use types::{Record, ToolResponse};
