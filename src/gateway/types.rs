//! Shared types for the gateway client.
//!
//! JSON-RPC 2.0 envelopes, the MCP handshake payloads, and the tool response
//! shapes the gateway returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::GatewayError;

/// MCP protocol revision sent in the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Message used when the gateway reports an error without one.
pub const UNKNOWN_ERROR: &str = "Unknown error";

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// A decoded JSON-RPC response: exactly one of payload or error.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome {
    Success(Value),
    Failure { code: Option<i64>, message: String },
}

impl RpcOutcome {
    /// Classify a decoded response object.
    ///
    /// A truthy `error` member wins over `result`. A missing or null `result`
    /// becomes an empty object.
    pub fn from_response(response: Value) -> Result<Self, GatewayError> {
        let mut obj = match response {
            Value::Object(obj) => obj,
            other => {
                return Err(GatewayError::MalformedResponse {
                    reason: format!("expected a JSON-RPC object, got {}", json_kind(&other)),
                })
            }
        };

        if let Some(error) = obj.get("error").filter(|e| is_truthy(e)) {
            let (code, message) = match error {
                Value::Object(err) => (
                    err.get("code").and_then(Value::as_i64),
                    err.get("message")
                        .and_then(Value::as_str)
                        .unwrap_or(UNKNOWN_ERROR)
                        .to_string(),
                ),
                Value::String(message) => (None, message.clone()),
                _ => (None, UNKNOWN_ERROR.to_string()),
            };
            return Ok(RpcOutcome::Failure { code, message });
        }

        let payload = match obj.remove("result") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(result) => result,
        };
        Ok(RpcOutcome::Success(payload))
    }

    /// Convert into the success payload, or a `RemoteProtocol` error.
    pub fn into_result(self) -> Result<Value, GatewayError> {
        match self {
            RpcOutcome::Success(payload) => Ok(payload),
            RpcOutcome::Failure { code, message } => {
                Err(GatewayError::RemoteProtocol { code, message })
            }
        }
    }
}

/// Whether an `error` member signals a failure. `null`, `{}`, `false`, `0`,
/// `""` and `[]` all mean "no error".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ─── MCP Handshake ───────────────────────────────────────────────────────────

/// Client identity announced during `initialize`.
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Params of the `initialize` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: &'static str,
    pub capabilities: Map<String, Value>,
    pub client_info: ClientInfo,
}

impl InitializeParams {
    pub fn new(client_info: ClientInfo) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            capabilities: Map::new(),
            client_info,
        }
    }

    pub fn into_value(self) -> Value {
        // Strings and an empty map only; serialization cannot fail.
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// MCP initialize response payload. Every field is optional; gateways vary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializeResult {
    #[serde(default, alias = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(default, alias = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// Server info returned in the initialize response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// `tools/list` response payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<AdvertisedTool>,
}

/// One entry of `tools/list`. Only the name is used.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvertisedTool {
    pub name: String,
}

/// Names of the tools the gateway exposes.
pub mod tool_names {
    pub const GET_CATALOGS: &str = "getCatalogs";
    pub const GET_SCHEMAS: &str = "getSchemas";
    pub const GET_TABLES: &str = "getTables";
    pub const GET_COLUMNS: &str = "getColumns";
    pub const QUERY_DATA: &str = "queryData";
}

// ─── Tool Responses ──────────────────────────────────────────────────────────

/// One entry of a tool response's `content` array.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text(String),
    Other(Value),
}

impl ContentItem {
    fn from_value(item: &Value) -> Self {
        if item.get("type").and_then(Value::as_str) == Some("text") {
            let text = item.get("text").and_then(Value::as_str).unwrap_or_default();
            ContentItem::Text(text.to_string())
        } else {
            ContentItem::Other(item.clone())
        }
    }
}

/// The result of a `tools/call`.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
    /// The usual `{content: [...]}` envelope. `raw` is kept for the
    /// stringified fallback when no text item is present.
    Content { items: Vec<ContentItem>, raw: Value },
    /// Anything else the gateway sent back.
    Unstructured(Value),
}

impl ToolResponse {
    pub fn from_result(result: Value) -> Self {
        let items = match result.get("content").and_then(Value::as_array) {
            Some(items) => items.iter().map(ContentItem::from_value).collect(),
            None => return ToolResponse::Unstructured(result),
        };
        ToolResponse::Content { items, raw: result }
    }

    /// Text of the first `text` item. Later items are ignored.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            ToolResponse::Content { items, .. } => items.iter().find_map(|item| match item {
                ContentItem::Text(text) => Some(text.as_str()),
                ContentItem::Other(_) => None,
            }),
            ToolResponse::Unstructured(_) => None,
        }
    }

    /// The response exactly as received.
    pub fn raw(&self) -> &Value {
        match self {
            ToolResponse::Content { raw, .. } => raw,
            ToolResponse::Unstructured(raw) => raw,
        }
    }
}

/// Column metadata of a result set. Position defines the row mapping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnDescriptor {
    #[serde(rename = "columnName")]
    pub column_name: String,
    #[serde(default, rename = "tableName")]
    pub table_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One result set of a `queryData` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub schema: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// Body of a `queryData` text item: `{results: [ResultSet, ...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryPayload {
    #[serde(default)]
    pub results: Vec<ResultSet>,
}

/// One row keyed by column name.
pub type Record = Map<String, Value>;

// ─── Tests ───────────────────────────────────────────────────────────────────
