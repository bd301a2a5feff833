//! Scripted in-memory transport for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::errors::GatewayError;
use super::transport::RpcTransport;

type Handler = dyn Fn(&str, &Value) -> Result<Value, GatewayError> + Send + Sync;

/// Answers every request through a closure and records what was sent.
pub(crate) struct ScriptedTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(
        handler: impl Fn(&str, &Value) -> Result<Value, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A gateway whose `tools/call` answers come from `tool`, keyed by tool
    /// name and arguments. `initialize` and `tools/list` always succeed.
    pub(crate) fn gateway(
        tool: impl Fn(&str, &Value) -> Result<String, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(move |method, params| match method {
            "initialize" => Ok(json!({"serverInfo": {"name": "scripted", "version": "1"}})),
            "tools/list" => Ok(json!({"tools": [
                {"name": "getCatalogs"}, {"name": "getSchemas"}, {"name": "getTables"},
                {"name": "getColumns"}, {"name": "queryData"}
            ]})),
            "tools/call" => {
                let name = params["name"].as_str().unwrap_or_default();
                tool(name, &params["arguments"]).map(|text| text_result(&text))
            }
            other => Err(GatewayError::RemoteProtocol {
                code: Some(-32601),
                message: format!("Method not found: {other}"),
            }),
        })
    }

    /// Fails the first `failures` calls of `method` with a transport error;
    /// everything else returns an empty result.
    pub(crate) fn failing_first(method: &'static str, failures: usize) -> Self {
        let seen = AtomicUsize::new(0);
        Self::new(move |m, _| {
            if m == method && seen.fetch_add(1, Ordering::SeqCst) < failures {
                Err(refused())
            } else {
                Ok(json!({}))
            }
        })
    }

    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(method, _)| method).collect()
    }

    /// Names of the tools invoked through `tools/call`, in order.
    pub(crate) fn tool_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(method, _)| method == "tools/call")
            .map(|(_, params)| params["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn send(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));
        (self.handler)(method, &params)
    }
}

/// A `tools/call` result carrying one text item.
pub(crate) fn text_result(text: &str) -> Value {
    json!({"content": [{"type": "text", "text": text}]})
}

pub(crate) fn refused() -> GatewayError {
    GatewayError::Transport {
        endpoint: "http://gateway.test/mcp".into(),
        reason: "connection refused".into(),
    }
}
