//! Gateway client: typed tool invocation.
//!
//! Owns the transport and the session handshake state for one logical
//! connection, and exposes the gateway's tools as typed calls. This is the
//! primary API used by discovery and by the query path.

use serde_json::{json, Value};

use super::config::GatewayConfig;
use super::errors::GatewayError;
use super::extract::{extract_records_with, extract_text, RecordPolicy};
use super::lifecycle::{Session, SessionState};
use super::transport::{Credentials, HttpTransport, RpcTransport};
use super::types::{tool_names, ClientInfo, Record, ServerInfo, ToolResponse, ToolsListResult};

// ─── GatewayClient ───────────────────────────────────────────────────────────

/// Client for one gateway connection.
///
/// Calls take `&mut self`: one logical call sequence per instance. Create a
/// separate client for each concurrent caller.
pub struct GatewayClient<T = HttpTransport> {
    transport: T,
    session: Session,
    /// Skips `getCatalogs` when set.
    fixed_catalog: Option<String>,
    record_policy: RecordPolicy,
}

impl GatewayClient<HttpTransport> {
    /// Build an HTTP-backed client from a validated config.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;

        let credentials = Credentials::new(&config.email, &config.token);
        let transport = HttpTransport::with_timeouts(
            &config.endpoint,
            &credentials,
            config.request_timeout(),
            config.connect_timeout(),
        )?;

        let policy = if config.strict_records {
            RecordPolicy::Strict
        } else {
            RecordPolicy::Lenient
        };

        Ok(Self::with_transport(transport)
            .with_fixed_catalog(config.fixed_catalog().map(str::to_string))
            .with_record_policy(policy))
    }
}

impl<T: RpcTransport> GatewayClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            session: Session::default(),
            fixed_catalog: None,
            record_policy: RecordPolicy::default(),
        }
    }

    pub fn with_fixed_catalog(mut self, catalog: Option<String>) -> Self {
        self.fixed_catalog = catalog;
        self
    }

    pub fn with_record_policy(mut self, policy: RecordPolicy) -> Self {
        self.record_policy = policy;
        self
    }

    pub fn with_client_info(mut self, client_info: ClientInfo) -> Self {
        self.session = Session::new(client_info);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn fixed_catalog(&self) -> Option<&str> {
        self.fixed_catalog.as_deref()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.session.server_info()
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Run the handshake if it has not succeeded yet on this client.
    pub async fn ensure_initialized(&mut self) -> Result<(), GatewayError> {
        self.session.ensure_ready(&self.transport).await
    }

    // ─── Tools ───────────────────────────────────────────────────────────

    /// Names of the tools the gateway advertises. Diagnostic only.
    pub async fn list_tools(&mut self) -> Result<Vec<String>, GatewayError> {
        self.ensure_initialized().await?;

        let result = self.transport.send("tools/list", json!({})).await?;
        let listing: ToolsListResult =
            serde_json::from_value(result).map_err(|e| GatewayError::MalformedResponse {
                reason: format!("unexpected tools/list payload: {e}"),
            })?;

        Ok(listing.tools.into_iter().map(|tool| tool.name).collect())
    }

    /// Invoke a tool by name.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolResponse, GatewayError> {
        self.ensure_initialized().await?;

        tracing::debug!(tool = name, "calling gateway tool");
        let result = self
            .transport
            .send("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;

        Ok(ToolResponse::from_result(result))
    }

    async fn call_tool_text(&mut self, name: &str, arguments: Value) -> Result<String, GatewayError> {
        let response = self.call_tool(name, arguments).await?;
        Ok(extract_text(&response))
    }

    /// List catalogs (data source connections).
    ///
    /// With a fixed catalog configured the gateway is not contacted.
    pub async fn get_catalogs(&mut self) -> Result<String, GatewayError> {
        self.ensure_initialized().await?;

        if let Some(catalog) = &self.fixed_catalog {
            return Ok(format!("Available catalogs:\n- {catalog}"));
        }
        self.call_tool_text(tool_names::GET_CATALOGS, json!({})).await
    }

    pub async fn get_schemas(&mut self, catalog_name: &str) -> Result<String, GatewayError> {
        self.call_tool_text(
            tool_names::GET_SCHEMAS,
            json!({"catalogName": catalog_name}),
        )
        .await
    }

    /// List tables. An empty `schema_name` lists every schema of the catalog.
    pub async fn get_tables(
        &mut self,
        catalog_name: &str,
        schema_name: &str,
    ) -> Result<String, GatewayError> {
        self.call_tool_text(
            tool_names::GET_TABLES,
            json!({"catalogName": catalog_name, "schemaName": schema_name}),
        )
        .await
    }

    pub async fn get_columns(
        &mut self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
    ) -> Result<String, GatewayError> {
        self.call_tool_text(
            tool_names::GET_COLUMNS,
            json!({
                "catalogName": catalog_name,
                "schemaName": schema_name,
                "tableName": table_name,
            }),
        )
        .await
    }

    /// Run a SQL query and return the gateway's text output.
    pub async fn query_data(&mut self, sql_query: &str) -> Result<String, GatewayError> {
        self.call_tool_text(tool_names::QUERY_DATA, json!({"query": sql_query}))
            .await
    }

    /// Run a SQL query and return its first result set as records.
    pub async fn query_records(&mut self, sql_query: &str) -> Result<Vec<Record>, GatewayError> {
        let response = self
            .call_tool(tool_names::QUERY_DATA, json!({"query": sql_query}))
            .await?;
        let records = extract_records_with(&response, self.record_policy)?;
        tracing::debug!(rows = records.len(), "query returned records");
        Ok(records)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{refused, text_result, ScriptedTransport};

    fn client(
        tool: impl Fn(&str, &Value) -> Result<String, GatewayError> + Send + Sync + 'static,
    ) -> GatewayClient<ScriptedTransport> {
        GatewayClient::with_transport(ScriptedTransport::gateway(tool))
    }

    #[tokio::test]
    async fn test_handshake_once_across_tool_calls() {
        let mut client = client(|_, _| Ok("ok".into()));
        assert_eq!(client.session_state(), SessionState::Uninitialized);

        client.get_schemas("AcmeCo").await.unwrap();
        client.get_tables("AcmeCo", "").await.unwrap();
        client.query_data("SELECT 1").await.unwrap();

        assert_eq!(client.session_state(), SessionState::Ready);
        assert_eq!(
            client.transport().methods(),
            vec!["initialize", "tools/call", "tools/call", "tools/call"]
        );
    }

    #[tokio::test]
    async fn test_tool_arguments() {
        let mut client = client(|_, _| Ok(String::new()));
        client.get_catalogs().await.unwrap();
        client.get_schemas("AcmeCo").await.unwrap();
        client.get_tables("AcmeCo", "Salesforce").await.unwrap();
        client
            .get_columns("AcmeCo", "Salesforce", "Account")
            .await
            .unwrap();
        client.query_data("SELECT [Name] FROM [AcmeCo].[Salesforce].[Account]").await.unwrap();

        let calls: Vec<Value> = client
            .transport()
            .calls()
            .into_iter()
            .filter(|(m, _)| m == "tools/call")
            .map(|(_, p)| p)
            .collect();
        assert_eq!(
            calls,
            vec![
                json!({"name": "getCatalogs", "arguments": {}}),
                json!({"name": "getSchemas", "arguments": {"catalogName": "AcmeCo"}}),
                json!({"name": "getTables", "arguments": {"catalogName": "AcmeCo", "schemaName": "Salesforce"}}),
                json!({"name": "getColumns", "arguments": {"catalogName": "AcmeCo", "schemaName": "Salesforce", "tableName": "Account"}}),
                json!({"name": "queryData", "arguments": {"query": "SELECT [Name] FROM [AcmeCo].[Salesforce].[Account]"}}),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_handshake_surfaces_and_is_retried() {
        let transport = ScriptedTransport::failing_first("initialize", 1);
        let mut client = GatewayClient::with_transport(transport);

        let err = client.get_schemas("AcmeCo").await.unwrap_err();
        assert!(err.is_transport_failure());
        assert_eq!(client.session_state(), SessionState::Uninitialized);
        assert_eq!(client.transport().methods(), vec!["initialize"]);

        client.get_schemas("AcmeCo").await.unwrap();
        assert_eq!(
            client.transport().methods(),
            vec!["initialize", "initialize", "tools/call"]
        );
    }

    #[tokio::test]
    async fn test_fixed_catalog_bypasses_get_catalogs() {
        let mut client = client(|name, _| panic!("unexpected tool call {name}"))
            .with_fixed_catalog(Some("NordicEnergy".into()));

        let text = client.get_catalogs().await.unwrap();
        assert_eq!(text, "Available catalogs:\n- NordicEnergy");
        assert!(client.transport().tool_calls().is_empty());
        assert_eq!(client.session_state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_remote_error_message_propagates() {
        let mut client = client(|_, _| {
            Err(GatewayError::RemoteProtocol {
                code: None,
                message: "Table 'Acount' does not exist".into(),
            })
        });
        let err = client.query_data("SELECT * FROM Acount").await.unwrap_err();
        assert_eq!(err.remote_message(), Some("Table 'Acount' does not exist"));
    }

    #[tokio::test]
    async fn test_transport_error_mid_session_propagates() {
        let mut client = client(|name, _| match name {
            "getTables" => Err(refused()),
            _ => Ok("ok".into()),
        });
        client.get_schemas("AcmeCo").await.unwrap();
        let err = client.get_tables("AcmeCo", "").await.unwrap_err();
        assert!(err.is_transport_failure());
        // A tool failure does not undo the handshake.
        assert_eq!(client.session_state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_query_records() {
        let mut client = client(|_, _| {
            Ok(json!({
                "results": [{
                    "schema": [{"columnName": "Id"}, {"columnName": "Name"}],
                    "rows": [["001", "Acme"], ["002", "Globex"]]
                }]
            })
            .to_string())
        });
        let records = client.query_records("SELECT [Id], [Name] FROM t").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["Name"], "Globex");
    }

    #[tokio::test]
    async fn test_query_records_zero_rows_is_empty() {
        let mut client = client(|_, _| {
            Ok(r#"{"results":[{"schema":[{"columnName":"Id"}],"rows":[]}]}"#.into())
        });
        assert!(client.query_records("SELECT [Id] FROM t").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_records_respects_policy() {
        let mut lenient = client(|_, _| Ok("Error: timeout contacting source".into()));
        assert!(lenient.query_records("SELECT 1").await.unwrap().is_empty());

        let mut strict = client(|_, _| Ok("Error: timeout contacting source".into()))
            .with_record_policy(RecordPolicy::Strict);
        let err = strict.query_records("SELECT 1").await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_call_tool_unstructured_result_text_fallback() {
        let transport = ScriptedTransport::new(|method, _| match method {
            "initialize" => Ok(json!({})),
            _ => Ok(json!({"message": "done"})),
        });
        let mut client = GatewayClient::with_transport(transport);
        assert_eq!(client.get_schemas("AcmeCo").await.unwrap(), r#"{"message":"done"}"#);
    }

    #[tokio::test]
    async fn test_list_tools() {
        let mut client = client(|_, _| Ok(String::new()));
        let tools = client.list_tools().await.unwrap();
        assert_eq!(
            tools,
            vec!["getCatalogs", "getSchemas", "getTables", "getColumns", "queryData"]
        );
        assert_eq!(client.transport().methods(), vec!["initialize", "tools/list"]);
    }

    #[tokio::test]
    async fn test_list_tools_malformed_payload() {
        let transport = ScriptedTransport::new(|method, _| match method {
            "tools/list" => Ok(json!({"tools": "none"})),
            _ => Ok(text_result("")),
        });
        let mut client = GatewayClient::with_transport(transport);
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse { .. }));
    }

    #[test]
    fn test_from_config_applies_settings() {
        let mut config = GatewayConfig::new("https://gw.example.com/mcp", "a@b.c", "t");
        config.catalog = Some("AcmeCo".into());
        config.strict_records = true;

        let client = GatewayClient::from_config(&config).unwrap();
        assert_eq!(client.fixed_catalog(), Some("AcmeCo"));
        assert_eq!(client.record_policy, RecordPolicy::Strict);
        assert_eq!(client.transport().endpoint(), "https://gw.example.com/mcp");
        assert_eq!(client.transport().requests_sent(), 0);
    }

    #[test]
    fn test_from_config_rejects_missing_credentials() {
        let config = GatewayConfig::new("https://gw.example.com/mcp", "", "");
        assert!(matches!(
            GatewayClient::from_config(&config),
            Err(GatewayError::Config { .. })
        ));
    }
}
