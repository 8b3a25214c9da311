//! External actions as MCP `tools/call` requests over HTTP.
//!
//! Each action `foo` becomes the tool `<tool_prefix>foo`; the node's rendered
//! params are the tool arguments. The tool's structured content, or its first
//! text item parsed as a JSON object, becomes the fields merged into workflow
//! variables. `isError` results and JSON-RPC errors are action failures.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use {
    async_trait::async_trait,
    pelangi_config::ActionsConfig,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::{debug, warn},
};

use crate::{actions::ExternalActions, error::ActionError, template::Variables};

const PROTOCOL_VERSION: &str = "2024-11-05";
const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
const ACCEPT_HEADER: &str = "application/json, text/event-stream";

// ── JSON-RPC 2.0 ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: ToolsCallParams<'a>,
}

#[derive(Debug, Serialize)]
struct ToolsCallParams<'a> {
    name: String,
    arguments: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<ToolsCallResult>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ToolContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsCallResult {
    #[serde(default)]
    content: Vec<ToolContent>,
    #[serde(default)]
    structured_content: Option<Value>,
    #[serde(default)]
    is_error: bool,
}

impl ToolsCallResult {
    fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|c| match c {
            ToolContent::Text { text } => Some(text.as_str()),
            ToolContent::Other => None,
        })
    }
}

// ── Client ──────────────────────────────────────────────────────────────────

pub struct McpActionClient {
    client: reqwest::Client,
    url: String,
    tool_prefix: String,
    api_key: Option<Secret<String>>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl McpActionClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            tool_prefix: String::new(),
            api_key: None,
            timeout: Duration::from_secs(10),
            next_id: AtomicU64::new(1),
        }
    }

    /// `None` when no endpoint is configured.
    #[must_use]
    pub fn from_config(config: &ActionsConfig) -> Option<Self> {
        let url = config.endpoint.as_deref().filter(|u| !u.trim().is_empty())?;
        let mut client = Self::new(url)
            .with_tool_prefix(&config.tool_prefix)
            .with_timeout(Duration::from_secs(config.timeout_secs.max(1)));
        client.api_key = config.api_key.clone();
        Some(client)
    }

    #[must_use]
    pub fn with_tool_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tool_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(Secret::new(key.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn tool_name(&self, action: &str) -> String {
        format!("{}{action}", self.tool_prefix)
    }

    async fn post(&self, action: &str, body: &JsonRpcRequest<'_>) -> Result<String, ActionError> {
        let mut req = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .header("Accept", ACCEPT_HEADER)
            .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION)
            .json(body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let resp = req.send().await.map_err(|e| self.transport_error(action, &e))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| self.transport_error(action, &e))?;
        if !status.is_success() {
            return Err(ActionError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            )));
        }
        Ok(text)
    }

    fn transport_error(&self, action: &str, err: &reqwest::Error) -> ActionError {
        if err.is_timeout() {
            ActionError::Timeout {
                action: action.to_string(),
                after_ms: self.timeout.as_millis() as u64,
            }
        } else {
            ActionError::Transport(err.to_string())
        }
    }
}

/// The body is plain JSON, or an event stream whose `data:` lines carry it.
fn parse_response(body: &str) -> Result<JsonRpcResponse, ActionError> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).map_err(|e| ActionError::Malformed(e.to_string()));
    }
    let data: String = body
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("");
    if data.is_empty() {
        return Err(ActionError::Malformed("empty response body".into()));
    }
    serde_json::from_str(&data).map_err(|e| ActionError::Malformed(e.to_string()))
}

fn fields_from(action: &str, mut result: ToolsCallResult) -> Result<Variables, ActionError> {
    if result.is_error {
        let message = result.texts().collect::<Vec<_>>().join("\n");
        return Err(ActionError::failed(action, message));
    }

    if let Some(Value::Object(map)) = result.structured_content.take() {
        return Ok(map.into_iter().collect());
    }

    let Some(text) = result.texts().next() else {
        return Ok(Variables::new());
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        _ => Err(ActionError::Malformed(format!(
            "tool '{action}' did not return a JSON object"
        ))),
    }
}

#[async_trait]
impl ExternalActions for McpActionClient {
    async fn call(
        &self,
        action: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Variables, ActionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: "tools/call",
            params: ToolsCallParams {
                name: self.tool_name(action),
                arguments: params,
            },
        };
        debug!(action, tool = %body.params.name, id, "calling MCP tool");

        let raw = self.post(action, &body).await?;
        let response = parse_response(&raw)?;

        if let Some(err) = response.error {
            warn!(action, code = err.code, message = %err.message, "MCP tool returned an error");
            return Err(ActionError::failed(
                action,
                format!("JSON-RPC {}: {}", err.code, err.message),
            ));
        }
        let result = response
            .result
            .ok_or_else(|| ActionError::Malformed("tools/call returned no result".into()))?;
        fields_from(action, result)
    }
}
