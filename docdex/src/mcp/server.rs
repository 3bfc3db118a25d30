//! MCP server implementation
//!
//! Implements the stdio transport for the Model Context Protocol. Input
//! lines are read on the runtime and each request is handled on the
//! blocking pool, so a slow refresh never stalls concurrent searches.

use super::answer::Answerer;
use super::prompts::{get_prompt, get_prompt_definitions};
use super::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ResourceContents, ResourceDefinition,
    ServerCapabilities, ServerInfo, MCP_PROTOCOL_VERSION,
};
use super::tools::{get_tool_definitions, handle_tool_call, ToolCall};
use crate::service::DocService;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// URI scheme under which documents are exposed as resources
pub const RESOURCE_SCHEME: &str = "docs://";

/// MCP server for docdex
///
/// Cheap to clone; clones share the same service and answerer.
#[derive(Clone)]
pub struct McpServer {
    service: Arc<DocService>,
    answerer: Option<Arc<dyn Answerer>>,
}

impl McpServer {
    /// Create a server without an answer generator
    pub fn new(service: Arc<DocService>) -> Self {
        Self {
            service,
            answerer: None,
        }
    }

    /// Use `answerer` for `ask_docs`
    pub fn with_answerer(mut self, answerer: Arc<dyn Answerer>) -> Self {
        self.answerer = Some(answerer);
        self
    }

    pub fn service(&self) -> &DocService {
        &self.service
    }

    /// Run the MCP server on stdio until EOF
    pub async fn run(&self) -> crate::Result<()> {
        tracing::info!("docdex MCP server started (protocol version {})", MCP_PROTOCOL_VERSION);
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
        tracing::info!("EOF received, shutting down");
        Ok(())
    }

    /// Serve line-delimited JSON-RPC from `reader`, writing responses to `writer`
    ///
    /// Responses are written in completion order. Lines that are not valid
    /// UTF-8 get a parse error and the session continues. Requests still in
    /// flight at EOF or on a read error are finished and answered before
    /// returning.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> crate::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut tasks = JoinSet::new();
        // Survives select! cancellation; read_until appends partial reads here
        let mut buf = Vec::new();

        loop {
            tokio::select! {
                Some(response) = rx.recv() => {
                    write_line(&mut writer, &response).await?;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(joined);
                }
                read = reader.read_until(b'\n', &mut buf) => {
                    let eof = match read {
                        Ok(n) => n == 0,
                        Err(e) => {
                            tracing::error!("Read error: {}", e);
                            true
                        }
                    };
                    let bytes = std::mem::take(&mut buf);
                    if !bytes.iter().all(u8::is_ascii_whitespace) {
                        let server = self.clone();
                        let tx = tx.clone();
                        tasks.spawn_blocking(move || {
                            if let Some(response) = server.handle_bytes(&bytes) {
                                let _ = tx.send(response);
                            }
                        });
                    }
                    if eof {
                        break;
                    }
                }
            }
        }

        drop(tx);
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        while let Some(response) = rx.recv().await {
            write_line(&mut writer, &response).await?;
        }

        Ok(())
    }

    /// Handle one raw input line as read off the wire
    pub fn handle_bytes(&self, bytes: &[u8]) -> Option<String> {
        match std::str::from_utf8(bytes) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    return None;
                }
                tracing::debug!("Received: {}", line);
                self.handle_line(line)
            }
            Err(e) => encode(JsonRpcResponse::error(
                Value::Null,
                JsonRpcError::parse_error(format!("Parse error: input is not valid UTF-8: {}", e)),
            )),
        }
    }

    /// Handle one raw input line; `None` when no response is due
    pub fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => Some(JsonRpcResponse::error(
                Value::Null,
                JsonRpcError::parse_error(format!("Parse error: {}", e)),
            )),
            Ok(value) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<JsonRpcRequest>(value) {
                    Ok(request) => self.handle_request(request),
                    Err(e) => Some(JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_request(format!("Invalid request: {}", e)),
                    )),
                }
            }
        }?;

        encode(response)
    }

    /// Handle a single JSON-RPC request
    ///
    /// Notifications are processed but never answered.
    pub fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!("Notification: {}", request.method);
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!(
                    "Unsupported jsonrpc version: {:?}",
                    request.jsonrpc
                )),
            ));
        }

        let params = request.params.unwrap_or(Value::Null);
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&params),
            "resources/list" => self.handle_resources_list(),
            "resources/read" => self.handle_resources_read(&params),
            "prompts/list" => Ok(json!({ "prompts": get_prompt_definitions() })),
            "prompts/get" => self.handle_prompts_get(&params),
            method => Err(JsonRpcError::method_not_found(method)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => {
                tracing::debug!("{} failed: {}", request.method, error);
                JsonRpcResponse::error(id, error)
            }
        })
    }

    fn handle_initialize(&self) -> Result<Value, JsonRpcError> {
        Ok(json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default()
        }))
    }

    fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        Ok(json!({ "tools": get_tool_definitions() }))
    }

    fn handle_tools_call(&self, params: &Value) -> Result<Value, JsonRpcError> {
        let tool_name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool name"))?;

        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        let call = ToolCall::parse(tool_name, &arguments)?;
        tracing::debug!("Calling tool {}", call.name());

        let result = handle_tool_call(&self.service, self.answerer.as_deref(), call)?;
        serde_json::to_value(result).map_err(|e| JsonRpcError::server_error(e.to_string()))
    }

    fn handle_resources_list(&self) -> Result<Value, JsonRpcError> {
        let resources: Vec<ResourceDefinition> = self
            .service
            .list_docs(None)
            .into_iter()
            .map(|doc| ResourceDefinition {
                uri: format!("{}{}", RESOURCE_SCHEME, doc.path),
                mime_type: mime_type(&doc.path).to_string(),
                description: Some(format!("Documentation file: {}", doc.path)),
                name: doc.title,
            })
            .collect();
        Ok(json!({ "resources": resources }))
    }

    fn handle_resources_read(&self, params: &Value) -> Result<Value, JsonRpcError> {
        let uri = params
            .get("uri")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JsonRpcError::invalid_params("Missing uri"))?;

        let path = uri
            .strip_prefix(RESOURCE_SCHEME)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("Unsupported resource URI: {}", uri)))?;

        let doc = self.service.get_doc(path)?;
        let contents = ResourceContents {
            uri: uri.to_string(),
            mime_type: mime_type(&doc.path).to_string(),
            text: doc.content.clone(),
        };
        Ok(json!({ "contents": [contents] }))
    }

    fn handle_prompts_get(&self, params: &Value) -> Result<Value, JsonRpcError> {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JsonRpcError::invalid_params("Missing prompt name"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let messages = get_prompt(name, &arguments)?;
        Ok(json!({ "messages": messages }))
    }
}

fn encode(response: JsonRpcResponse) -> Option<String> {
    match serde_json::to_string(&response) {
        Ok(json) => {
            tracing::debug!("Sent: {}", json);
            Some(json)
        }
        Err(e) => {
            tracing::error!("Failed to serialize response: {}", e);
            None
        }
    }
}

fn mime_type(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    if lower.ends_with(".md") || lower.ends_with(".markdown") {
        "text/markdown"
    } else {
        "text/plain"
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> crate::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Request handler failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_server() -> (McpServer, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("intro.md"), "# Introduction\n\nHandoff basics.").unwrap();
        fs::write(dir.path().join("notes.txt"), "plain notes").unwrap();
        let service = DocService::open_dir(dir.path()).unwrap();
        (McpServer::new(Arc::new(service)), dir)
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    #[test]
    fn test_initialize_response() {
        let (server, _dir) = create_test_server();
        let result = server.handle_initialize().unwrap();

        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert!(result["capabilities"]["tools"].is_object());
        assert_eq!(result["serverInfo"]["name"], "docdex");
    }

    #[test]
    fn test_tools_list() {
        let (server, _dir) = create_test_server();
        let result = server.handle_tools_list().unwrap();

        let names: Vec<&str> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"search_docs"));
        assert!(names.contains(&"ask_docs"));
    }

    #[test]
    fn test_tools_call_search() {
        let (server, _dir) = create_test_server();
        let response = server
            .handle_request(request(1, "tools/call", json!({"name": "search_docs", "arguments": {"query": "handoff"}})))
            .unwrap();

        let text = response.result.unwrap()["content"][0]["text"].as_str().unwrap().to_string();
        let hits: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(hits[0]["path"], "intro.md");
    }

    #[test]
    fn test_tools_call_errors() {
        let (server, _dir) = create_test_server();

        let response = server.handle_request(request(1, "tools/call", json!({"arguments": {}}))).unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::INVALID_PARAMS);

        let response = server
            .handle_request(request(2, "tools/call", json!({"name": "search_docs", "arguments": {"query": "x", "max_results": 0}})))
            .unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::INVALID_PARAMS);

        let response = server
            .handle_request(request(3, "tools/call", json!({"name": "get_doc", "arguments": {"path": "missing.md"}})))
            .unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::NOT_FOUND);
    }

    #[test]
    fn test_unknown_method() {
        let (server, _dir) = create_test_server();
        let response = server.handle_request(request(1, "unknown/method", Value::Null)).unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_notification_gets_no_response() {
        let (server, _dir) = create_test_server();
        let line = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(server.handle_line(line).is_none());
    }

    #[test]
    fn test_malformed_lines() {
        let (server, _dir) = create_test_server();

        let response: Value = serde_json::from_str(&server.handle_line("{not json").unwrap()).unwrap();
        assert_eq!(response["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(response["id"], Value::Null);

        let response: Value = serde_json::from_str(&server.handle_line(r#"{"jsonrpc":"2.0","id":4}"#).unwrap()).unwrap();
        assert_eq!(response["error"]["code"], JsonRpcError::INVALID_REQUEST);
        assert_eq!(response["id"], 4);

        let response: Value =
            serde_json::from_str(&server.handle_line(r#"{"jsonrpc":"1.0","id":5,"method":"ping"}"#).unwrap()).unwrap();
        assert_eq!(response["error"]["code"], JsonRpcError::INVALID_REQUEST);
    }

    #[test]
    fn test_resources() {
        let (server, _dir) = create_test_server();

        let listed = server.handle_resources_list().unwrap();
        assert_eq!(listed["resources"][0]["uri"], "docs://intro.md");
        assert_eq!(listed["resources"][0]["name"], "Introduction");
        assert_eq!(listed["resources"][0]["mimeType"], "text/markdown");
        assert_eq!(listed["resources"][1]["mimeType"], "text/plain");

        let read = server.handle_resources_read(&json!({"uri": "docs://notes.txt"})).unwrap();
        assert_eq!(read["contents"][0]["text"], "plain notes");

        let err = server.handle_resources_read(&json!({"uri": "docs://gone.md"})).unwrap_err();
        assert_eq!(err.code, JsonRpcError::NOT_FOUND);

        let err = server.handle_resources_read(&json!({"uri": "file:///etc/passwd"})).unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);
    }

    #[test]
    fn test_prompts() {
        let (server, _dir) = create_test_server();
        let response = server
            .handle_request(request(
                1,
                "prompts/get",
                json!({"name": "documentation_query", "arguments": {"topic": "agents", "detail_level": "comprehensive"}}),
            ))
            .unwrap();
        let result = response.result.unwrap();
        assert!(result["messages"][0]["content"]["text"]
            .as_str()
            .unwrap()
            .starts_with("Provide a comprehensive explanation of agents"));
    }

    #[tokio::test]
    async fn test_serve_answers_every_request() {
        let (server, _dir) = create_test_server();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n",
        );

        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();

        let mut ids: Vec<i64> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["id"].as_i64().unwrap())
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_serve_survives_invalid_utf8() {
        let (server, _dir) = create_test_server();
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        input.extend_from_slice(b"\n\xff\xfe\n");
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);

        let mut output = Vec::new();
        server.serve(input.as_slice(), &mut output).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);

        let mut ids: Vec<i64> = responses.iter().filter_map(|r| r["id"].as_i64()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);

        let rejected = responses.iter().find(|r| r["id"].is_null()).unwrap();
        assert_eq!(rejected["error"]["code"], JsonRpcError::PARSE_ERROR);
    }

    #[test]
    fn test_handle_bytes() {
        let (server, _dir) = create_test_server();
        assert!(server.handle_bytes(b"  \r\n").is_none());

        let response: Value = serde_json::from_str(&server.handle_bytes(b"\xc3\x28\n").unwrap()).unwrap();
        assert_eq!(response["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert!(response["error"]["message"].as_str().unwrap().contains("UTF-8"));

        let pong = server.handle_bytes(br#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        assert!(pong.contains("\"id\":7"));
    }
}
