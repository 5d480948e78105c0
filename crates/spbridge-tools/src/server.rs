use crate::protocol::{
    initialize_result, tool_failure, tool_success, CallToolParams, JsonRpcRequest,
    JsonRpcResponse, RpcError, PROTOCOL_VERSION,
};
use crate::registry::{ToolError, ToolRegistry};
use serde::Serialize;
use serde_json::{json, Value};
use spbridge_core::{BridgeError, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

type RpcResult = std::result::Result<Value, RpcError>;

/// MCP server speaking newline-delimited JSON-RPC.
///
/// Each incoming request runs on its own task; responses are funnelled
/// through one writer so lines never interleave.
#[derive(Debug, Clone)]
pub struct McpServer {
    name: String,
    version: String,
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            registry: Arc::new(registry),
        }
    }

    pub async fn run_stdio(&self) -> Result<()> {
        tracing::info!(server = %self.name, tools = self.registry.len(), "serving MCP on stdio");
        self.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serves requests from `reader` until EOF, then waits for in-flight
    /// requests to finish writing. A read error stops intake but responses
    /// already queued are still written before it is returned.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let read_loop = async move {
            let mut reader = reader;
            loop {
                let mut line = Vec::new();
                if reader.read_until(b'\n', &mut line).await? == 0 {
                    break;
                }
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }

                let server = self.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(response) = server.handle_bytes(line).await {
                        if tx.send(response).is_err() {
                            tracing::warn!("response dropped; writer has stopped");
                        }
                    }
                });
            }
            tracing::debug!("stdin closed");
            Ok::<_, BridgeError>(())
        };

        let write_loop = async {
            while let Some(response) = rx.recv().await {
                let mut line = serde_json::to_vec(&response)?;
                line.push(b'\n');
                writer.write_all(&line).await?;
                writer.flush().await?;
            }
            Ok::<_, BridgeError>(())
        };

        let (read, write) = tokio::join!(read_loop, write_loop);
        if let Err(err) = &read {
            tracing::error!(error = %err, "failed to read from client");
        }
        write?;
        read
    }

    /// Handles one raw line. Bytes that are not UTF-8 get a parse error
    /// reply like any other malformed line.
    pub async fn handle_bytes(&self, bytes: Vec<u8>) -> Option<JsonRpcResponse> {
        match String::from_utf8(bytes) {
            Ok(line) => self.handle_line(&line).await,
            Err(err) => {
                let err = BridgeError::Protocol(format!(
                    "message is not valid UTF-8: {}",
                    err.utf8_error()
                ));
                tracing::warn!(error = %err, "unparseable message");
                Some(parse_error(err))
            }
        }
    }

    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(line) {
            Ok(message) => self.handle_message(message).await,
            Err(err) => {
                tracing::warn!(error = %err, "unparseable message");
                Some(parse_error(err))
            }
        }
    }

    /// Returns `None` for notifications and for responses sent by the client.
    pub async fn handle_message(&self, message: Value) -> Option<JsonRpcResponse> {
        if message.get("method").is_none() {
            if message.get("result").is_some() || message.get("error").is_some() {
                return None;
            }
            let id = message.get("id").cloned().unwrap_or(Value::Null);
            return Some(JsonRpcResponse::error(
                id,
                RpcError::invalid_request().with_message("Invalid request: missing method"),
            ));
        }

        let fallback_id = message.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(err) => {
                return Some(JsonRpcResponse::error(
                    fallback_id,
                    RpcError::invalid_request().with_message(format!("Invalid request: {}", err)),
                ));
            }
        };

        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "notification");
            return None;
        };

        let response = match self.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::result(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        };
        Some(response)
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> RpcResult {
        match method {
            "initialize" => {
                let requested = params
                    .as_ref()
                    .and_then(|p| p.get("protocolVersion"))
                    .and_then(Value::as_str)
                    .unwrap_or(PROTOCOL_VERSION);
                encode(initialize_result(requested, &self.name, &self.version))
            }
            "ping" => Ok(json!({})),
            "tools/list" => {
                let tools: Vec<Value> = self
                    .registry
                    .definitions()
                    .map(|d| {
                        json!({
                            "name": d.name,
                            "description": d.description,
                            "inputSchema": d.parameters,
                        })
                    })
                    .collect();
                Ok(json!({ "tools": tools }))
            }
            "tools/call" => self.call_tool(params).await,
            other => Err(RpcError::method_not_found()
                .with_message(format!("Method not found: {}", other))),
        }
    }

    async fn call_tool(&self, params: Option<Value>) -> RpcResult {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| RpcError::invalid_params().with_message(format!("Invalid params: {}", e)))?;
        let arguments = params
            .arguments
            .filter(|a| !a.is_null())
            .unwrap_or_else(|| json!({}));

        let result = match self.registry.call(&params.name, arguments).await {
            Ok(output) => tool_success(output),
            Err(ToolError::Failed(err)) => {
                tracing::warn!(tool = %params.name, error = %err, "tool failed");
                tool_failure(err.to_string())
            }
            Err(err) => return Err(RpcError::invalid_params().with_message(err.to_string())),
        };

        encode(result)
    }
}

fn parse_error(err: impl std::fmt::Display) -> JsonRpcResponse {
    JsonRpcResponse::error(
        Value::Null,
        RpcError::parse_error().with_message(format!("Parse error: {}", err)),
    )
}

fn encode<T: Serialize>(result: T) -> RpcResult {
    serde_json::to_value(result).map_err(|e| RpcError::internal_error().with_message(e.to_string()))
}
