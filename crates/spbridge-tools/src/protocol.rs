//! JSON-RPC 2.0 framing for the MCP stdio transport. Result payloads use the
//! `rust-mcp-schema` types.

use rust_mcp_schema::{
    CallToolResult, ContentBlock, Implementation, InitializeResult, ServerCapabilities,
    ServerCapabilitiesTools, TextContent,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use rust_mcp_schema::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// A request, or a notification when `id` is absent. An explicit
/// `"id": null` is kept as `Some(Value::Null)`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

pub fn initialize_result(protocol_version: &str, name: &str, version: &str) -> InitializeResult {
    let mut capabilities = ServerCapabilities::default();
    capabilities.tools = Some(ServerCapabilitiesTools::default());

    InitializeResult {
        capabilities,
        instructions: None,
        meta: None,
        protocol_version: protocol_version.to_string(),
        server_info: Implementation {
            name: name.to_string(),
            version: version.to_string(),
            title: None,
            description: None,
            icons: Vec::new(),
            website_url: None,
        },
    }
}

fn text_block(text: String) -> ContentBlock {
    ContentBlock::TextContent(TextContent::new(text, None, None))
}

/// Successful tool output: the JSON text for plain clients plus the object
/// itself as structured content.
pub fn tool_success(output: Value) -> CallToolResult {
    let text = output.to_string();
    let structured_content = match output {
        Value::Object(map) => Some(map),
        _ => None,
    };

    CallToolResult {
        content: vec![text_block(text)],
        is_error: Some(false),
        meta: None,
        structured_content,
    }
}

pub fn tool_failure(message: impl Into<String>) -> CallToolResult {
    CallToolResult {
        content: vec![text_block(message.into())],
        is_error: Some(true),
        meta: None,
        structured_content: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_has_no_id() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
                .unwrap();
        assert!(request.id.is_none());
        assert!(request.params.is_none());
    }

    #[test]
    fn test_null_id_is_still_a_request() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": null, "method": "ping"}))
                .unwrap();
        assert_eq!(request.id, Some(Value::Null));
    }

    #[test]
    fn test_error_response_omits_result() {
        let response = JsonRpcResponse::error(
            json!(7),
            RpcError::method_not_found().with_message("nope".to_string()),
        );
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(value["error"]["message"], "nope");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_tool_result_shapes() {
        let ok = serde_json::to_value(tool_success(json!({"path": "/a"}))).unwrap();
        assert_eq!(ok["isError"], false);
        assert_eq!(ok["structuredContent"], json!({"path": "/a"}));
        assert_eq!(ok["content"][0]["type"], "text");
        assert_eq!(ok["content"][0]["text"], "{\"path\":\"/a\"}");

        let failed = serde_json::to_value(tool_failure("boom")).unwrap();
        assert_eq!(failed["isError"], true);
        assert_eq!(failed["content"][0]["text"], "boom");
        assert!(failed.get("structuredContent").is_none());
    }

    #[test]
    fn test_initialize_result_advertises_tools() {
        let value = serde_json::to_value(initialize_result("2025-03-26", "sharepoint", "0.1.0"))
            .unwrap();
        assert_eq!(value["protocolVersion"], "2025-03-26");
        assert_eq!(value["serverInfo"]["name"], "sharepoint");
        assert_eq!(value["serverInfo"]["version"], "0.1.0");
        assert!(value["capabilities"]["tools"].is_object());
    }
}
